//! Textures, named materials and volumes.

use std::collections::BTreeSet;

use luxport_common::{ParamSet, ParamValue};
use luxport_context::{Capability, Context, LogicalFile};
use luxport_scene::{Emission, HostScene, MaterialData, ObjectData};

use crate::error::ExportError;

/// Names already registered with the renderer during one export.
#[derive(Debug, Default)]
pub struct MaterialRegistry {
    materials: BTreeSet<String>,
    textures: BTreeSet<String>,
    volumes: BTreeSet<String>,
}

impl MaterialRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn material_count(&self) -> usize {
        self.materials.len()
    }

    /// Register every scene volume. Written to the volumes file.
    pub fn export_volumes(
        &mut self,
        ctx: &mut Context,
        scene: &dyn HostScene,
    ) -> Result<usize, ExportError> {
        ctx.set_output_file(LogicalFile::Volumes);
        let mut count = 0;
        for volume in scene.volumes() {
            if self.volumes.insert(volume.name.clone()) {
                ctx.make_named_volume(&volume.name, &volume.kind, volume.params.clone())?;
                count += 1;
            }
        }
        Ok(count)
    }

    /// Declare every scene texture ahead of the materials that use them.
    pub fn export_textures(
        &mut self,
        ctx: &mut Context,
        scene: &dyn HostScene,
    ) -> Result<usize, ExportError> {
        ctx.set_output_file(LogicalFile::Materials);
        let mut count = 0;
        for texture in scene.textures() {
            if self.textures.insert(texture.name.clone()) {
                ctx.texture(
                    &texture.name,
                    &texture.variant,
                    &texture.kind,
                    texture.params.clone(),
                )?;
                count += 1;
            }
        }
        Ok(count)
    }

    /// Emit a named material once per export, then return output to the
    /// geometry file.
    pub fn ensure_material(
        &mut self,
        ctx: &mut Context,
        scene: &dyn HostScene,
        name: &str,
    ) -> Result<(), ExportError> {
        if self.materials.contains(name) {
            return Ok(());
        }
        let material = scene
            .material(name)
            .ok_or_else(|| ExportError::MaterialNotFound(name.to_string()))?;
        ctx.set_output_file(LogicalFile::Materials);
        let result = ctx.make_named_material(name, material_params(material));
        ctx.set_output_file(LogicalFile::Geometry);
        result?;
        self.materials.insert(name.to_string());
        tracing::debug!(material = name, "material exported");
        Ok(())
    }
}

/// `MakeNamedMaterial` parameters: the material type followed by its own params.
pub fn material_params(material: &MaterialData) -> ParamSet {
    let mut params = ParamSet::new().add_string("type", material.kind.clone());
    params.update(&material.params);
    params
}

/// Emission of a material, unless it is absent or its light group is disabled.
pub fn active_emission<'a>(scene: &'a dyn HostScene, material: Option<&str>) -> Option<&'a Emission> {
    let emission = scene.material(material?)?.emission.as_ref()?;
    scene
        .render_settings()
        .light_group_enabled(&emission.light_group)
        .then_some(emission)
}

/// Whether any material slot of an object produces light.
pub fn object_emits(scene: &dyn HostScene, object: &ObjectData) -> bool {
    object
        .material_slots
        .iter()
        .any(|slot| active_emission(scene, slot.as_deref()).is_some())
}

pub fn emission_params(emission: &Emission) -> ParamSet {
    ParamSet::new()
        .add_color("L", emission.color)
        .add_float("gain", emission.gain)
        .add_float("power", emission.power)
        .add_float("efficacy", emission.efficacy)
}

/// Interior and exterior media for a shape.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Media {
    pub interior: Option<String>,
    pub exterior: Option<String>,
}

impl Media {
    /// Object overrides win over the material's media; geometry without any
    /// exterior falls back to the world exterior.
    pub fn resolve(scene: &dyn HostScene, object: &ObjectData, material: Option<&str>) -> Self {
        let material = material.and_then(|m| scene.material(m));
        let interior = object
            .interior
            .clone()
            .or_else(|| material.and_then(|m| m.interior.clone()));
        let exterior = object
            .exterior
            .clone()
            .or_else(|| material.and_then(|m| m.exterior.clone()))
            .or_else(|| scene.render_settings().world_exterior.clone());
        Self { interior, exterior }
    }

    pub fn emit(&self, ctx: &mut Context) -> Result<(), ExportError> {
        if let Some(name) = &self.interior {
            ctx.interior(name)?;
        }
        if let Some(name) = &self.exterior {
            ctx.exterior(name)?;
        }
        Ok(())
    }
}

/// Write one material with the textures and volumes it references.
///
/// Used with the packaging sink to share a material as a self-contained
/// bundle. Returns the number of statements written.
pub fn export_material_package(
    ctx: &mut Context,
    scene: &dyn HostScene,
    name: &str,
) -> Result<usize, ExportError> {
    ctx.require(&[Capability::Materials])?;
    let material = scene
        .material(name)
        .ok_or_else(|| ExportError::MaterialNotFound(name.to_string()))?;
    let _span = tracing::info_span!("material_package", material = name).entered();

    // Textures may feed other textures; follow references until closed.
    let mut wanted = texture_refs(&material.params);
    loop {
        let before = wanted.len();
        for texture in scene.textures() {
            if wanted.contains(&texture.name) {
                wanted.extend(texture_refs(&texture.params));
            }
        }
        if wanted.len() == before {
            break;
        }
    }

    let mut count = 0;
    for texture in scene.textures().iter().filter(|t| wanted.contains(&t.name)) {
        ctx.texture(
            &texture.name,
            &texture.variant,
            &texture.kind,
            texture.params.clone(),
        )?;
        count += 1;
    }
    let media: BTreeSet<&str> = [material.interior.as_deref(), material.exterior.as_deref()]
        .into_iter()
        .flatten()
        .collect();
    for volume in scene.volumes().iter().filter(|v| media.contains(v.name.as_str())) {
        ctx.make_named_volume(&volume.name, &volume.kind, volume.params.clone())?;
        count += 1;
    }
    ctx.make_named_material(name, material_params(material))?;
    count += 1;
    tracing::info!(statements = count, "material package written");
    Ok(count)
}

fn texture_refs(params: &ParamSet) -> BTreeSet<String> {
    params
        .iter()
        .filter_map(|p| match &p.value {
            ParamValue::Texture(name) => Some(name.clone()),
            _ => None,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use luxport_context::{ApiContext, PackageContext, RecordingApi, Statement};
    use luxport_scene::{LightGroupSetting, MemoryScene, TextureData, VolumeData};

    fn scene() -> MemoryScene {
        let mut scene = MemoryScene::new("mats");
        scene.insert_texture(TextureData {
            name: "grain".into(),
            variant: "float".into(),
            kind: "fbm".into(),
            params: ParamSet::new(),
        });
        scene.insert_texture(TextureData {
            name: "wood".into(),
            variant: "color".into(),
            kind: "mix".into(),
            params: ParamSet::new().add_texture("amount", "grain"),
        });
        scene.insert_texture(TextureData {
            name: "unused".into(),
            variant: "color".into(),
            kind: "checkerboard".into(),
            params: ParamSet::new(),
        });
        scene.insert_volume(VolumeData {
            name: "glass".into(),
            kind: "clear".into(),
            params: ParamSet::new(),
        });
        let mut table = MaterialData::matte("Table");
        table.params = ParamSet::new().add_texture("Kd", "wood");
        table.interior = Some("glass".into());
        scene.insert_material(table);
        scene.insert_material(MaterialData::emitting("Glow", "neon"));
        scene
    }

    #[test]
    fn material_emitted_once() {
        let scene = scene();
        let (api, log) = RecordingApi::new();
        let mut ctx = Context::Api(ApiContext::new(Box::new(api)));
        let mut reg = MaterialRegistry::new();
        reg.ensure_material(&mut ctx, &scene, "Table").unwrap();
        reg.ensure_material(&mut ctx, &scene, "Table").unwrap();
        assert_eq!(log.count_keyword("MakeNamedMaterial"), 1);
        assert!(matches!(
            reg.ensure_material(&mut ctx, &scene, "Missing"),
            Err(ExportError::MaterialNotFound(_))
        ));
        match &log.statements()[0] {
            Statement::MakeNamedMaterial { params, .. } => {
                assert!(matches!(params.get("type"), Some(ParamValue::String(v)) if v[0] == "matte"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn emission_respects_light_groups() {
        let mut scene = scene();
        let glow = ObjectData::mesh("Lamp", "Plane").with_material("Glow");
        assert!(object_emits(&scene, &glow));
        scene.settings.light_groups.push(LightGroupSetting {
            name: "neon".into(),
            enabled: false,
            gain: 1.0,
        });
        assert!(!object_emits(&scene, &glow));
    }

    #[test]
    fn media_resolution_order() {
        let mut scene = scene();
        scene.settings.world_exterior = Some("air".into());
        let obj = ObjectData::mesh("T", "Plane");
        let media = Media::resolve(&scene, &obj, Some("Table"));
        assert_eq!(media.interior.as_deref(), Some("glass"));
        assert_eq!(media.exterior.as_deref(), Some("air"));

        let mut obj = obj;
        obj.interior = Some("smoke".into());
        assert_eq!(
            Media::resolve(&scene, &obj, Some("Table")).interior.as_deref(),
            Some("smoke")
        );
    }

    #[test]
    fn package_collects_dependencies() {
        let scene = scene();
        let mut ctx = Context::Package(PackageContext::in_memory());
        let count = export_material_package(&mut ctx, &scene, "Table").unwrap();
        assert_eq!(count, 4);
        let Context::Package(p) = &ctx else {
            unreachable!()
        };
        let names: Vec<_> = p.document().records.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["grain", "wood", "glass", "Table"]);
    }
}
