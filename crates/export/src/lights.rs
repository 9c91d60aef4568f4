//! Light sources, light groups and portals.

use glam::{Mat4, Vec3};
use luxport_common::{ObjectId, ParamSet, matrix_to_array};
use luxport_context::{Capability, Context, LogicalFile};
use luxport_scene::{HostScene, LampData, LampKind, ObjectData, ObjectKind, SkyMode};

use crate::error::ExportError;
use crate::state::ExportState;

/// Numeric ids for light groups, assigned in order of first use.
///
/// Only lights and emitters that are actually exported claim an id.
#[derive(Debug, Default)]
pub struct LightGroupRegistry {
    names: Vec<String>,
}

impl LightGroupRegistry {
    pub fn id_for(&mut self, name: &str) -> u32 {
        match self.names.iter().position(|n| n == name) {
            Some(i) => i as u32,
            None => {
                self.names.push(name.to_string());
                (self.names.len() - 1) as u32
            }
        }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Export every renderable lamp object plus lamps reached through dupli
/// expansion. Returns the number of light sources written.
pub fn export_lights(
    ctx: &mut Context,
    scene: &dyn HostScene,
    state: &mut ExportState,
    dupli_lamps: &[(ObjectId, Mat4)],
) -> Result<usize, ExportError> {
    ctx.set_output_file(LogicalFile::Main);
    let mut lamps: Vec<(&ObjectData, Mat4)> = scene
        .renderable_objects()
        .iter()
        .filter_map(|id| scene.object(id))
        .filter(|o| o.kind == ObjectKind::Lamp)
        .map(|o| (o, o.matrix_world))
        .collect();
    for (id, matrix) in dupli_lamps {
        match scene.object(id) {
            Some(object) => lamps.push((object, *matrix)),
            None => state.guard(id, Err(luxport_scene::SceneError::ObjectNotFound(id.clone()).into()))?,
        }
    }

    let mut count = 0;
    for (object, matrix) in lamps {
        match export_lamp(ctx, scene, state, object, &matrix) {
            Ok(true) => count += 1,
            Ok(false) => {}
            Err(e) => state.guard(&object.name, Err(e))?,
        }
    }
    state.stats.lights += count;
    tracing::info!(lights = count, groups = state.light_groups.len(), "lights exported");
    Ok(count)
}

fn base_params(lamp: &LampData) -> ParamSet {
    ParamSet::new()
        .add_color("L", lamp.color)
        .add_float("gain", lamp.gain)
        .add_float("power", lamp.power)
        .add_float("efficacy", lamp.efficacy)
}

/// Emit one lamp. Returns `false` when its light group is disabled.
fn export_lamp(
    ctx: &mut Context,
    scene: &dyn HostScene,
    state: &mut ExportState,
    object: &ObjectData,
    matrix: &Mat4,
) -> Result<bool, ExportError> {
    let data = object.data.as_deref().unwrap_or(object.name.as_str());
    let lamp = scene
        .lamp(data)
        .ok_or_else(|| ExportError::LampNotFound(data.to_string()))?;
    if !scene.render_settings().light_group_enabled(&lamp.light_group) {
        tracing::debug!(lamp = %object.name, group = %lamp.light_group, "light group disabled, lamp skipped");
        return Ok(false);
    }
    let group_id = state.light_groups.id_for(&lamp.light_group);

    ctx.attribute_begin()?;
    ctx.light_group(&lamp.light_group, ParamSet::new())?;
    let takes_portals = match &lamp.kind {
        LampKind::Point => {
            ctx.transform(matrix_to_array(matrix))?;
            ctx.light_source("point", base_params(lamp).add_point("from", [0.0, 0.0, 0.0]))?;
            false
        }
        LampKind::Spot {
            size,
            blend,
            projector,
        } => {
            ctx.transform(matrix_to_array(matrix))?;
            let params = match projector {
                Some(map) => (
                    "projector",
                    base_params(lamp)
                        .add_string("mapname", map.clone())
                        .add_float("fov", size.to_degrees()),
                ),
                None => {
                    let cone = size.to_degrees() / 2.0;
                    (
                        "spot",
                        base_params(lamp)
                            .add_point("from", [0.0, 0.0, 0.0])
                            .add_point("to", [0.0, 0.0, -1.0])
                            .add_float("coneangle", cone)
                            .add_float("conedeltaangle", cone * blend),
                    )
                }
            };
            ctx.light_source(params.0, params.1)?;
            false
        }
        LampKind::Sun { sky, turbidity } => {
            let sundir = matrix.transform_vector3(Vec3::Z).normalize_or_zero();
            let kind = match sky {
                SkyMode::Sun => "sun",
                SkyMode::Sky => "sky",
                SkyMode::SunSky => "sunsky",
            };
            ctx.light_source(
                kind,
                ParamSet::new()
                    .add_float("gain", lamp.gain)
                    .add_vector("sundir", sundir.to_array())
                    .add_float("turbidity", *turbidity),
            )?;
            true
        }
        LampKind::Hemi { map } => {
            ctx.transform(matrix_to_array(matrix))?;
            let params = match map {
                Some(map) => base_params(lamp).add_string("mapname", map.clone()),
                None => base_params(lamp),
            };
            ctx.light_source("infinite", params)?;
            true
        }
        LampKind::Area { size_x, size_y } => {
            ctx.transform(matrix_to_array(matrix))?;
            ctx.area_light_source("area", base_params(lamp))?;
            ctx.shape("trianglemesh", area_quad(*size_x, *size_y))?;
            true
        }
    };

    if takes_portals && lamp.use_portals {
        let portals: Vec<String> = state
            .cache
            .portal_definitions()
            .map(|d| d.name.clone())
            .collect();
        if !portals.is_empty() && ctx.supports(Capability::Instancing) {
            // Portal definitions are baked in world space.
            ctx.identity()?;
            for name in &portals {
                ctx.portal_instance(name)?;
            }
        }
    }
    ctx.attribute_end()?;
    tracing::debug!(lamp = %object.name, group_id, "lamp exported");
    Ok(true)
}

/// Emitting quad of an area lamp, facing local -Z.
fn area_quad(size_x: f32, size_y: f32) -> ParamSet {
    let (x, y) = (size_x / 2.0, size_y / 2.0);
    ParamSet::new()
        .add_integers("indices", vec![0, 1, 2, 0, 2, 3])
        .add_points(
            "P",
            vec![-x, y, 0.0, x, y, 0.0, x, -y, 0.0, -x, -y, 0.0],
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use luxport_common::ParamValue;
    use luxport_context::{ApiContext, RecordingApi, Statement, StatementLog};
    use luxport_scene::{LightGroupSetting, MemoryScene};

    fn api() -> (Context, StatementLog) {
        let (api, log) = RecordingApi::new();
        (Context::Api(ApiContext::new(Box::new(api))), log)
    }

    fn scene_with(lamp: LampData) -> MemoryScene {
        let mut scene = MemoryScene::new("lights");
        scene.insert_object(ObjectData::lamp("LampObj", &lamp.name));
        scene.insert_lamp(lamp);
        scene
    }

    #[test]
    fn registry_assigns_in_first_use_order() {
        let mut reg = LightGroupRegistry::default();
        assert_eq!(reg.id_for("key"), 0);
        assert_eq!(reg.id_for("fill"), 1);
        assert_eq!(reg.id_for("key"), 0);
        assert_eq!(reg.len(), 2);
    }

    #[test]
    fn point_lamp() {
        let scene = scene_with(LampData::new("Point", LampKind::Point));
        let (mut ctx, log) = api();
        let mut state = ExportState::new(true);
        assert_eq!(export_lights(&mut ctx, &scene, &mut state, &[]).unwrap(), 1);
        let keywords: Vec<_> = log.statements().iter().map(|s| s.keyword()).collect();
        assert_eq!(
            keywords,
            vec!["AttributeBegin", "LightGroup", "Transform", "LightSource", "AttributeEnd"]
        );
        assert_eq!(state.light_groups.names(), ["default"]);
    }

    #[test]
    fn disabled_group_writes_nothing() {
        let mut scene = scene_with(LampData::new("Point", LampKind::Point).in_group("rim"));
        scene.settings.light_groups.push(LightGroupSetting {
            name: "rim".into(),
            enabled: false,
            gain: 1.0,
        });
        let (mut ctx, log) = api();
        let mut state = ExportState::new(true);
        assert_eq!(export_lights(&mut ctx, &scene, &mut state, &[]).unwrap(), 0);
        assert!(log.is_empty());
        assert!(state.light_groups.is_empty());
    }

    #[test]
    fn spot_cone_angles() {
        let lamp = LampData::new(
            "Spot",
            LampKind::Spot {
                size: std::f32::consts::FRAC_PI_2,
                blend: 0.5,
                projector: None,
            },
        );
        let scene = scene_with(lamp);
        let (mut ctx, log) = api();
        let mut state = ExportState::new(true);
        export_lights(&mut ctx, &scene, &mut state, &[]).unwrap();
        let light = log
            .statements()
            .into_iter()
            .find(|s| s.keyword() == "LightSource");
        let Some(Statement::LightSource { kind, params }) = light else {
            panic!("no light source");
        };
        assert_eq!(kind, "spot");
        let Some(ParamValue::Float(cone)) = params.get("coneangle") else {
            panic!("no cone");
        };
        assert!((cone[0] - 45.0).abs() < 1e-4);
    }

    #[test]
    fn area_lamp_writes_quad() {
        let scene = scene_with(LampData::new(
            "Area",
            LampKind::Area {
                size_x: 2.0,
                size_y: 1.0,
            },
        ));
        let (mut ctx, log) = api();
        let mut state = ExportState::new(true);
        export_lights(&mut ctx, &scene, &mut state, &[]).unwrap();
        assert_eq!(log.count_keyword("AreaLightSource"), 1);
        assert_eq!(log.count_keyword("Shape"), 1);
    }

    #[test]
    fn sun_direction_follows_object() {
        let scene = scene_with(LampData::new(
            "Sun",
            LampKind::Sun {
                sky: SkyMode::SunSky,
                turbidity: 2.2,
            },
        ));
        let (mut ctx, log) = api();
        let mut state = ExportState::new(true);
        export_lights(&mut ctx, &scene, &mut state, &[]).unwrap();
        let Some(Statement::LightSource { kind, params }) = log
            .statements()
            .into_iter()
            .find(|s| s.keyword() == "LightSource")
        else {
            panic!("no light source");
        };
        assert_eq!(kind, "sunsky");
        assert_eq!(params.get("sundir"), Some(&ParamValue::Vector(vec![0.0, 0.0, 1.0])));
        assert_eq!(log.count_keyword("Transform"), 0);
    }

    #[test]
    fn missing_lamp_data_is_per_object() {
        let mut scene = MemoryScene::new("lights");
        scene.insert_object(ObjectData::lamp("Orphan", "Nothing"));
        let (mut ctx, _log) = api();
        let mut state = ExportState::new(true);
        assert_eq!(export_lights(&mut ctx, &scene, &mut state, &[]).unwrap(), 0);
        assert_eq!(state.failures.len(), 1);
    }
}
