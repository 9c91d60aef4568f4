//! Primitive definitions and their placements.

use glam::Mat4;
use luxport_common::{ParamSet, matrix_to_array};
use luxport_context::{Capability, Context};
use luxport_scene::{HostScene, MeshData, ObjectData, ShapeKind};

use crate::error::ExportError;
use crate::materials::{Media, active_emission, emission_params};
use crate::mesh::{MeshDefinition, MeshPartition, definition_name, split_by_material};
use crate::settings::ExportSettings;
use crate::state::ExportState;

/// How a placement reaches the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementMode {
    /// Reference a primitive definition by name.
    Instanced,
    /// Write every shape in full at the placement.
    FullShape,
}

/// Build (or fetch from the cache) one definition per used material slot.
///
/// Definitions are registered in the cache but not emitted; emission happens
/// when a placement first references them.
pub fn build_mesh(
    ctx: &mut Context,
    scene: &dyn HostScene,
    settings: &ExportSettings,
    state: &mut ExportState,
    object: &ObjectData,
    identity: &str,
) -> Result<Vec<MeshDefinition>, ExportError> {
    let mesh = scene.evaluated_mesh(&object.name)?;
    let parts: Vec<MeshPartition> = split_by_material(&mesh, object.material_slots.len())
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect();
    if parts.is_empty() {
        return Err(ExportError::InvalidGeometry {
            object: object.name.clone(),
            reason: format!("mesh {} has no triangles", mesh.name),
        });
    }

    let mut definitions = Vec::with_capacity(parts.len());
    for part in parts {
        let material = object.material_slots.get(part.slot).cloned().flatten();
        let name = definition_name(identity, material.as_deref(), part.slot);
        let digest = part.fingerprint();
        if state.cache.have(&name) {
            let cached = state.cache.get(&name)?;
            if cached.digest != digest {
                return Err(ExportError::ConflictingDefinition(name));
            }
            tracing::debug!(definition = %name, "cache hit");
            definitions.push(cached.clone());
            state.stats.cache_hits += 1;
            continue;
        }

        let (shape, params) = shape_params(ctx, settings, &mesh, &name, &part, &digest.to_string())?;
        let definition = MeshDefinition {
            name,
            mesh: identity.to_string(),
            slot: part.slot,
            material,
            shape: shape.to_string(),
            params,
            portal: mesh.portal,
            digest,
        };
        tracing::trace!(
            definition = %definition.name,
            triangles = part.triangle_count(),
            shape,
            "definition built"
        );
        state.cache.add(definition.clone())?;
        definitions.push(definition);
    }
    Ok(definitions)
}

fn shape_params(
    ctx: &mut Context,
    settings: &ExportSettings,
    mesh: &MeshData,
    name: &str,
    part: &MeshPartition,
    digest: &str,
) -> Result<(&'static str, ParamSet), ExportError> {
    let kind = mesh.export.shape.unwrap_or(settings.default_shape);
    let (shape, mut params) = match kind {
        ShapeKind::BinaryPly if ctx.supports(Capability::ExternalFiles) => {
            let file = format!("{}_{}", sanitize(name), &digest[..8]);
            let path = ctx.write_ply(&file, &part.as_ply())?;
            ("plymesh", ParamSet::new().add_string("filename", path))
        }
        ShapeKind::BinaryPly => {
            tracing::debug!(definition = name, "output has no side files, using native mesh");
            ("trianglemesh", part.native_params())
        }
        ShapeKind::NativeMesh => ("trianglemesh", part.native_params()),
        ShapeKind::Subdiv => (
            "loopsubdiv",
            part.native_params()
                .add_integer("nsubdivlevels", mesh.export.subdiv_levels.max(1) as i32),
        ),
    };
    params.update(&mesh.export.extra);
    Ok((shape, params))
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Write the primitive-definition block for `definition` unless it already exists.
fn ensure_defined(
    ctx: &mut Context,
    state: &mut ExportState,
    definition: &MeshDefinition,
) -> Result<(), ExportError> {
    if state.cache.is_emitted(&definition.name) {
        return Ok(());
    }
    ctx.object_begin(&definition.name)?;
    if let Some(material) = &definition.material {
        ctx.named_material(material)?;
    }
    ctx.shape(&definition.shape, definition.params.clone())?;
    ctx.object_end()?;
    state.cache.mark_emitted(&definition.name);
    state.stats.definitions += 1;
    Ok(())
}

/// Emit one placement of an object's definitions.
///
/// `motion` is the shutter-close transform; it is only honoured on the
/// instanced path, which can express it as a motion instance.
#[allow(clippy::too_many_arguments)]
pub fn place(
    ctx: &mut Context,
    scene: &dyn HostScene,
    state: &mut ExportState,
    object: &ObjectData,
    definitions: &[MeshDefinition],
    world: &Mat4,
    motion: Option<&Mat4>,
    mode: PlacementMode,
) -> Result<(), ExportError> {
    for material in definitions.iter().filter_map(|d| d.material.as_deref()) {
        state.materials.ensure_material(ctx, scene, material)?;
    }

    match mode {
        PlacementMode::Instanced => {
            for definition in definitions {
                ensure_defined(ctx, state, definition)?;
            }
            let motion_system = match motion {
                Some(next) => {
                    let system = state.next_motion_system(&object.name);
                    ctx.transform_begin()?;
                    ctx.identity()?;
                    ctx.transform(matrix_to_array(next))?;
                    ctx.coordinate_system(&system)?;
                    ctx.transform_end()?;
                    Some(system)
                }
                None => None,
            };

            ctx.attribute_begin()?;
            ctx.transform(matrix_to_array(world))?;
            for definition in definitions {
                let media = Media::resolve(scene, object, definition.material.as_deref());
                let scoped = media != Media::default();
                if scoped {
                    ctx.attribute_begin()?;
                    media.emit(ctx)?;
                }
                match &motion_system {
                    Some(system) => ctx.motion_instance(&definition.name, 0.0, 1.0, system)?,
                    None => ctx.object_instance(&definition.name)?,
                }
                if scoped {
                    ctx.attribute_end()?;
                }
                state.stats.instances += 1;
            }
            ctx.attribute_end()?;
        }
        PlacementMode::FullShape => {
            if motion.is_some() {
                tracing::debug!(object = %object.name, "motion blur needs instancing, placing static shape");
            }
            ctx.attribute_begin()?;
            ctx.transform(matrix_to_array(world))?;
            for definition in definitions {
                ctx.attribute_begin()?;
                if let Some(material) = &definition.material {
                    ctx.named_material(material)?;
                }
                if let Some(emission) = active_emission(scene, definition.material.as_deref()) {
                    state.light_groups.id_for(&emission.light_group);
                    ctx.light_group(&emission.light_group, ParamSet::new())?;
                    ctx.area_light_source("area", emission_params(emission))?;
                    state.stats.emitters += 1;
                }
                Media::resolve(scene, object, definition.material.as_deref()).emit(ctx)?;
                ctx.shape(&definition.shape, definition.params.clone())?;
                ctx.attribute_end()?;
                state.stats.full_shapes += 1;
            }
            ctx.attribute_end()?;
        }
    }
    state.stats.placements += 1;
    Ok(())
}

/// Emit a light portal: definitions baked in world space so a light can
/// reference them with an identity transform.
pub fn define_portal(
    ctx: &mut Context,
    state: &mut ExportState,
    definitions: &[MeshDefinition],
    world: &Mat4,
) -> Result<(), ExportError> {
    for definition in definitions {
        if !state.cache.mark_emitted(&definition.name) {
            continue;
        }
        ctx.attribute_begin()?;
        ctx.transform(matrix_to_array(world))?;
        ctx.object_begin(&definition.name)?;
        ctx.shape(&definition.shape, definition.params.clone())?;
        ctx.object_end()?;
        ctx.attribute_end()?;
        state.stats.definitions += 1;
        state.stats.portals += 1;
    }
    Ok(())
}
