//! Two-phase scene traversal.
//!
//! Phase 1 expands duplicators and particle systems for every renderable
//! object. Phase 2 then exports the objects phase 1 did not consume. Phase 1
//! always completes before phase 2 starts.

use std::collections::BTreeSet;

use glam::Mat4;
use luxport_common::{ObjectId, matrices_differ};
use luxport_context::{Context, LogicalFile};
use luxport_scene::{
    DupliElement, DupliKind, HostScene, ObjectData, ObjectKind, ParticleRenderType, SceneError,
};

use crate::error::ExportError;
use crate::geometry::{PlacementMode, build_mesh, define_portal, place};
use crate::materials::object_emits;
use crate::mesh::{mesh_identity, portal_identity};
use crate::settings::ExportSettings;
use crate::state::ExportState;

/// Expansion strategy for a duplicator or particle system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expansion {
    Group,
    Faces,
    Verts,
    Particles(ParticleRenderType),
    Unsupported(&'static str),
}

impl Expansion {
    pub fn for_dupli(kind: DupliKind) -> Option<Self> {
        match kind {
            DupliKind::None => None,
            DupliKind::Group => Some(Self::Group),
            DupliKind::Faces => Some(Self::Faces),
            DupliKind::Verts => Some(Self::Verts),
            DupliKind::Frames => Some(Self::Unsupported("frames")),
        }
    }

    pub fn for_particles(render_type: ParticleRenderType) -> Self {
        match render_type {
            ParticleRenderType::Object | ParticleRenderType::Group => Self::Particles(render_type),
            ParticleRenderType::Path => Self::Unsupported("path"),
            ParticleRenderType::Halo => Self::Unsupported("halo"),
            ParticleRenderType::Line => Self::Unsupported("line"),
            ParticleRenderType::Billboard => Self::Unsupported("billboard"),
            ParticleRenderType::None => Self::Unsupported("none"),
        }
    }

    /// Whether the expanded source objects count as exported.
    pub fn consumes_sources(&self) -> bool {
        matches!(self, Self::Group | Self::Faces | Self::Verts)
    }
}

/// What the walk produced besides emitted statements.
#[derive(Debug, Default)]
pub struct WalkOutcome {
    /// Objects handled in phase 1 and skipped in phase 2.
    pub consumed: BTreeSet<ObjectId>,
    /// Lamps reached through dupli expansion, with their per-copy matrix.
    pub dupli_lamps: Vec<(ObjectId, Mat4)>,
}

pub struct SceneWalker<'a> {
    scene: &'a dyn HostScene,
    settings: &'a ExportSettings,
}

impl<'a> SceneWalker<'a> {
    pub fn new(scene: &'a dyn HostScene, settings: &'a ExportSettings) -> Self {
        Self { scene, settings }
    }

    pub fn walk(&self, ctx: &mut Context, state: &mut ExportState) -> Result<WalkOutcome, ExportError> {
        ctx.set_output_file(LogicalFile::Geometry);
        let objects = self.scene.renderable_objects();
        let mut outcome = WalkOutcome::default();

        {
            let _span = tracing::debug_span!("expand").entered();
            for id in &objects {
                if let Some(object) = self.scene.object(id) {
                    self.expand(ctx, state, object, &mut outcome)?;
                }
            }
        }

        let _span = tracing::debug_span!("bare_objects").entered();
        for id in &objects {
            if outcome.consumed.contains(id) {
                continue;
            }
            let Some(object) = self.scene.object(id) else {
                continue;
            };
            if object.kind != ObjectKind::Mesh {
                continue;
            }
            let result = self.export_bare(ctx, state, object);
            state.guard(id, result)?;
        }

        tracing::info!(
            placements = state.stats.placements,
            definitions = state.stats.definitions,
            consumed = outcome.consumed.len(),
            failures = state.failures.len(),
            "geometry exported"
        );
        Ok(outcome)
    }

    fn expand(
        &self,
        ctx: &mut Context,
        state: &mut ExportState,
        object: &ObjectData,
        outcome: &mut WalkOutcome,
    ) -> Result<(), ExportError> {
        let dupli = Expansion::for_dupli(object.dupli).filter(|_| object.particle_systems.is_empty());
        if let Some(expansion) = dupli {
            outcome.consumed.insert(object.name.clone());
            match expansion {
                Expansion::Unsupported(kind) => {
                    tracing::debug!(object = %object.name, kind, "dupli type not supported");
                }
                supported => {
                    let elements = self.scene.dupli_list(&object.name);
                    self.place_elements(ctx, state, object, elements, supported, outcome)?;
                }
            }
        }

        for (index, system) in object.particle_systems.iter().enumerate() {
            match Expansion::for_particles(system.render_type) {
                Expansion::Unsupported(kind) => {
                    tracing::debug!(object = %object.name, system = %system.name, kind, "particle render type not supported");
                }
                supported => {
                    let elements = self.scene.particle_instances(&object.name, index);
                    self.place_elements(ctx, state, object, elements, supported, outcome)?;
                }
            }
        }

        if !object.particle_systems.is_empty()
            && !object.particle_systems.iter().any(|p| p.render_emitter)
        {
            outcome.consumed.insert(object.name.clone());
        }
        Ok(())
    }

    fn place_elements(
        &self,
        ctx: &mut Context,
        state: &mut ExportState,
        parent: &ObjectData,
        elements: Result<Vec<DupliElement>, SceneError>,
        expansion: Expansion,
        outcome: &mut WalkOutcome,
    ) -> Result<(), ExportError> {
        let elements = match elements {
            Ok(elements) => elements,
            Err(e) => return state.guard(&parent.name, Err(e.into())),
        };
        tracing::debug!(object = %parent.name, ?expansion, copies = elements.len(), "expanding");

        for element in elements {
            let result = self.place_element(ctx, state, parent, &element, expansion, outcome);
            state.guard(&element.object, result)?;
        }
        Ok(())
    }

    fn place_element(
        &self,
        ctx: &mut Context,
        state: &mut ExportState,
        parent: &ObjectData,
        element: &DupliElement,
        expansion: Expansion,
        outcome: &mut WalkOutcome,
    ) -> Result<(), ExportError> {
        let source = self
            .scene
            .object(&element.object)
            .ok_or_else(|| SceneError::ObjectNotFound(element.object.clone()))?;
        if expansion.consumes_sources() {
            outcome.consumed.insert(source.name.clone());
        }
        match source.kind {
            ObjectKind::Lamp => {
                outcome.dupli_lamps.push((source.name.clone(), element.matrix));
                Ok(())
            }
            ObjectKind::Mesh => {
                let next = (self.settings.motion_blur && parent.motion_blur)
                    .then_some(element.motion_matrix)
                    .flatten();
                self.export_mesh(ctx, state, source, &element.matrix, next)
            }
            _ => Ok(()),
        }
    }

    fn export_bare(
        &self,
        ctx: &mut Context,
        state: &mut ExportState,
        object: &ObjectData,
    ) -> Result<(), ExportError> {
        let next = if self.settings.motion_blur && object.motion_blur {
            Some(
                self.scene
                    .world_matrix(&object.name, self.scene.frame_current() + 1)?,
            )
        } else {
            None
        };
        self.export_mesh(ctx, state, object, &object.matrix_world, next)
    }

    /// Build and place one mesh object at `world`.
    fn export_mesh(
        &self,
        ctx: &mut Context,
        state: &mut ExportState,
        object: &ObjectData,
        world: &Mat4,
        next: Option<Mat4>,
    ) -> Result<(), ExportError> {
        state.cache.begin_object(!object.has_render_modifiers());

        let portal = object
            .data
            .as_deref()
            .and_then(|name| self.scene.mesh(name))
            .is_some_and(|m| m.portal);
        if portal {
            if !state.cache.instancing_allowed() {
                tracing::debug!(object = %object.name, "portal needs instancing, skipped");
                return Ok(());
            }
            let identity = portal_identity(object, state.stats.portals);
            let definitions =
                build_mesh(ctx, self.scene, self.settings, state, object, &identity)?;
            return define_portal(ctx, state, &definitions, world);
        }

        let identity = mesh_identity(object);
        let definitions = build_mesh(ctx, self.scene, self.settings, state, object, &identity)?;
        let mode = if state.cache.instancing_allowed() && !object_emits(self.scene, object) {
            PlacementMode::Instanced
        } else {
            PlacementMode::FullShape
        };
        let motion = next.filter(|n| matrices_differ(world, n));
        place(
            ctx,
            self.scene,
            state,
            object,
            &definitions,
            world,
            motion.as_ref(),
            mode,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use luxport_context::{ApiContext, RecordingApi, StatementLog};
    use luxport_scene::{MaterialData, MemoryScene, MeshData, ParticleSystem};

    fn api() -> (Context, StatementLog) {
        let (api, log) = RecordingApi::new();
        (Context::Api(ApiContext::new(Box::new(api))), log)
    }

    fn element(object: &str, x: f32) -> DupliElement {
        DupliElement {
            object: ObjectId::new(object),
            matrix: Mat4::from_translation(glam::Vec3::new(x, 0.0, 0.0)),
            motion_matrix: None,
        }
    }

    fn base_scene() -> MemoryScene {
        let mut scene = MemoryScene::new("walk");
        scene.insert_mesh(MeshData::cube("Cube"));
        scene.insert_material(MaterialData::matte("Grey"));
        scene
    }

    #[test]
    fn dispatch_table() {
        assert_eq!(Expansion::for_dupli(DupliKind::None), None);
        assert_eq!(
            Expansion::for_dupli(DupliKind::Frames),
            Some(Expansion::Unsupported("frames"))
        );
        assert!(Expansion::Verts.consumes_sources());
        assert!(!Expansion::for_particles(ParticleRenderType::Object).consumes_sources());
        assert_eq!(
            Expansion::for_particles(ParticleRenderType::Halo),
            Expansion::Unsupported("halo")
        );
    }

    #[test]
    fn dupli_children_not_exported_twice() {
        let mut scene = base_scene();
        scene.insert_object(ObjectData::mesh("Child", "Cube").with_material("Grey"));
        let mut parent = ObjectData::mesh("Parent", "Cube");
        parent.dupli = DupliKind::Verts;
        parent.dupli_list = vec![element("Child", 1.0), element("Child", 2.0)];
        scene.insert_object(parent);

        let (mut ctx, log) = api();
        let mut state = ExportState::new(true);
        let settings = ExportSettings::default();
        let outcome = SceneWalker::new(&scene, &settings)
            .walk(&mut ctx, &mut state)
            .unwrap();

        assert!(outcome.consumed.contains(&ObjectId::new("Child")));
        assert!(outcome.consumed.contains(&ObjectId::new("Parent")));
        assert_eq!(state.stats.placements, 2);
        assert_eq!(log.count_keyword("ObjectBegin"), 1);
        assert_eq!(log.count_keyword("ObjectInstance"), 2);
    }

    #[test]
    fn particles_hide_emitter_unless_rendered() {
        let mut scene = base_scene();
        scene.insert_object(ObjectData::mesh("Pebble", "Cube"));
        let mut emitter = ObjectData::mesh("Ground", "Cube");
        emitter.particle_systems.push(ParticleSystem {
            name: "scatter".into(),
            render_type: ParticleRenderType::Object,
            render_emitter: false,
            instances: vec![element("Pebble", 1.0), element("Pebble", 3.0)],
        });
        emitter.particle_systems.push(ParticleSystem {
            name: "hair".into(),
            render_type: ParticleRenderType::Path,
            render_emitter: false,
            instances: vec![element("Pebble", 5.0)],
        });
        scene.insert_object(emitter);

        let (mut ctx, _log) = api();
        let mut state = ExportState::new(true);
        let settings = ExportSettings::default();
        let outcome = SceneWalker::new(&scene, &settings)
            .walk(&mut ctx, &mut state)
            .unwrap();

        // Two particle copies plus the bare Pebble; the emitter is hidden and
        // the path system skipped.
        assert!(outcome.consumed.contains(&ObjectId::new("Ground")));
        assert_eq!(state.stats.placements, 3);
    }

    #[test]
    fn dupli_lamps_are_collected() {
        let mut scene = base_scene();
        let mut lamp = ObjectData::lamp("Bulb", "BulbData");
        lamp.visible = false;
        scene.insert_object(lamp);
        let mut parent = ObjectData::empty("Rig");
        parent.dupli = DupliKind::Group;
        parent.dupli_list = vec![element("Bulb", 0.0), element("Bulb", 4.0)];
        scene.insert_object(parent);

        let (mut ctx, _log) = api();
        let mut state = ExportState::new(true);
        let settings = ExportSettings::default();
        let outcome = SceneWalker::new(&scene, &settings)
            .walk(&mut ctx, &mut state)
            .unwrap();
        assert_eq!(outcome.dupli_lamps.len(), 2);
    }

    #[test]
    fn bad_object_does_not_stop_walk() {
        let mut scene = base_scene();
        scene.insert_object(ObjectData::mesh("Broken", "NoSuchMesh"));
        scene.insert_object(ObjectData::mesh("Fine", "Cube"));
        let (mut ctx, _log) = api();
        let mut state = ExportState::new(true);
        let settings = ExportSettings::default();
        SceneWalker::new(&scene, &settings)
            .walk(&mut ctx, &mut state)
            .unwrap();
        assert_eq!(state.failures.len(), 1);
        assert_eq!(state.failures[0].object, ObjectId::new("Broken"));
        assert_eq!(state.stats.placements, 1);
    }

    #[test]
    fn modified_object_is_never_instanced() {
        let mut scene = base_scene();
        scene.insert_object(ObjectData::mesh("A", "Cube").with_modifier("Subsurf", "subsurf"));
        let (mut ctx, log) = api();
        let mut state = ExportState::new(true);
        let settings = ExportSettings::default();
        SceneWalker::new(&scene, &settings)
            .walk(&mut ctx, &mut state)
            .unwrap();
        assert_eq!(log.count_keyword("ObjectBegin"), 0);
        assert_eq!(log.count_keyword("Shape"), 1);
    }

    #[test]
    fn motion_sampled_only_when_transform_changes() {
        let mut scene = base_scene();
        let mut still = ObjectData::mesh("Still", "Cube");
        still.motion_blur = true;
        scene.insert_object(still);
        let mut moving = ObjectData::mesh("Moving", "Cube");
        moving.motion_blur = true;
        moving.motion_matrix = Some(Mat4::from_translation(glam::Vec3::Y));
        scene.insert_object(moving);

        let (mut ctx, log) = api();
        let mut state = ExportState::new(true);
        let settings = ExportSettings {
            motion_blur: true,
            ..ExportSettings::default()
        };
        SceneWalker::new(&scene, &settings)
            .walk(&mut ctx, &mut state)
            .unwrap();
        assert_eq!(log.count_keyword("MotionInstance"), 1);
        assert_eq!(log.count_keyword("ObjectInstance"), 1);
    }

    #[test]
    fn portal_meshes_are_defined_not_placed() {
        let mut scene = base_scene();
        let mut window = MeshData::quad("Window");
        window.portal = true;
        scene.insert_mesh(window);
        scene.insert_object(ObjectData::mesh("Win", "Window"));
        let (mut ctx, log) = api();
        let mut state = ExportState::new(true);
        let settings = ExportSettings::default();
        SceneWalker::new(&scene, &settings)
            .walk(&mut ctx, &mut state)
            .unwrap();
        assert_eq!(log.count_keyword("ObjectBegin"), 1);
        assert_eq!(log.count_keyword("ObjectInstance"), 0);
        assert_eq!(state.cache.portal_definitions().count(), 1);
    }
}
