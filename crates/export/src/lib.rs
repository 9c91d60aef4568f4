//! Scene export: turns a host scene into renderer statements.
//!
//! An [`ExportSession`] walks the scene, builds one mesh definition per used
//! material slot, places objects as instances where the sink and backend
//! allow it, and writes lights, camera and render setup around the geometry.
//!
//! # Invariants
//! - A definition name is emitted at most once per export.
//! - Emitting geometry is always written as full shapes, never instanced.
//! - A scene with no lamps and no emitters aborts before `WorldEnd`.
//! - Per-object failures skip the object; everything else aborts the export.
//! - At most one session holds an [`ExportSlot`] at a time.

mod cache;
mod camera;
mod error;
mod geometry;
mod lights;
mod materials;
mod mesh;
mod session;
mod settings;
mod setup;
mod state;
mod walker;

pub use cache::InstancingCache;
pub use camera::{CAMERA_END_TRANSFORM, export_camera, field_of_view, screen_window};
pub use error::{ExportError, ObjectFailure};
pub use geometry::{PlacementMode, build_mesh, define_portal, place};
pub use lights::{LightGroupRegistry, export_lights};
pub use materials::{
    Media, MaterialRegistry, active_emission, emission_params, export_material_package,
    material_params, object_emits,
};
pub use mesh::{
    GeometryDigest, MeshDefinition, MeshPartition, definition_name, fan_triangles, mesh_identity,
    portal_identity, split_by_material,
};
pub use session::{ExportReport, ExportSession, ExportSlot, SlotGuard};
pub use settings::{Backend, ExportSettings};
pub use setup::{export_render_setup, film_resolution};
pub use state::{ExportState, ExportStats};
pub use walker::{Expansion, SceneWalker, WalkOutcome};
