//! Host scene interface: read-only accessors the exporter consumes.
//!
//! # Invariants
//! - The exporter never mutates host data.
//! - Object enumeration order is stable across calls.

mod data;
mod host;
mod memory;

pub use data::{
    CameraData, CameraKind, DupliElement, DupliKind, Emission, Face, LampData, LampKind,
    LightGroupSetting, MaterialData, MeshData, MeshExportSettings, Modifier, ObjectData,
    ObjectKind, ParticleRenderType, ParticleSystem, RenderSettings, ShapeKind, SkyMode,
    TextureData, VolumeData,
};
pub use host::{HostScene, SceneError};
pub use memory::MemoryScene;
