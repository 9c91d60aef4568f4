use glam::Mat4;
use luxport_common::ObjectId;

use crate::data::{
    CameraData, DupliElement, LampData, MaterialData, MeshData, ObjectData, RenderSettings,
    TextureData, VolumeData,
};

/// Errors raised by host scene queries.
#[derive(Debug, thiserror::Error)]
pub enum SceneError {
    #[error("object not found: {0}")]
    ObjectNotFound(ObjectId),
    #[error("object {0} has no evaluated mesh")]
    NoEvaluatedMesh(ObjectId),
    #[error("particle system {index} not found on {object}")]
    ParticleSystemNotFound { object: ObjectId, index: usize },
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read-only view of the host application's scene.
///
/// The exporter never mutates the host scene. Objects are enumerated in a
/// stable order so that two exports of the same scene produce identical output.
pub trait HostScene {
    /// Scene name, used to derive output file names.
    fn name(&self) -> &str;

    fn render_settings(&self) -> &RenderSettings;

    /// All objects in the scene, in deterministic order.
    fn objects(&self) -> Vec<ObjectId>;

    fn object(&self, id: &ObjectId) -> Option<&ObjectData>;

    /// World matrix of an object at an arbitrary frame.
    fn world_matrix(&self, id: &ObjectId, frame: i32) -> Result<Mat4, SceneError>;

    /// Realized copies of a duplicator object at the current frame.
    fn dupli_list(&self, id: &ObjectId) -> Result<Vec<DupliElement>, SceneError>;

    /// Realized copies of one particle system at the current frame.
    fn particle_instances(
        &self,
        id: &ObjectId,
        system: usize,
    ) -> Result<Vec<DupliElement>, SceneError>;

    /// Render-ready mesh of an object with its modifier stack applied.
    fn evaluated_mesh(&self, id: &ObjectId) -> Result<MeshData, SceneError>;

    /// Unevaluated mesh data block by name.
    fn mesh(&self, name: &str) -> Option<&MeshData>;

    fn lamp(&self, name: &str) -> Option<&LampData>;

    fn camera(&self, name: &str) -> Option<&CameraData>;

    fn material(&self, name: &str) -> Option<&MaterialData>;

    fn textures(&self) -> &[TextureData];

    fn volumes(&self) -> &[VolumeData];

    fn frame_current(&self) -> i32 {
        self.render_settings().frame_current
    }

    /// Whether the object is visible and enabled for final renders.
    fn is_renderable(&self, id: &ObjectId) -> bool {
        self.object(id)
            .is_some_and(|o| o.visible && o.render_enabled)
    }

    /// Objects that pass [`HostScene::is_renderable`].
    fn renderable_objects(&self) -> Vec<ObjectId> {
        self.objects()
            .into_iter()
            .filter(|id| self.is_renderable(id))
            .collect()
    }
}
