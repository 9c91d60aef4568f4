use std::collections::BTreeMap;
use std::path::Path;

use glam::Mat4;
use luxport_common::ObjectId;
use serde::{Deserialize, Serialize};

use crate::data::{
    CameraData, DupliElement, LampData, MaterialData, MeshData, ObjectData, RenderSettings,
    TextureData, VolumeData,
};
use crate::host::{HostScene, SceneError};

/// Self-contained host scene held in memory.
///
/// Serves as the host for the CLI (loaded from YAML or JSON scene documents)
/// and for tests. Uses BTreeMap so that object enumeration is deterministic.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MemoryScene {
    pub name: String,
    #[serde(default)]
    pub settings: RenderSettings,
    #[serde(default)]
    objects: BTreeMap<ObjectId, ObjectData>,
    #[serde(default)]
    meshes: BTreeMap<String, MeshData>,
    /// Evaluated tessellations for objects whose modifiers change their mesh.
    #[serde(default)]
    evaluated: BTreeMap<ObjectId, MeshData>,
    #[serde(default)]
    lamps: BTreeMap<String, LampData>,
    #[serde(default)]
    cameras: BTreeMap<String, CameraData>,
    #[serde(default)]
    materials: BTreeMap<String, MaterialData>,
    #[serde(default)]
    textures: Vec<TextureData>,
    #[serde(default)]
    volumes: Vec<VolumeData>,
}

impl MemoryScene {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Default::default()
        }
    }

    /// Load a scene document; `.json` files are parsed as JSON, anything else as YAML.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, SceneError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        if path.extension().is_some_and(|e| e == "json") {
            Ok(serde_json::from_str(&text)?)
        } else {
            Self::from_yaml_str(&text)
        }
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, SceneError> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Save the scene document as pretty JSON.
    pub fn save_json(&self, path: impl AsRef<Path>) -> Result<(), SceneError> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }

    pub fn insert_object(&mut self, object: ObjectData) -> ObjectId {
        let id = object.name.clone();
        self.objects.insert(id.clone(), object);
        id
    }

    pub fn insert_mesh(&mut self, mesh: MeshData) {
        self.meshes.insert(mesh.name.clone(), mesh);
    }

    pub fn insert_lamp(&mut self, lamp: LampData) {
        self.lamps.insert(lamp.name.clone(), lamp);
    }

    pub fn insert_camera(&mut self, camera: CameraData) {
        self.cameras.insert(camera.name.clone(), camera);
    }

    pub fn insert_material(&mut self, material: MaterialData) {
        self.materials.insert(material.name.clone(), material);
    }

    pub fn insert_texture(&mut self, texture: TextureData) {
        self.textures.push(texture);
    }

    pub fn insert_volume(&mut self, volume: VolumeData) {
        self.volumes.push(volume);
    }

    /// Provide the modifier-applied tessellation of an object.
    pub fn set_evaluated_mesh(&mut self, id: &ObjectId, mesh: MeshData) {
        self.evaluated.insert(id.clone(), mesh);
    }

    pub fn object_mut(&mut self, id: &ObjectId) -> Option<&mut ObjectData> {
        self.objects.get_mut(id)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    fn require(&self, id: &ObjectId) -> Result<&ObjectData, SceneError> {
        self.objects
            .get(id)
            .ok_or_else(|| SceneError::ObjectNotFound(id.clone()))
    }
}

impl HostScene for MemoryScene {
    fn name(&self) -> &str {
        &self.name
    }

    fn render_settings(&self) -> &RenderSettings {
        &self.settings
    }

    fn objects(&self) -> Vec<ObjectId> {
        self.objects.keys().cloned().collect()
    }

    fn object(&self, id: &ObjectId) -> Option<&ObjectData> {
        self.objects.get(id)
    }

    fn world_matrix(&self, id: &ObjectId, frame: i32) -> Result<Mat4, SceneError> {
        let obj = self.require(id)?;
        if frame == self.settings.frame_current + 1 {
            Ok(obj.motion_matrix.unwrap_or(obj.matrix_world))
        } else {
            Ok(obj.matrix_world)
        }
    }

    fn dupli_list(&self, id: &ObjectId) -> Result<Vec<DupliElement>, SceneError> {
        Ok(self.require(id)?.dupli_list.clone())
    }

    fn particle_instances(
        &self,
        id: &ObjectId,
        system: usize,
    ) -> Result<Vec<DupliElement>, SceneError> {
        let obj = self.require(id)?;
        obj.particle_systems
            .get(system)
            .map(|p| p.instances.clone())
            .ok_or_else(|| SceneError::ParticleSystemNotFound {
                object: id.clone(),
                index: system,
            })
    }

    fn evaluated_mesh(&self, id: &ObjectId) -> Result<MeshData, SceneError> {
        if let Some(mesh) = self.evaluated.get(id) {
            return Ok(mesh.clone());
        }
        let obj = self.require(id)?;
        obj.data
            .as_deref()
            .and_then(|name| self.meshes.get(name))
            .cloned()
            .ok_or_else(|| SceneError::NoEvaluatedMesh(id.clone()))
    }

    fn mesh(&self, name: &str) -> Option<&MeshData> {
        self.meshes.get(name)
    }

    fn lamp(&self, name: &str) -> Option<&LampData> {
        self.lamps.get(name)
    }

    fn camera(&self, name: &str) -> Option<&CameraData> {
        self.cameras.get(name)
    }

    fn material(&self, name: &str) -> Option<&MaterialData> {
        self.materials.get(name)
    }

    fn textures(&self) -> &[TextureData] {
        &self.textures
    }

    fn volumes(&self) -> &[VolumeData] {
        &self.volumes
    }
}
