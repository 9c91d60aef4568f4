use glam::{Mat4, Vec3};
use luxport_common::{ObjectId, ParamSet};
use serde::{Deserialize, Serialize};

/// Host object type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObjectKind {
    Mesh,
    Lamp,
    Camera,
    Empty,
    Other,
}

/// How a host object procedurally duplicates other objects.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DupliKind {
    #[default]
    None,
    Group,
    Faces,
    Verts,
    Frames,
}

/// One entry of a modifier stack.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Modifier {
    pub name: String,
    pub kind: String,
    /// Whether the modifier is evaluated for final renders.
    #[serde(default = "default_true")]
    pub show_render: bool,
}

/// Particle render type as configured on the particle settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticleRenderType {
    Object,
    Group,
    Path,
    Halo,
    Line,
    Billboard,
    None,
}

/// One duplicated copy produced by a duplicator or a particle system.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DupliElement {
    /// Object whose data is instanced by this element.
    pub object: ObjectId,
    /// World matrix of this copy.
    pub matrix: Mat4,
    /// World matrix of this copy one frame forward, when the host can sample it.
    #[serde(default)]
    pub motion_matrix: Option<Mat4>,
}

/// Particle system attached to an object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticleSystem {
    pub name: String,
    pub render_type: ParticleRenderType,
    /// Whether the emitter object itself is rendered alongside its particles.
    #[serde(default)]
    pub render_emitter: bool,
    /// Realized particle copies at the current frame.
    #[serde(default)]
    pub instances: Vec<DupliElement>,
}

/// Host object record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectData {
    pub name: ObjectId,
    pub kind: ObjectKind,
    #[serde(default)]
    pub parent: Option<ObjectId>,
    #[serde(default = "default_true")]
    pub visible: bool,
    #[serde(default = "default_true")]
    pub render_enabled: bool,
    #[serde(default = "identity")]
    pub matrix_world: Mat4,
    /// World matrix sampled one frame forward.
    #[serde(default)]
    pub motion_matrix: Option<Mat4>,
    #[serde(default)]
    pub motion_blur: bool,
    #[serde(default)]
    pub dupli: DupliKind,
    /// Realized dupli copies; only meaningful when `dupli` is not `None`.
    #[serde(default)]
    pub dupli_list: Vec<DupliElement>,
    #[serde(default)]
    pub particle_systems: Vec<ParticleSystem>,
    #[serde(default)]
    pub modifiers: Vec<Modifier>,
    /// Name of the mesh, lamp or camera data block.
    #[serde(default)]
    pub data: Option<String>,
    /// Material slots; `None` entries are empty slots.
    #[serde(default)]
    pub material_slots: Vec<Option<String>>,
    #[serde(default)]
    pub interior: Option<String>,
    #[serde(default)]
    pub exterior: Option<String>,
}

impl ObjectData {
    fn base(name: &str, kind: ObjectKind, data: Option<&str>) -> Self {
        Self {
            name: ObjectId::new(name),
            kind,
            parent: None,
            visible: true,
            render_enabled: true,
            matrix_world: Mat4::IDENTITY,
            motion_matrix: None,
            motion_blur: false,
            dupli: DupliKind::None,
            dupli_list: Vec::new(),
            particle_systems: Vec::new(),
            modifiers: Vec::new(),
            data: data.map(str::to_string),
            material_slots: Vec::new(),
            interior: None,
            exterior: None,
        }
    }

    pub fn mesh(name: &str, mesh: &str) -> Self {
        Self::base(name, ObjectKind::Mesh, Some(mesh))
    }

    pub fn lamp(name: &str, lamp: &str) -> Self {
        Self::base(name, ObjectKind::Lamp, Some(lamp))
    }

    pub fn camera(name: &str, camera: &str) -> Self {
        Self::base(name, ObjectKind::Camera, Some(camera))
    }

    pub fn empty(name: &str) -> Self {
        Self::base(name, ObjectKind::Empty, None)
    }

    pub fn with_matrix(mut self, m: Mat4) -> Self {
        self.matrix_world = m;
        self
    }

    pub fn with_material(mut self, material: &str) -> Self {
        self.material_slots.push(Some(material.to_string()));
        self
    }

    pub fn with_modifier(mut self, name: &str, kind: &str) -> Self {
        self.modifiers.push(Modifier {
            name: name.to_string(),
            kind: kind.to_string(),
            show_render: true,
        });
        self
    }

    /// Whether any render-enabled modifier changes this object's tessellation.
    pub fn has_render_modifiers(&self) -> bool {
        self.modifiers.iter().any(|m| m.show_render)
    }

    pub fn is_duplicator(&self) -> bool {
        self.dupli != DupliKind::None
    }
}

/// Shape kind requested by a mesh's export settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ShapeKind {
    NativeMesh,
    BinaryPly,
    Subdiv,
}

/// Per-mesh export settings stored on the host mesh data block.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MeshExportSettings {
    /// Overrides the export-wide default shape kind.
    #[serde(default)]
    pub shape: Option<ShapeKind>,
    #[serde(default)]
    pub subdiv_levels: u32,
    /// Shape-specific parameters merged into the emitted definition.
    #[serde(default)]
    pub extra: ParamSet,
}

/// Polygon of a tessellated mesh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Face {
    pub vertices: Vec<u32>,
    #[serde(default)]
    pub material_index: usize,
    #[serde(default)]
    pub smooth: bool,
    /// Per-corner coordinates from the active UV layer; empty without one.
    #[serde(default)]
    pub uvs: Vec<[f32; 2]>,
}

impl Face {
    pub fn new(vertices: &[u32]) -> Self {
        Self {
            vertices: vertices.to_vec(),
            material_index: 0,
            smooth: false,
            uvs: Vec::new(),
        }
    }

    pub fn with_material(mut self, index: usize) -> Self {
        self.material_index = index;
        self
    }

    pub fn smooth(mut self) -> Self {
        self.smooth = true;
        self
    }
}

/// Host mesh data block, or an evaluated tessellation of one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MeshData {
    pub name: String,
    pub vertices: Vec<Vec3>,
    /// Per-vertex normals used by smooth faces.
    #[serde(default)]
    pub normals: Vec<Vec3>,
    pub faces: Vec<Face>,
    /// Whether this mesh acts as a light portal.
    #[serde(default)]
    pub portal: bool,
    #[serde(default)]
    pub export: MeshExportSettings,
}

impl MeshData {
    /// Unit quad in the XY plane.
    pub fn quad(name: &str) -> Self {
        Self {
            name: name.to_string(),
            vertices: vec![
                Vec3::new(-1.0, -1.0, 0.0),
                Vec3::new(1.0, -1.0, 0.0),
                Vec3::new(1.0, 1.0, 0.0),
                Vec3::new(-1.0, 1.0, 0.0),
            ],
            normals: vec![Vec3::Z; 4],
            faces: vec![Face::new(&[0, 1, 2, 3])],
            portal: false,
            export: MeshExportSettings::default(),
        }
    }

    /// Axis-aligned cube with six quads, each face using `material_index` = face / 3.
    pub fn cube(name: &str) -> Self {
        let v = |x: f32, y: f32, z: f32| Vec3::new(x, y, z);
        let vertices = vec![
            v(-1.0, -1.0, -1.0),
            v(1.0, -1.0, -1.0),
            v(1.0, 1.0, -1.0),
            v(-1.0, 1.0, -1.0),
            v(-1.0, -1.0, 1.0),
            v(1.0, -1.0, 1.0),
            v(1.0, 1.0, 1.0),
            v(-1.0, 1.0, 1.0),
        ];
        let normals = vertices.iter().map(|p| p.normalize()).collect();
        let quads: [[u32; 4]; 6] = [
            [0, 3, 2, 1],
            [4, 5, 6, 7],
            [0, 1, 5, 4],
            [2, 3, 7, 6],
            [1, 2, 6, 5],
            [0, 4, 7, 3],
        ];
        let faces = quads
            .iter()
            .enumerate()
            .map(|(i, q)| Face::new(q).with_material(i / 3))
            .collect();
        Self {
            name: name.to_string(),
            vertices,
            normals,
            faces,
            portal: false,
            export: MeshExportSettings::default(),
        }
    }
}

/// Sky model used by sun lamps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SkyMode {
    Sun,
    Sky,
    SunSky,
}

/// Lamp type together with its type-specific settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LampKind {
    Point,
    Spot {
        /// Full cone angle in radians.
        size: f32,
        /// Fraction of the cone used for falloff.
        blend: f32,
        #[serde(default)]
        projector: Option<String>,
    },
    Sun {
        sky: SkyMode,
        #[serde(default = "default_turbidity")]
        turbidity: f32,
    },
    Hemi {
        #[serde(default)]
        map: Option<String>,
    },
    Area {
        size_x: f32,
        size_y: f32,
    },
}

/// Host lamp data block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LampData {
    pub name: String,
    pub kind: LampKind,
    #[serde(default = "default_white")]
    pub color: [f32; 3],
    #[serde(default = "default_one")]
    pub gain: f32,
    #[serde(default)]
    pub power: f32,
    #[serde(default)]
    pub efficacy: f32,
    #[serde(default = "default_group")]
    pub light_group: String,
    /// Reference portal-flagged meshes when sampling this light.
    #[serde(default)]
    pub use_portals: bool,
}

impl LampData {
    pub fn new(name: &str, kind: LampKind) -> Self {
        Self {
            name: name.to_string(),
            kind,
            color: default_white(),
            gain: 1.0,
            power: 0.0,
            efficacy: 0.0,
            light_group: default_group(),
            use_portals: false,
        }
    }

    pub fn in_group(mut self, group: &str) -> Self {
        self.light_group = group.to_string();
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraKind {
    Perspective,
    Orthographic,
    Environment,
}

/// Host camera data block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraData {
    pub name: String,
    pub kind: CameraKind,
    /// Focal length in millimetres.
    #[serde(default = "default_lens")]
    pub lens: f32,
    #[serde(default = "default_sensor")]
    pub sensor_width: f32,
    #[serde(default)]
    pub shift_x: f32,
    #[serde(default)]
    pub shift_y: f32,
    #[serde(default = "default_ortho_scale")]
    pub ortho_scale: f32,
    #[serde(default = "default_clip_start")]
    pub clip_start: f32,
    #[serde(default = "default_clip_end")]
    pub clip_end: f32,
    /// Lens radius; zero disables depth of field.
    #[serde(default)]
    pub lens_radius: f32,
    #[serde(default)]
    pub focal_distance: f32,
}

impl CameraData {
    pub fn perspective(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: CameraKind::Perspective,
            lens: default_lens(),
            sensor_width: default_sensor(),
            shift_x: 0.0,
            shift_y: 0.0,
            ortho_scale: default_ortho_scale(),
            clip_start: default_clip_start(),
            clip_end: default_clip_end(),
            lens_radius: 0.0,
            focal_distance: 0.0,
        }
    }
}

/// Light emission settings of a material.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Emission {
    #[serde(default = "default_white")]
    pub color: [f32; 3],
    #[serde(default = "default_one")]
    pub gain: f32,
    #[serde(default)]
    pub power: f32,
    #[serde(default)]
    pub efficacy: f32,
    #[serde(default = "default_group")]
    pub light_group: String,
}

impl Default for Emission {
    fn default() -> Self {
        Self {
            color: default_white(),
            gain: 1.0,
            power: 0.0,
            efficacy: 0.0,
            light_group: default_group(),
        }
    }
}

/// Host material data block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaterialData {
    pub name: String,
    /// Renderer material type, e.g. `matte` or `glossy`.
    pub kind: String,
    #[serde(default)]
    pub params: ParamSet,
    #[serde(default)]
    pub emission: Option<Emission>,
    #[serde(default)]
    pub interior: Option<String>,
    #[serde(default)]
    pub exterior: Option<String>,
}

impl MaterialData {
    pub fn matte(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: "matte".into(),
            params: ParamSet::new().add_color("Kd", [0.8, 0.8, 0.8]),
            emission: None,
            interior: None,
            exterior: None,
        }
    }

    pub fn emitting(name: &str, group: &str) -> Self {
        Self {
            emission: Some(Emission {
                light_group: group.to_string(),
                ..Emission::default()
            }),
            ..Self::matte(name)
        }
    }
}

/// Host texture data block, emitted ahead of the materials that use it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureData {
    pub name: String,
    /// `float` or `color`.
    pub variant: String,
    pub kind: String,
    #[serde(default)]
    pub params: ParamSet,
}

/// Participating medium registered with the renderer by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeData {
    pub name: String,
    pub kind: String,
    #[serde(default)]
    pub params: ParamSet,
}

/// Light group as configured in the scene settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightGroupSetting {
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_one")]
    pub gain: f32,
}

/// Scene-wide render settings the exporter reads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RenderSettings {
    pub resolution_x: u32,
    pub resolution_y: u32,
    #[serde(default = "default_percentage")]
    pub resolution_percentage: u32,
    #[serde(default)]
    pub frame_current: i32,
    #[serde(default)]
    pub active_camera: Option<ObjectId>,
    #[serde(default)]
    pub light_groups: Vec<LightGroupSetting>,
    /// Volume assigned to geometry without an explicit exterior.
    #[serde(default)]
    pub world_exterior: Option<String>,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            resolution_x: 1920,
            resolution_y: 1080,
            resolution_percentage: 100,
            frame_current: 1,
            active_camera: None,
            light_groups: Vec::new(),
            world_exterior: None,
        }
    }
}

impl RenderSettings {
    /// Effective film resolution after the percentage scale.
    pub fn film_resolution(&self) -> (u32, u32) {
        (
            self.scale_resolution(self.resolution_x),
            self.scale_resolution(self.resolution_y),
        )
    }

    /// Scale one film dimension by the resolution percentage, at least 1 and
    /// saturating at `u32::MAX`.
    pub fn scale_resolution(&self, v: u32) -> u32 {
        let scaled = u64::from(v) * u64::from(self.resolution_percentage) / 100;
        u32::try_from(scaled).unwrap_or(u32::MAX).max(1)
    }

    /// Whether a light group is enabled. Groups absent from the settings are enabled.
    pub fn light_group_enabled(&self, name: &str) -> bool {
        self.light_groups
            .iter()
            .find(|g| g.name == name)
            .is_none_or(|g| g.enabled)
    }
}

fn default_true() -> bool {
    true
}

fn default_one() -> f32 {
    1.0
}

fn default_white() -> [f32; 3] {
    [1.0, 1.0, 1.0]
}

fn default_group() -> String {
    "default".into()
}

fn default_turbidity() -> f32 {
    2.2
}

fn default_lens() -> f32 {
    50.0
}

fn default_sensor() -> f32 {
    32.0
}

fn default_ortho_scale() -> f32 {
    7.314
}

fn default_clip_start() -> f32 {
    0.1
}

fn default_clip_end() -> f32 {
    100.0
}

fn default_percentage() -> u32 {
    100
}

fn identity() -> Mat4 {
    Mat4::IDENTITY
}
