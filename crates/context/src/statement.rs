use luxport_common::ParamSet;
use serde::{Deserialize, Serialize};

/// Capability a sink must declare before it accepts a statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Capability {
    /// Materials, textures and named volumes.
    Materials,
    /// Shapes, lights, named material/medium selection.
    Geometry,
    /// Attribute/transform blocks, transforms and coordinate systems.
    ScopedTransforms,
    /// Named primitive blocks and instance references.
    Instancing,
    /// Camera, film, sampler, integrators and world begin/end.
    SceneSetup,
    /// Redirecting statements into separate logical output files.
    FilePartitioning,
    /// Writing side files such as binary PLY meshes.
    ExternalFiles,
}

/// Logical output file of a partitioned export.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LogicalFile {
    Main,
    Materials,
    Geometry,
    Volumes,
}

impl LogicalFile {
    pub const PARTITIONS: [LogicalFile; 3] = [
        LogicalFile::Volumes,
        LogicalFile::Materials,
        LogicalFile::Geometry,
    ];
}

/// One renderer scene-description statement.
///
/// This is the vocabulary every sink variant consumes; sinks differ only in
/// how they serialize it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Statement {
    AttributeBegin,
    AttributeEnd,
    TransformBegin,
    TransformEnd,
    Identity,
    Transform([f32; 16]),
    ConcatTransform([f32; 16]),
    LookAt {
        eye: [f32; 3],
        target: [f32; 3],
        up: [f32; 3],
    },
    CoordinateSystem(String),
    CoordSysTransform(String),
    Camera {
        kind: String,
        params: ParamSet,
    },
    Film {
        kind: String,
        params: ParamSet,
    },
    Sampler {
        kind: String,
        params: ParamSet,
    },
    SurfaceIntegrator {
        kind: String,
        params: ParamSet,
    },
    VolumeIntegrator {
        kind: String,
        params: ParamSet,
    },
    PixelFilter {
        kind: String,
        params: ParamSet,
    },
    Accelerator {
        kind: String,
        params: ParamSet,
    },
    WorldBegin,
    WorldEnd,
    Texture {
        name: String,
        variant: String,
        kind: String,
        params: ParamSet,
    },
    Material {
        kind: String,
        params: ParamSet,
    },
    MakeNamedMaterial {
        name: String,
        params: ParamSet,
    },
    NamedMaterial(String),
    MakeNamedVolume {
        name: String,
        kind: String,
        params: ParamSet,
    },
    Interior(String),
    Exterior(String),
    LightGroup {
        name: String,
        params: ParamSet,
    },
    LightSource {
        kind: String,
        params: ParamSet,
    },
    AreaLightSource {
        kind: String,
        params: ParamSet,
    },
    Shape {
        kind: String,
        params: ParamSet,
    },
    ObjectBegin(String),
    ObjectEnd,
    ObjectInstance(String),
    MotionInstance {
        name: String,
        start: f32,
        stop: f32,
        to: String,
    },
    PortalInstance(String),
}

impl Statement {
    /// Statement keyword as written in scene files.
    pub fn keyword(&self) -> &'static str {
        match self {
            Self::AttributeBegin => "AttributeBegin",
            Self::AttributeEnd => "AttributeEnd",
            Self::TransformBegin => "TransformBegin",
            Self::TransformEnd => "TransformEnd",
            Self::Identity => "Identity",
            Self::Transform(_) => "Transform",
            Self::ConcatTransform(_) => "ConcatTransform",
            Self::LookAt { .. } => "LookAt",
            Self::CoordinateSystem(_) => "CoordinateSystem",
            Self::CoordSysTransform(_) => "CoordSysTransform",
            Self::Camera { .. } => "Camera",
            Self::Film { .. } => "Film",
            Self::Sampler { .. } => "Sampler",
            Self::SurfaceIntegrator { .. } => "SurfaceIntegrator",
            Self::VolumeIntegrator { .. } => "VolumeIntegrator",
            Self::PixelFilter { .. } => "PixelFilter",
            Self::Accelerator { .. } => "Accelerator",
            Self::WorldBegin => "WorldBegin",
            Self::WorldEnd => "WorldEnd",
            Self::Texture { .. } => "Texture",
            Self::Material { .. } => "Material",
            Self::MakeNamedMaterial { .. } => "MakeNamedMaterial",
            Self::NamedMaterial(_) => "NamedMaterial",
            Self::MakeNamedVolume { .. } => "MakeNamedVolume",
            Self::Interior(_) => "Interior",
            Self::Exterior(_) => "Exterior",
            Self::LightGroup { .. } => "LightGroup",
            Self::LightSource { .. } => "LightSource",
            Self::AreaLightSource { .. } => "AreaLightSource",
            Self::Shape { .. } => "Shape",
            Self::ObjectBegin(_) => "ObjectBegin",
            Self::ObjectEnd => "ObjectEnd",
            Self::ObjectInstance(_) => "ObjectInstance",
            Self::MotionInstance { .. } => "MotionInstance",
            Self::PortalInstance(_) => "PortalInstance",
        }
    }

    /// Capability a sink needs to accept this statement.
    pub fn capability(&self) -> Capability {
        match self {
            Self::AttributeBegin
            | Self::AttributeEnd
            | Self::TransformBegin
            | Self::TransformEnd
            | Self::Identity
            | Self::Transform(_)
            | Self::ConcatTransform(_)
            | Self::LookAt { .. }
            | Self::CoordinateSystem(_)
            | Self::CoordSysTransform(_) => Capability::ScopedTransforms,
            Self::Camera { .. }
            | Self::Film { .. }
            | Self::Sampler { .. }
            | Self::SurfaceIntegrator { .. }
            | Self::VolumeIntegrator { .. }
            | Self::PixelFilter { .. }
            | Self::Accelerator { .. }
            | Self::WorldBegin
            | Self::WorldEnd => Capability::SceneSetup,
            Self::Texture { .. }
            | Self::Material { .. }
            | Self::MakeNamedMaterial { .. }
            | Self::MakeNamedVolume { .. } => Capability::Materials,
            Self::NamedMaterial(_)
            | Self::Interior(_)
            | Self::Exterior(_)
            | Self::LightGroup { .. }
            | Self::LightSource { .. }
            | Self::AreaLightSource { .. }
            | Self::Shape { .. } => Capability::Geometry,
            Self::ObjectBegin(_)
            | Self::ObjectEnd
            | Self::ObjectInstance(_)
            | Self::MotionInstance { .. }
            | Self::PortalInstance(_) => Capability::Instancing,
        }
    }

    /// Name carried by the statement, if any. Used as the record name by the packaging sink.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::CoordinateSystem(n)
            | Self::CoordSysTransform(n)
            | Self::NamedMaterial(n)
            | Self::Interior(n)
            | Self::Exterior(n)
            | Self::ObjectBegin(n)
            | Self::ObjectInstance(n)
            | Self::PortalInstance(n) => Some(n),
            Self::Texture { name, .. }
            | Self::MakeNamedMaterial { name, .. }
            | Self::MakeNamedVolume { name, .. }
            | Self::LightGroup { name, .. }
            | Self::MotionInstance { name, .. } => Some(name),
            _ => None,
        }
    }

    /// Parameter payload of the statement, if it carries one.
    pub fn params(&self) -> Option<&ParamSet> {
        match self {
            Self::Camera { params, .. }
            | Self::Film { params, .. }
            | Self::Sampler { params, .. }
            | Self::SurfaceIntegrator { params, .. }
            | Self::VolumeIntegrator { params, .. }
            | Self::PixelFilter { params, .. }
            | Self::Accelerator { params, .. }
            | Self::Texture { params, .. }
            | Self::Material { params, .. }
            | Self::MakeNamedMaterial { params, .. }
            | Self::MakeNamedVolume { params, .. }
            | Self::LightGroup { params, .. }
            | Self::LightSource { params, .. }
            | Self::AreaLightSource { params, .. }
            | Self::Shape { params, .. } => Some(params),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn instancing_statements_need_instancing() {
        assert_eq!(
            Statement::ObjectBegin("m".into()).capability(),
            Capability::Instancing
        );
        assert_eq!(
            Statement::PortalInstance("p".into()).capability(),
            Capability::Instancing
        );
        assert_eq!(
            Statement::Shape {
                kind: "trianglemesh".into(),
                params: ParamSet::new()
            }
            .capability(),
            Capability::Geometry
        );
    }

    #[test]
    fn names_and_params() {
        let s = Statement::MakeNamedMaterial {
            name: "Red".into(),
            params: ParamSet::new().add_string("type", "matte"),
        };
        assert_eq!(s.keyword(), "MakeNamedMaterial");
        assert_eq!(s.name(), Some("Red"));
        assert_eq!(s.params().map(|p| p.len()), Some(1));
        assert_eq!(Statement::WorldEnd.name(), None);
    }
}
