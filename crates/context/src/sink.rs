use luxport_common::ParamSet;

use crate::api::ApiContext;
use crate::file::FileContext;
use crate::package::PackageContext;
use crate::ply::PlyMesh;
use crate::statement::{Capability, LogicalFile, Statement};

/// Errors from output sinks.
#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{variant} output does not support {statement} statements")]
    Unsupported {
        variant: &'static str,
        statement: &'static str,
    },
    #[error("{variant} output lacks required capability {capability:?}")]
    MissingCapability {
        variant: &'static str,
        capability: Capability,
    },
    #[error("renderer API error: {0}")]
    Api(String),
    #[error("output is closed")]
    Closed,
}

const FILE_CAPABILITIES: &[Capability] = &[
    Capability::Materials,
    Capability::Geometry,
    Capability::ScopedTransforms,
    Capability::Instancing,
    Capability::SceneSetup,
    Capability::FilePartitioning,
    Capability::ExternalFiles,
];

const API_CAPABILITIES: &[Capability] = &[
    Capability::Materials,
    Capability::Geometry,
    Capability::ScopedTransforms,
    Capability::Instancing,
    Capability::SceneSetup,
];

const PACKAGE_CAPABILITIES: &[Capability] = &[Capability::Materials];

/// Output sink for renderer statements.
///
/// A closed set of variants, each declaring the capabilities it supports.
/// A statement that needs an undeclared capability is rejected on its first
/// call with [`ContextError::Unsupported`] and nothing is written.
pub enum Context {
    File(FileContext),
    Api(ApiContext),
    Package(PackageContext),
}

impl Context {
    pub fn variant_name(&self) -> &'static str {
        match self {
            Self::File(_) => "file",
            Self::Api(_) => "api",
            Self::Package(_) => "package",
        }
    }

    pub fn capabilities(&self) -> &'static [Capability] {
        match self {
            Self::File(_) => FILE_CAPABILITIES,
            Self::Api(_) => API_CAPABILITIES,
            Self::Package(_) => PACKAGE_CAPABILITIES,
        }
    }

    pub fn supports(&self, capability: Capability) -> bool {
        self.capabilities().contains(&capability)
    }

    /// Check up front that every capability an exporter will use is declared.
    pub fn require(&self, capabilities: &[Capability]) -> Result<(), ContextError> {
        match capabilities.iter().find(|c| !self.supports(**c)) {
            Some(&capability) => Err(ContextError::MissingCapability {
                variant: self.variant_name(),
                capability,
            }),
            None => Ok(()),
        }
    }

    pub fn emit(&mut self, statement: Statement) -> Result<(), ContextError> {
        if !self.supports(statement.capability()) {
            return Err(ContextError::Unsupported {
                variant: self.variant_name(),
                statement: statement.keyword(),
            });
        }
        tracing::trace!(statement = statement.keyword(), "emit");
        match self {
            Self::File(f) => f.emit(&statement),
            Self::Api(a) => a.emit(&statement),
            Self::Package(p) => p.emit(&statement),
        }
    }

    /// Redirect subsequent statements. Variants without file partitioning
    /// keep a single stream and ignore the request.
    pub fn set_output_file(&mut self, file: LogicalFile) {
        if let Self::File(f) = self {
            f.set_output_file(file);
        }
    }

    /// Write a binary PLY side file, returning the path to reference from a shape.
    pub fn write_ply(&mut self, name: &str, mesh: &PlyMesh<'_>) -> Result<String, ContextError> {
        match self {
            Self::File(f) => f.write_ply(name, mesh),
            _ => Err(ContextError::MissingCapability {
                variant: self.variant_name(),
                capability: Capability::ExternalFiles,
            }),
        }
    }

    /// Flush and release the underlying output. Further statements fail.
    pub fn close(&mut self) -> Result<(), ContextError> {
        match self {
            Self::File(f) => f.close(),
            Self::Api(a) => a.close(),
            Self::Package(p) => p.close(),
        }
    }

    pub fn attribute_begin(&mut self) -> Result<(), ContextError> {
        self.emit(Statement::AttributeBegin)
    }

    pub fn attribute_end(&mut self) -> Result<(), ContextError> {
        self.emit(Statement::AttributeEnd)
    }

    pub fn transform_begin(&mut self) -> Result<(), ContextError> {
        self.emit(Statement::TransformBegin)
    }

    pub fn transform_end(&mut self) -> Result<(), ContextError> {
        self.emit(Statement::TransformEnd)
    }

    pub fn identity(&mut self) -> Result<(), ContextError> {
        self.emit(Statement::Identity)
    }

    pub fn transform(&mut self, m: [f32; 16]) -> Result<(), ContextError> {
        self.emit(Statement::Transform(m))
    }

    pub fn concat_transform(&mut self, m: [f32; 16]) -> Result<(), ContextError> {
        self.emit(Statement::ConcatTransform(m))
    }

    pub fn look_at(
        &mut self,
        eye: [f32; 3],
        target: [f32; 3],
        up: [f32; 3],
    ) -> Result<(), ContextError> {
        self.emit(Statement::LookAt { eye, target, up })
    }

    pub fn coordinate_system(&mut self, name: &str) -> Result<(), ContextError> {
        self.emit(Statement::CoordinateSystem(name.to_string()))
    }

    pub fn coord_sys_transform(&mut self, name: &str) -> Result<(), ContextError> {
        self.emit(Statement::CoordSysTransform(name.to_string()))
    }

    pub fn camera(&mut self, kind: &str, params: ParamSet) -> Result<(), ContextError> {
        self.emit(Statement::Camera {
            kind: kind.to_string(),
            params,
        })
    }

    pub fn film(&mut self, kind: &str, params: ParamSet) -> Result<(), ContextError> {
        self.emit(Statement::Film {
            kind: kind.to_string(),
            params,
        })
    }

    pub fn sampler(&mut self, kind: &str, params: ParamSet) -> Result<(), ContextError> {
        self.emit(Statement::Sampler {
            kind: kind.to_string(),
            params,
        })
    }

    pub fn surface_integrator(&mut self, kind: &str, params: ParamSet) -> Result<(), ContextError> {
        self.emit(Statement::SurfaceIntegrator {
            kind: kind.to_string(),
            params,
        })
    }

    pub fn volume_integrator(&mut self, kind: &str, params: ParamSet) -> Result<(), ContextError> {
        self.emit(Statement::VolumeIntegrator {
            kind: kind.to_string(),
            params,
        })
    }

    pub fn pixel_filter(&mut self, kind: &str, params: ParamSet) -> Result<(), ContextError> {
        self.emit(Statement::PixelFilter {
            kind: kind.to_string(),
            params,
        })
    }

    pub fn accelerator(&mut self, kind: &str, params: ParamSet) -> Result<(), ContextError> {
        self.emit(Statement::Accelerator {
            kind: kind.to_string(),
            params,
        })
    }

    pub fn world_begin(&mut self) -> Result<(), ContextError> {
        self.emit(Statement::WorldBegin)
    }

    pub fn world_end(&mut self) -> Result<(), ContextError> {
        self.emit(Statement::WorldEnd)
    }

    pub fn texture(
        &mut self,
        name: &str,
        variant: &str,
        kind: &str,
        params: ParamSet,
    ) -> Result<(), ContextError> {
        self.emit(Statement::Texture {
            name: name.to_string(),
            variant: variant.to_string(),
            kind: kind.to_string(),
            params,
        })
    }

    pub fn material(&mut self, kind: &str, params: ParamSet) -> Result<(), ContextError> {
        self.emit(Statement::Material {
            kind: kind.to_string(),
            params,
        })
    }

    pub fn make_named_material(&mut self, name: &str, params: ParamSet) -> Result<(), ContextError> {
        self.emit(Statement::MakeNamedMaterial {
            name: name.to_string(),
            params,
        })
    }

    pub fn named_material(&mut self, name: &str) -> Result<(), ContextError> {
        self.emit(Statement::NamedMaterial(name.to_string()))
    }

    pub fn make_named_volume(
        &mut self,
        name: &str,
        kind: &str,
        params: ParamSet,
    ) -> Result<(), ContextError> {
        self.emit(Statement::MakeNamedVolume {
            name: name.to_string(),
            kind: kind.to_string(),
            params,
        })
    }

    pub fn interior(&mut self, name: &str) -> Result<(), ContextError> {
        self.emit(Statement::Interior(name.to_string()))
    }

    pub fn exterior(&mut self, name: &str) -> Result<(), ContextError> {
        self.emit(Statement::Exterior(name.to_string()))
    }

    pub fn light_group(&mut self, name: &str, params: ParamSet) -> Result<(), ContextError> {
        self.emit(Statement::LightGroup {
            name: name.to_string(),
            params,
        })
    }

    pub fn light_source(&mut self, kind: &str, params: ParamSet) -> Result<(), ContextError> {
        self.emit(Statement::LightSource {
            kind: kind.to_string(),
            params,
        })
    }

    pub fn area_light_source(&mut self, kind: &str, params: ParamSet) -> Result<(), ContextError> {
        self.emit(Statement::AreaLightSource {
            kind: kind.to_string(),
            params,
        })
    }

    pub fn shape(&mut self, kind: &str, params: ParamSet) -> Result<(), ContextError> {
        self.emit(Statement::Shape {
            kind: kind.to_string(),
            params,
        })
    }

    pub fn object_begin(&mut self, name: &str) -> Result<(), ContextError> {
        self.emit(Statement::ObjectBegin(name.to_string()))
    }

    pub fn object_end(&mut self) -> Result<(), ContextError> {
        self.emit(Statement::ObjectEnd)
    }

    pub fn object_instance(&mut self, name: &str) -> Result<(), ContextError> {
        self.emit(Statement::ObjectInstance(name.to_string()))
    }

    pub fn motion_instance(
        &mut self,
        name: &str,
        start: f32,
        stop: f32,
        to: &str,
    ) -> Result<(), ContextError> {
        self.emit(Statement::MotionInstance {
            name: name.to_string(),
            start,
            stop,
            to: to.to_string(),
        })
    }

    pub fn portal_instance(&mut self, name: &str) -> Result<(), ContextError> {
        self.emit(Statement::PortalInstance(name.to_string()))
    }
}
