use luxport_context::FileSubset;
use luxport_scene::ShapeKind;
use serde::{Deserialize, Serialize};

use crate::error::ExportError;

/// Renderer backend the scene is exported for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// Classic CPU renderer.
    #[default]
    Cpu,
    /// CPU sampling with GPU-accelerated intersection.
    Hybrid,
    /// Fully GPU renderer.
    Gpu,
}

impl Backend {
    /// Whether the backend can consume instanced primitives.
    ///
    /// GPU acceleration structures require every instance to carry its own geometry.
    pub fn supports_instancing(&self) -> bool {
        matches!(self, Self::Cpu)
    }

    pub fn renderer_name(&self) -> &'static str {
        match self {
            Self::Cpu => "sampler",
            Self::Hybrid => "hybrid",
            Self::Gpu => "slg",
        }
    }
}

/// Export-wide settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportSettings {
    pub backend: Backend,
    pub sampler: String,
    pub surface_integrator: String,
    pub volume_integrator: String,
    pub pixel_filter: String,
    pub accelerator: String,
    /// Shape kind for meshes that do not override it.
    pub default_shape: ShapeKind,
    /// Sample object and camera transforms one frame ahead.
    pub motion_blur: bool,
    /// Halt after this many samples per pixel; zero disables.
    pub halt_spp: u32,
    /// Halt after this many seconds; zero disables.
    pub halt_time: u32,
    /// Image written by the renderer, relative to the scene file.
    pub output_image: Option<String>,
    /// Film resolution replacing the scene's own, before the percentage scale.
    pub resolution: Option<(u32, u32)>,
    pub files: FileSubset,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            backend: Backend::Cpu,
            sampler: "metropolis".into(),
            surface_integrator: "bidirectional".into(),
            volume_integrator: "multi".into(),
            pixel_filter: "mitchell".into(),
            accelerator: "qbvh".into(),
            default_shape: ShapeKind::NativeMesh,
            motion_blur: false,
            halt_spp: 0,
            halt_time: 0,
            output_image: None,
            resolution: None,
            files: FileSubset::default(),
        }
    }
}

impl ExportSettings {
    /// Reject render-engine/integrator combinations the renderer cannot run.
    pub fn validate(&self) -> Result<(), ExportError> {
        if self.backend != Backend::Cpu && self.surface_integrator != "path" {
            return Err(ExportError::IncompatibleSettings(format!(
                "{} backend requires the path integrator, got {}",
                self.backend.renderer_name(),
                self.surface_integrator
            )));
        }
        Ok(())
    }
}
