use std::path::PathBuf;

/// Errors from render process control.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error("renderer binary not found: {0}")]
    RendererNotFound(PathBuf),
    #[error("output directory not writable: {0}")]
    OutputNotWritable(PathBuf),
    #[error("failed to spawn renderer: {0}")]
    Spawn(#[source] std::io::Error),
    #[error("failed to spawn poller thread: {0}")]
    Thread(#[source] std::io::Error),
    #[error("renderer handle already released")]
    Released,
    #[error("framebuffer unavailable: {0}")]
    Framebuffer(String),
}

/// Renderer statistic keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatKey {
    FilmIsReady,
    Terminated,
    EnoughSamples,
    FilmXres,
    FilmYres,
    SecElapsed,
    SamplesSec,
    SamplesPx,
}

impl StatKey {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FilmIsReady => "filmIsReady",
            Self::Terminated => "terminated",
            Self::EnoughSamples => "enoughSamples",
            Self::FilmXres => "filmXres",
            Self::FilmYres => "filmYres",
            Self::SecElapsed => "secElapsed",
            Self::SamplesSec => "samplesSec",
            Self::SamplesPx => "samplesPx",
        }
    }
}

/// Whether the renderer is still running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Running,
    /// Stopped with a success status.
    Exited,
    /// Stopped abnormally, with the exit code when one is known.
    Crashed(Option<i32>),
}

/// Current rendered image.
#[derive(Debug, Clone, PartialEq)]
pub enum Framebuffer {
    /// Linear RGB pixels, row-major.
    Pixels {
        width: u32,
        height: u32,
        rgb: Vec<f32>,
    },
    /// Image file the renderer keeps rewriting.
    File(PathBuf),
}

/// Handle onto a running renderer.
///
/// Methods take `&self` so the handle can be shared with poller threads.
pub trait RenderControl: Send + Sync {
    /// Signal that the scene is complete and rendering may start.
    fn world_end(&self) -> Result<(), SupervisorError> {
        Ok(())
    }

    fn statistic(&self, key: StatKey) -> f64;

    fn framebuffer(&self) -> Result<Framebuffer, SupervisorError>;

    fn liveness(&self) -> Liveness {
        Liveness::Running
    }

    /// Ask the renderer to stop.
    fn exit(&self);

    /// Block until the renderer has stopped.
    fn wait(&self);

    /// Release renderer resources.
    fn cleanup(&self);
}

/// Host application side of a render: status line, image display and the
/// user's stop request.
pub trait RenderHost: Send + Sync {
    /// Whether the user asked to stop the render.
    fn test_break(&self) -> bool {
        false
    }

    fn update_status(&self, _status: &str) {}

    fn refresh_image(&self, _framebuffer: &Framebuffer) {}
}
