//! Render process supervision.
//!
//! A [`RenderSupervisor`] starts a renderer through a [`RenderControl`]
//! handle, polls its statistics and framebuffer on background threads, and
//! tears everything down in a fixed order once the render ends.
//!
//! # Invariants
//! - Both pollers are stopped before the renderer handle is released.
//! - A crashed renderer is reported as [`TerminationReason::Crashed`], never as a finished film.
//! - Starting an already started supervisor has no effect.

mod control;
mod poller;
mod process;
mod supervisor;

pub use control::{Framebuffer, Liveness, RenderControl, RenderHost, StatKey, SupervisorError};
pub use poller::{Flow, Poller};
pub use process::ExternalProcess;
pub use supervisor::{
    RenderSupervisor, SupervisorConfig, SupervisorState, TerminationReason, check_termination,
    format_status,
};
