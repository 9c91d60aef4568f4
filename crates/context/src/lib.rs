//! Output sinks for renderer statements.
//!
//! # Invariants
//! - Every variant accepts the same statement vocabulary.
//! - A statement needing an undeclared capability is rejected before anything is written.
//! - Statements are written in call order.

mod api;
mod file;
mod package;
mod ply;
mod sink;
mod statement;

pub use api::{ApiContext, RecordingApi, RenderApi, StatementLog};
pub use file::{FileContext, FileSubset, format_params, format_statement};
pub use package::{PackageContext, PackageDocument, PackageRecord};
pub use ply::{PlyMesh, write_ply};
pub use sink::{Context, ContextError};
pub use statement::{Capability, LogicalFile, Statement};
