use luxport_common::ObjectId;
use luxport_context::ContextError;
use luxport_scene::SceneError;
use serde::Serialize;

/// Errors from the export pipeline.
///
/// Per-object variants (see [`ExportError::is_per_object`]) are caught at the
/// object boundary by the walker; everything else aborts the export.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("invalid geometry on {object}: {reason}")]
    InvalidGeometry { object: ObjectId, reason: String },
    #[error("mesh definition not found: {0}")]
    NotFound(String),
    #[error("mesh definition {0} re-added with different geometry")]
    ConflictingDefinition(String),
    #[error("material not found: {0}")]
    MaterialNotFound(String),
    #[error("lamp data not found: {0}")]
    LampNotFound(String),
    #[error("no lights in scene: add a lamp or an emitting material")]
    NoLights,
    #[error("scene has no active camera")]
    NoCamera,
    #[error("another export is already in progress")]
    Busy,
    #[error("incompatible settings: {0}")]
    IncompatibleSettings(String),
    #[error(transparent)]
    Scene(#[from] SceneError),
    #[error(transparent)]
    Context(#[from] ContextError),
}

impl ExportError {
    /// Whether the error only affects the object being exported.
    pub fn is_per_object(&self) -> bool {
        matches!(
            self,
            Self::InvalidGeometry { .. }
                | Self::ConflictingDefinition(_)
                | Self::MaterialNotFound(_)
                | Self::LampNotFound(_)
                | Self::Scene(_)
        )
    }
}

/// A per-object failure recorded during the walk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectFailure {
    pub object: ObjectId,
    pub reason: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classification() {
        let geom = ExportError::InvalidGeometry {
            object: ObjectId::new("Cube"),
            reason: "no faces".into(),
        };
        assert!(geom.is_per_object());
        assert!(!ExportError::NoLights.is_per_object());
        assert!(!ExportError::NotFound("x".into()).is_per_object());
        let unsupported = ExportError::Context(ContextError::Unsupported {
            variant: "package",
            statement: "Shape",
        });
        assert!(!unsupported.is_per_object());
    }
}
