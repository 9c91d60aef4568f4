use luxport_common::ObjectId;
use serde::Serialize;

use crate::cache::InstancingCache;
use crate::error::{ExportError, ObjectFailure};
use crate::lights::LightGroupRegistry;
use crate::materials::MaterialRegistry;

/// Counters collected over one export.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ExportStats {
    /// Objects or dupli copies placed in the scene.
    pub placements: usize,
    /// Instance statements referencing a primitive definition.
    pub instances: usize,
    /// Shape statements written in full at a placement.
    pub full_shapes: usize,
    /// Primitive-definition blocks written.
    pub definitions: usize,
    pub cache_hits: usize,
    /// Shapes carrying an area light from an emitting material.
    pub emitters: usize,
    pub lights: usize,
    pub portals: usize,
    pub volumes: usize,
    pub textures: usize,
}

/// Mutable state threaded through one export run.
#[derive(Debug, Default)]
pub struct ExportState {
    pub cache: InstancingCache,
    pub materials: MaterialRegistry,
    pub light_groups: LightGroupRegistry,
    pub stats: ExportStats,
    pub failures: Vec<ObjectFailure>,
    motion_systems: usize,
}

impl ExportState {
    pub fn new(global_instancing: bool) -> Self {
        let mut state = Self::default();
        state.cache.set_global_instancing(global_instancing);
        state
    }

    pub fn reset(&mut self, global_instancing: bool) {
        *self = Self::new(global_instancing);
    }

    /// Fresh coordinate-system name for the shutter-close transform of a placement.
    pub fn next_motion_system(&mut self, object: &ObjectId) -> String {
        self.motion_systems += 1;
        format!("{object}_motion_{:04}", self.motion_systems)
    }

    /// Swallow per-object errors after recording them; pass everything else through.
    pub fn guard(&mut self, object: &ObjectId, result: Result<(), ExportError>) -> Result<(), ExportError> {
        match result {
            Err(e) if e.is_per_object() => {
                tracing::warn!(object = %object, error = %e, "object skipped");
                self.failures.push(ObjectFailure {
                    object: object.clone(),
                    reason: e.to_string(),
                });
                Ok(())
            }
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guard_records_per_object_errors_only() {
        let mut state = ExportState::new(true);
        let id = ObjectId::new("Cube");
        let err = ExportError::InvalidGeometry {
            object: id.clone(),
            reason: "empty".into(),
        };
        assert!(state.guard(&id, Err(err)).is_ok());
        assert_eq!(state.failures.len(), 1);
        assert!(state.guard(&id, Err(ExportError::NoLights)).is_err());
        assert_eq!(state.failures.len(), 1);
    }

    #[test]
    fn motion_systems_are_unique() {
        let mut state = ExportState::new(true);
        let id = ObjectId::new("Ball");
        let a = state.next_motion_system(&id);
        let b = state.next_motion_system(&id);
        assert_ne!(a, b);
        assert!(a.starts_with("Ball_motion_"));
    }

    #[test]
    fn reset_applies_global_instancing() {
        let mut state = ExportState::new(true);
        state.stats.placements = 3;
        state.reset(false);
        assert_eq!(state.stats, ExportStats::default());
        assert!(!state.cache.instancing_allowed());
    }
}
