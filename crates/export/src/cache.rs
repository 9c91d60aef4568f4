use std::collections::{BTreeMap, BTreeSet};

use crate::error::ExportError;
use crate::mesh::MeshDefinition;

/// Per-export registry of built mesh definitions.
///
/// Owned by the export session and reset at the start of every run.
#[derive(Debug)]
pub struct InstancingCache {
    definitions: BTreeMap<String, MeshDefinition>,
    /// Names already emitted as primitive-definition blocks.
    emitted: BTreeSet<String>,
    global_allowed: bool,
    instancing_allowed: bool,
}

impl Default for InstancingCache {
    fn default() -> Self {
        Self {
            definitions: BTreeMap::new(),
            emitted: BTreeSet::new(),
            global_allowed: true,
            instancing_allowed: true,
        }
    }
}

impl InstancingCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Enable or disable instancing for the whole run.
    pub fn set_global_instancing(&mut self, allowed: bool) {
        self.global_allowed = allowed;
        self.instancing_allowed = allowed;
    }

    pub fn global_instancing(&self) -> bool {
        self.global_allowed
    }

    /// Recompute eligibility before processing an object.
    pub fn begin_object(&mut self, object_allows: bool) {
        self.instancing_allowed = self.global_allowed && object_allows;
    }

    pub fn instancing_allowed(&self) -> bool {
        self.instancing_allowed
    }

    pub fn have(&self, name: &str) -> bool {
        self.definitions.contains_key(name)
    }

    /// Register a definition. Re-adding an identical definition is a no-op;
    /// different geometry under a known name is refused and the first kept.
    pub fn add(&mut self, definition: MeshDefinition) -> Result<(), ExportError> {
        match self.definitions.get(&definition.name) {
            Some(existing) if existing.digest != definition.digest => {
                Err(ExportError::ConflictingDefinition(definition.name))
            }
            Some(_) => Ok(()),
            None => {
                self.definitions.insert(definition.name.clone(), definition);
                Ok(())
            }
        }
    }

    pub fn get(&self, name: &str) -> Result<&MeshDefinition, ExportError> {
        self.definitions
            .get(name)
            .ok_or_else(|| ExportError::NotFound(name.to_string()))
    }

    pub fn is_emitted(&self, name: &str) -> bool {
        self.emitted.contains(name)
    }

    /// Record that a definition block was written. Returns `false` if it already was.
    pub fn mark_emitted(&mut self, name: &str) -> bool {
        self.emitted.insert(name.to_string())
    }

    /// Emitted definitions whose source mesh is flagged as a light portal.
    pub fn portal_definitions(&self) -> impl Iterator<Item = &MeshDefinition> {
        self.definitions
            .values()
            .filter(|d| d.portal && self.emitted.contains(&d.name))
    }

    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::split_by_material;
    use luxport_scene::MeshData;

    fn definition(name: &str, mesh: &MeshData) -> MeshDefinition {
        let part = split_by_material(mesh, 0).remove(0);
        MeshDefinition {
            name: name.to_string(),
            mesh: mesh.name.clone(),
            slot: 0,
            material: None,
            shape: "trianglemesh".into(),
            params: part.native_params(),
            portal: mesh.portal,
            digest: part.fingerprint(),
        }
    }

    #[test]
    fn add_get_and_missing() {
        let mut cache = InstancingCache::new();
        assert!(!cache.have("a"));
        cache.add(definition("a", &MeshData::quad("Plane"))).unwrap();
        assert!(cache.have("a"));
        assert_eq!(cache.get("a").unwrap().mesh, "Plane");
        assert!(matches!(cache.get("b"), Err(ExportError::NotFound(n)) if n == "b"));
    }

    #[test]
    fn conflicting_geometry_keeps_first() {
        let mut cache = InstancingCache::new();
        let quad = definition("a", &MeshData::quad("Plane"));
        let first_digest = quad.digest;
        cache.add(quad.clone()).unwrap();
        cache.add(quad).unwrap();

        let cube = definition("a", &MeshData::cube("Cube"));
        assert!(matches!(
            cache.add(cube),
            Err(ExportError::ConflictingDefinition(_))
        ));
        assert_eq!(cache.get("a").unwrap().digest, first_digest);
    }

    #[test]
    fn emitted_at_most_once() {
        let mut cache = InstancingCache::new();
        assert!(cache.mark_emitted("a"));
        assert!(!cache.mark_emitted("a"));
        assert!(cache.is_emitted("a"));
    }

    #[test]
    fn eligibility_combines_global_and_object() {
        let mut cache = InstancingCache::new();
        assert!(cache.instancing_allowed());
        cache.begin_object(false);
        assert!(!cache.instancing_allowed());
        cache.begin_object(true);
        assert!(cache.instancing_allowed());

        cache.set_global_instancing(false);
        cache.begin_object(true);
        assert!(!cache.instancing_allowed());

        cache.reset();
        assert!(cache.instancing_allowed());
        assert!(cache.is_empty());
    }

    #[test]
    fn portal_scan_requires_emission() {
        let mut cache = InstancingCache::new();
        let mut mesh = MeshData::quad("Window");
        mesh.portal = true;
        cache.add(definition("w", &mesh)).unwrap();
        cache.add(definition("q", &MeshData::quad("Plane"))).unwrap();
        assert_eq!(cache.portal_definitions().count(), 0);
        cache.mark_emitted("w");
        cache.mark_emitted("q");
        let names: Vec<_> = cache.portal_definitions().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["w"]);
    }
}
