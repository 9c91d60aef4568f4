//! Tessellation and material split of host meshes.

use std::collections::BTreeMap;
use std::fmt;

use glam::Vec3;
use luxport_common::ParamSet;
use luxport_context::PlyMesh;
use luxport_scene::{Face, MeshData, ObjectData};
use sha2::{Digest, Sha256};

/// Triangle corners for a polygon of `n` vertices, fanned from corner 0.
pub fn fan_triangles(n: usize) -> impl Iterator<Item = [usize; 3]> {
    (1..n.saturating_sub(1)).map(|i| [0, i, i + 1])
}

/// SHA-256 of a partition's geometry arrays.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryDigest(pub [u8; 32]);

impl fmt::Display for GeometryDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for b in &self.0 {
            write!(f, "{b:02x}")?;
        }
        Ok(())
    }
}

impl fmt::Debug for GeometryDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GeometryDigest({self})")
    }
}

/// Flat per-corner arrays for the faces of one material slot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshPartition {
    pub slot: usize,
    pub points: Vec<f32>,
    pub normals: Vec<f32>,
    pub uvs: Vec<f32>,
    pub indices: Vec<i32>,
}

impl MeshPartition {
    fn new(slot: usize) -> Self {
        Self {
            slot,
            ..Self::default()
        }
    }

    pub fn vertex_count(&self) -> usize {
        self.points.len() / 3
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    pub fn is_empty(&self) -> bool {
        self.vertex_count() == 0 || self.triangle_count() == 0
    }

    pub fn as_ply(&self) -> PlyMesh<'_> {
        PlyMesh {
            points: &self.points,
            normals: &self.normals,
            uvs: &self.uvs,
            indices: &self.indices,
        }
    }

    /// Parameters of a native `trianglemesh` shape.
    pub fn native_params(&self) -> ParamSet {
        let params = ParamSet::new()
            .add_integers("indices", self.indices.clone())
            .add_points("P", self.points.clone())
            .add_normals("N", self.normals.clone());
        if self.uvs.is_empty() {
            params
        } else {
            params.add_floats("uv", self.uvs.clone())
        }
    }

    pub fn fingerprint(&self) -> GeometryDigest {
        let mut hasher = Sha256::new();
        for v in self.points.iter().chain(&self.normals).chain(&self.uvs) {
            hasher.update(v.to_le_bytes());
        }
        for i in &self.indices {
            hasher.update(i.to_le_bytes());
        }
        let result = hasher.finalize();
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&result[..]);
        GeometryDigest(bytes)
    }

    fn push_corner(&mut self, p: Vec3, n: Vec3, uv: Option<[f32; 2]>) -> i32 {
        let index = self.vertex_count() as i32;
        self.points.extend_from_slice(&p.to_array());
        self.normals.extend_from_slice(&n.to_array());
        if let Some(uv) = uv {
            self.uvs.extend_from_slice(&uv);
        }
        index
    }

    /// Append one polygon. Corners are shared only inside a smooth face, and
    /// only when both position index and UV match.
    fn push_face(&mut self, mesh: &MeshData, face: &Face, has_uv: bool) {
        let positions: Vec<Vec3> = face
            .vertices
            .iter()
            .map(|&v| mesh.vertices[v as usize])
            .collect();
        let flat = face_normal(&positions);
        let corner_uv = |c: usize| has_uv.then(|| face.uvs.get(c).copied().unwrap_or([0.0, 0.0]));

        let mut local = Vec::with_capacity(positions.len());
        if face.smooth {
            let mut seen: Vec<(u32, Option<[u32; 2]>, i32)> = Vec::new();
            for (c, &v) in face.vertices.iter().enumerate() {
                let uv = corner_uv(c);
                let key = uv.map(|[s, t]| [s.to_bits(), t.to_bits()]);
                if let Some(&(_, _, index)) = seen.iter().find(|(sv, sk, _)| *sv == v && *sk == key)
                {
                    local.push(index);
                    continue;
                }
                let normal = mesh.normals.get(v as usize).copied().unwrap_or(flat);
                let index = self.push_corner(positions[c], normal, uv);
                seen.push((v, key, index));
                local.push(index);
            }
        } else {
            for (c, p) in positions.iter().enumerate() {
                local.push(self.push_corner(*p, flat, corner_uv(c)));
            }
        }

        for [a, b, c] in fan_triangles(local.len()) {
            self.indices.extend_from_slice(&[local[a], local[b], local[c]]);
        }
    }
}

/// Newell normal of a polygon; zero for degenerate input.
fn face_normal(points: &[Vec3]) -> Vec3 {
    let mut n = Vec3::ZERO;
    for (i, p) in points.iter().enumerate() {
        let q = points[(i + 1) % points.len()];
        n.x += (p.y - q.y) * (p.z + q.z);
        n.y += (p.z - q.z) * (p.x + q.x);
        n.z += (p.x - q.x) * (p.y + q.y);
    }
    n.normalize_or_zero()
}

/// Partition a tessellated mesh by material slot.
///
/// Face material indices past the last slot are clamped to it. An object
/// with no slots gets a single implicit slot 0. Faces with fewer than three
/// vertices or out-of-range vertex indices are dropped. Partitions are
/// returned in ascending slot order.
pub fn split_by_material(mesh: &MeshData, slot_count: usize) -> Vec<MeshPartition> {
    let has_uv = mesh.faces.iter().any(|f| !f.uvs.is_empty());
    let last_slot = slot_count.saturating_sub(1);
    let mut parts: BTreeMap<usize, MeshPartition> = BTreeMap::new();

    for face in &mesh.faces {
        if face.vertices.len() < 3
            || face
                .vertices
                .iter()
                .any(|&v| v as usize >= mesh.vertices.len())
        {
            continue;
        }
        let slot = face.material_index.min(last_slot);
        parts
            .entry(slot)
            .or_insert_with(|| MeshPartition::new(slot))
            .push_face(mesh, face, has_uv);
    }

    parts.into_values().collect()
}

/// Escape the characters used as separators in identities and definition
/// names, so that distinct inputs never produce the same name.
fn escape_component(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for c in name.chars() {
        match c {
            '%' => out.push_str("%25"),
            '#' => out.push_str("%23"),
            '-' => out.push_str("%2D"),
            '@' => out.push_str("%40"),
            c => out.push(c),
        }
    }
    out
}

/// Identity of the geometry an object renders.
///
/// Objects with render-time modifiers get an object-scoped identity so their
/// tessellation is never shared with another user of the same base mesh.
pub fn mesh_identity(object: &ObjectData) -> String {
    let data = object.data.as_deref().unwrap_or(object.name.as_str());
    if object.has_render_modifiers() {
        format!("{}@{}", escape_component(object.name.as_str()), escape_component(data))
    } else {
        escape_component(data)
    }
}

/// Identity of the `index`-th portal definition built from `object`.
pub fn portal_identity(object: &ObjectData, index: usize) -> String {
    format!("{}#portal{index}", escape_component(object.name.as_str()))
}

/// Definition name for one material slot of a mesh.
///
/// `identity` comes from [`mesh_identity`] or [`portal_identity`] and holds
/// no bare `-`. A slot without a material is written as `%none`, which no
/// escaped material name can produce.
pub fn definition_name(identity: &str, material: Option<&str>, slot: usize) -> String {
    let material = material.map_or_else(|| "%none".to_string(), escape_component);
    format!("{identity}-{material}_m{slot:03}")
}

/// A named primitive definition built from one mesh partition.
#[derive(Debug, Clone, PartialEq)]
pub struct MeshDefinition {
    pub name: String,
    /// Mesh identity the definition was built from.
    pub mesh: String,
    pub slot: usize,
    pub material: Option<String>,
    /// Renderer shape type: `trianglemesh`, `plymesh` or `loopsubdiv`.
    pub shape: String,
    pub params: ParamSet,
    pub portal: bool,
    pub digest: GeometryDigest,
}

#[cfg(test)]
mod tests {
    use super::*;
    use luxport_common::ParamValue;

    #[test]
    fn quad_fans_into_two_triangles() {
        let tris: Vec<_> = fan_triangles(4).collect();
        assert_eq!(tris, vec![[0, 1, 2], [0, 2, 3]]);
        assert_eq!(fan_triangles(2).count(), 0);
        assert_eq!(fan_triangles(5).count(), 3);
    }

    #[test]
    fn flat_quad_gets_face_normal_per_corner() {
        let parts = split_by_material(&MeshData::quad("Plane"), 0);
        assert_eq!(parts.len(), 1);
        let part = &parts[0];
        assert_eq!(part.slot, 0);
        assert_eq!(part.vertex_count(), 4);
        assert_eq!(part.indices, vec![0, 1, 2, 0, 2, 3]);
        for n in part.normals.chunks(3) {
            assert_eq!(n, &[0.0, 0.0, 1.0]);
        }
        assert!(part.uvs.is_empty());
    }

    #[test]
    fn cube_splits_by_slot() {
        let cube = MeshData::cube("Cube");
        let parts = split_by_material(&cube, 2);
        assert_eq!(parts.len(), 2);
        assert_eq!(parts[0].triangle_count(), 6);
        assert_eq!(parts[1].triangle_count(), 6);
        // Flat faces never share corners.
        assert_eq!(parts[0].vertex_count(), 12);
    }

    #[test]
    fn out_of_range_slot_clamps_to_last() {
        let cube = MeshData::cube("Cube");
        let parts = split_by_material(&cube, 1);
        assert_eq!(parts.len(), 1);
        assert_eq!(parts[0].triangle_count(), 12);
    }

    #[test]
    fn smooth_face_uses_vertex_normals_and_uvs() {
        let mut mesh = MeshData::quad("Plane");
        mesh.normals = vec![Vec3::X; 4];
        mesh.faces = vec![Face {
            uvs: vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
            ..Face::new(&[0, 1, 2, 3]).smooth()
        }];
        let part = &split_by_material(&mesh, 0)[0];
        assert_eq!(part.normals[..3], [1.0, 0.0, 0.0]);
        assert_eq!(part.uvs.len(), 8);
        assert!(matches!(part.native_params().get("uv"), Some(ParamValue::Float(v)) if v.len() == 8));
    }

    #[test]
    fn smooth_face_reuses_repeated_corner() {
        let mut mesh = MeshData::quad("Plane");
        mesh.faces = vec![Face::new(&[0, 1, 2, 0]).smooth()];
        let part = &split_by_material(&mesh, 0)[0];
        assert_eq!(part.vertex_count(), 3);
        assert_eq!(part.indices, vec![0, 1, 2, 0, 2, 0]);
    }

    #[test]
    fn degenerate_faces_are_dropped() {
        let mut mesh = MeshData::quad("Plane");
        mesh.faces = vec![Face::new(&[0, 1]), Face::new(&[0, 1, 9])];
        assert!(split_by_material(&mesh, 0).is_empty());
    }

    #[test]
    fn naming_is_stable() {
        let a = definition_name("Cube", Some("Red"), 0);
        assert_eq!(a, definition_name("Cube", Some("Red"), 0));
        assert_eq!(a, "Cube-Red_m000");
        assert_ne!(a, definition_name("Cube", Some("Blue"), 0));
        assert_eq!(definition_name("Cube", None, 2), "Cube-%none_m002");
        assert_ne!(
            definition_name("Cube", None, 0),
            definition_name("Cube", Some("default"), 0)
        );
    }

    #[test]
    fn separators_in_names_do_not_collide() {
        let cube = ObjectData::mesh("A", "Cube");
        let cube_red = ObjectData::mesh("B", "Cube-Red");
        let a = definition_name(&mesh_identity(&cube), Some("Red-Glass"), 0);
        let b = definition_name(&mesh_identity(&cube_red), Some("Glass"), 0);
        assert_ne!(a, b);
        assert_eq!(a, "Cube-Red%2DGlass_m000");

        let modified = ObjectData::mesh("X", "portal0").with_modifier("Bevel", "bevel");
        let named_like_modified = ObjectData::mesh("Y", "X@portal0");
        let portal = ObjectData::mesh("X", "Window");
        let ids = [
            mesh_identity(&modified),
            mesh_identity(&named_like_modified),
            portal_identity(&portal, 0),
        ];
        assert_ne!(ids[0], ids[1]);
        assert_ne!(ids[0], ids[2]);
        assert_ne!(ids[1], ids[2]);
    }

    #[test]
    fn modified_objects_get_own_identity() {
        let plain = ObjectData::mesh("A", "Cube");
        assert_eq!(mesh_identity(&plain), "Cube");
        let modified = ObjectData::mesh("B", "Cube").with_modifier("Bevel", "bevel");
        assert_eq!(mesh_identity(&modified), "B@Cube");
    }

    #[test]
    fn fingerprint_tracks_geometry() {
        let a = split_by_material(&MeshData::quad("A"), 0).remove(0);
        let b = split_by_material(&MeshData::quad("B"), 0).remove(0);
        assert_eq!(a.fingerprint(), b.fingerprint());
        let mut c = b.clone();
        c.points[0] = 5.0;
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().to_string().len(), 64);
    }
}
