//! Binary little-endian PLY encoding for triangle meshes.

use std::io::Write;

/// Borrowed triangle mesh arrays in renderer layout.
#[derive(Debug, Clone, Copy)]
pub struct PlyMesh<'a> {
    /// Flat xyz triples.
    pub points: &'a [f32],
    /// Flat xyz triples, one per point.
    pub normals: &'a [f32],
    /// Flat st pairs, one per point; empty when the mesh has no UV layer.
    pub uvs: &'a [f32],
    /// Triangle corner indices, three per face.
    pub indices: &'a [i32],
}

impl PlyMesh<'_> {
    pub fn vertex_count(&self) -> usize {
        self.points.len() / 3
    }

    pub fn face_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Encode a mesh as a `binary_little_endian` PLY document.
pub fn write_ply<W: Write>(out: &mut W, mesh: &PlyMesh<'_>) -> std::io::Result<()> {
    let has_uv = !mesh.uvs.is_empty();
    writeln!(out, "ply")?;
    writeln!(out, "format binary_little_endian 1.0")?;
    writeln!(out, "comment Created by luxport")?;
    writeln!(out, "element vertex {}", mesh.vertex_count())?;
    for p in ["x", "y", "z", "nx", "ny", "nz"] {
        writeln!(out, "property float {p}")?;
    }
    if has_uv {
        writeln!(out, "property float s")?;
        writeln!(out, "property float t")?;
    }
    writeln!(out, "element face {}", mesh.face_count())?;
    writeln!(out, "property list uchar uint vertex_indices")?;
    writeln!(out, "end_header")?;

    for v in 0..mesh.vertex_count() {
        for c in &mesh.points[v * 3..v * 3 + 3] {
            out.write_all(&c.to_le_bytes())?;
        }
        for c in &mesh.normals[v * 3..v * 3 + 3] {
            out.write_all(&c.to_le_bytes())?;
        }
        if has_uv {
            for c in &mesh.uvs[v * 2..v * 2 + 2] {
                out.write_all(&c.to_le_bytes())?;
            }
        }
    }
    for tri in mesh.indices.chunks_exact(3) {
        out.write_all(&[3u8])?;
        for &i in tri {
            out.write_all(&(i as u32).to_le_bytes())?;
        }
    }
    Ok(())
}
