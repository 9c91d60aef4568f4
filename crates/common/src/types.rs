use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Identifier of an object in the host scene.
///
/// Host applications address objects by unique name, so the id is the name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId(pub String);

impl ObjectId {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ObjectId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ObjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

/// Tolerance used when comparing two sampled transforms.
pub const MATRIX_EPSILON: f32 = 1e-6;

/// Flatten a world matrix into the column-major order renderer statements expect.
pub fn matrix_to_array(m: &Mat4) -> [f32; 16] {
    m.to_cols_array()
}

/// Whether two transforms differ by more than [`MATRIX_EPSILON`] in any element.
pub fn matrices_differ(a: &Mat4, b: &Mat4) -> bool {
    !a.abs_diff_eq(*b, MATRIX_EPSILON)
}

/// Camera-style look-at triple derived from a world matrix.
///
/// The object looks down its local -Z axis with +Y up.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LookAt {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
}

impl LookAt {
    pub fn from_matrix(m: &Mat4) -> Self {
        let eye = m.transform_point3(Vec3::ZERO);
        let forward = m.transform_vector3(Vec3::NEG_Z).normalize_or_zero();
        let up = m.transform_vector3(Vec3::Y).normalize_or_zero();
        Self {
            eye,
            target: eye + forward,
            up,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_id_display() {
        let id = ObjectId::new("Cube.001");
        assert_eq!(id.to_string(), "Cube.001");
        assert_eq!(id.as_str(), "Cube.001");
    }

    #[test]
    fn identical_matrices_do_not_differ() {
        let m = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.0));
        assert!(!matrices_differ(&m, &m));
        let n = Mat4::from_translation(Vec3::new(1.0, 2.0, 3.5));
        assert!(matrices_differ(&m, &n));
    }

    #[test]
    fn matrix_array_is_column_major() {
        let m = Mat4::from_translation(Vec3::new(4.0, 5.0, 6.0));
        let a = matrix_to_array(&m);
        assert_eq!(&a[12..15], &[4.0, 5.0, 6.0]);
    }

    #[test]
    fn look_at_identity() {
        let la = LookAt::from_matrix(&Mat4::IDENTITY);
        assert_eq!(la.eye, Vec3::ZERO);
        assert_eq!(la.target, Vec3::NEG_Z);
        assert_eq!(la.up, Vec3::Y);
    }

    #[test]
    fn look_at_translated() {
        let m = Mat4::from_translation(Vec3::new(0.0, 0.0, 10.0));
        let la = LookAt::from_matrix(&m);
        assert_eq!(la.eye, Vec3::new(0.0, 0.0, 10.0));
        assert_eq!(la.target, Vec3::new(0.0, 0.0, 9.0));
    }
}
