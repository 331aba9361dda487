//! Math utilities and types
//!
//! Provides the fundamental 3D types used by the physics kernel. Everything is
//! single precision; the aliases keep call sites short.

pub use nalgebra::{Matrix3, Quaternion, Unit, UnitQuaternion, Vector3};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 3x3 matrix type (inertia tensors, effective-mass matrices)
pub type Mat3 = Matrix3<f32>;

/// Quaternion type for rotations
pub type Quat = UnitQuaternion<f32>;

/// Rigid transform: position and rotation, no scale
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    /// Position in world space
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform with position and rotation
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self { position, rotation }
    }

    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Apply this transform to a point
    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.position + self.rotation * point
    }

    /// Apply this transform to a direction (rotation only)
    pub fn transform_vector(&self, vector: Vec3) -> Vec3 {
        self.rotation * vector
    }

    /// Map a world-space point into this transform's local space
    pub fn inverse_transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation.inverse_transform_vector(&(point - self.position))
    }

    /// Map a world-space direction into this transform's local space
    pub fn inverse_transform_vector(&self, vector: Vec3) -> Vec3 {
        self.rotation.inverse_transform_vector(&vector)
    }

    /// Combine this transform with a child transform expressed in its local space
    pub fn combine(&self, other: &Transform) -> Transform {
        Transform {
            position: self.transform_point(other.position),
            rotation: self.rotation * other.rotation,
        }
    }
}

/// Math constants
pub mod constants {
    /// Small length used to guard normalisation and degenerate axes
    pub const EPSILON: f32 = 1.0e-6;

    /// Threshold below which a ray is treated as parallel to a plane or slab
    pub const PARALLEL_EPSILON: f32 = 1.0e-4;
}

/// Math utility functions
pub mod utils {
    use super::{Mat3, Vec3};

    /// Cross-product matrix: `skew(a) * b == a.cross(&b)`
    pub fn skew(v: &Vec3) -> Mat3 {
        Mat3::new(
            0.0, -v.z, v.y,
            v.z, 0.0, -v.x,
            -v.y, v.x, 0.0,
        )
    }

    /// Two unit vectors orthogonal to `n` and to each other
    ///
    /// `n` must be normalized.
    pub fn orthonormal_basis(n: &Vec3) -> (Vec3, Vec3) {
        let helper = if n.x.abs() < 0.57 { Vec3::x() } else { Vec3::y() };
        let t1 = n.cross(&helper).normalize();
        let t2 = n.cross(&t1);
        (t1, t2)
    }

    /// True when every component is finite
    pub fn is_finite(v: &Vec3) -> bool {
        v.iter().all(|c| c.is_finite())
    }

    /// Componentwise absolute value of a matrix
    pub fn abs_matrix(m: &Mat3) -> Mat3 {
        m.map(f32::abs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    const EPSILON: f32 = 1e-5;

    #[test]
    fn test_transform_round_trips_points() {
        let transform = Transform::new(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_axis_angle(&Vec3::y_axis(), 0.7),
        );
        let point = Vec3::new(-4.0, 0.5, 2.0);

        let world = transform.transform_point(point);
        assert_relative_eq!(transform.inverse_transform_point(world), point, epsilon = EPSILON);
    }

    #[test]
    fn test_skew_matches_cross() {
        let a = Vec3::new(1.0, -2.0, 0.5);
        let b = Vec3::new(0.3, 4.0, -1.0);

        assert_relative_eq!(utils::skew(&a) * b, a.cross(&b), epsilon = EPSILON);
    }

    #[test]
    fn test_orthonormal_basis() {
        for n in [Vec3::x(), Vec3::y(), Vec3::new(1.0, 1.0, 1.0).normalize()] {
            let (t1, t2) = utils::orthonormal_basis(&n);
            assert_relative_eq!(t1.dot(&n), 0.0, epsilon = EPSILON);
            assert_relative_eq!(t2.dot(&n), 0.0, epsilon = EPSILON);
            assert_relative_eq!(t1.dot(&t2), 0.0, epsilon = EPSILON);
            assert_relative_eq!(t2.norm(), 1.0, epsilon = EPSILON);
        }
    }
}
