//! Math utilities and types
//!
//! Provides the vector, quaternion and transform types shared by the
//! collision and dynamics code. All simulation math is single precision.

pub use nalgebra::{
    Isometry3, Matrix3, Quaternion, Translation3, Unit, UnitQuaternion, Vector3, Vector4,
};
use serde::{Deserialize, Serialize};

/// 3D vector type
pub type Vec3 = Vector3<f32>;

/// 4D vector type, used for debug colors
pub type Vec4 = Vector4<f32>;

/// 3x3 matrix type, used for inertia tensors
pub type Mat3 = Matrix3<f32>;

/// 3D point type
pub type Point3 = nalgebra::Point3<f32>;

/// Quaternion type for rotations
pub type Quat = UnitQuaternion<f32>;

/// Rigid pose without scale
pub type Iso = Isometry3<f32>;

/// Transform representing position, rotation, and scale
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Position in 3D space
    pub position: Vec3,

    /// Rotation quaternion
    pub rotation: Quat,

    /// Scale factors
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::zeros(),
            rotation: Quat::identity(),
            scale: Vec3::new(1.0, 1.0, 1.0),
        }
    }
}

impl Transform {
    /// Create a new identity transform
    pub fn identity() -> Self {
        Self::default()
    }

    /// Create a transform with only position
    pub fn from_position(position: Vec3) -> Self {
        Self {
            position,
            ..Default::default()
        }
    }

    /// Create a transform with position and rotation
    pub fn from_position_rotation(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            ..Default::default()
        }
    }

    /// Builder-style scale override
    #[must_use]
    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    /// The rigid part of this transform
    pub fn isometry(&self) -> Iso {
        Iso::from_parts(Translation3::from(self.position), self.rotation)
    }

    /// Rebuild a transform from a rigid pose, keeping this transform's scale
    pub fn with_isometry(&self, iso: &Iso) -> Self {
        Self {
            position: iso.translation.vector,
            rotation: iso.rotation,
            scale: self.scale,
        }
    }

    /// Apply this transform to a point
    pub fn transform_point(&self, point: &Vec3) -> Vec3 {
        self.position + self.rotation * self.scale.component_mul(point)
    }

    /// Apply this transform to a direction (no translation)
    pub fn transform_vector(&self, vector: &Vec3) -> Vec3 {
        self.rotation * self.scale.component_mul(vector)
    }

    /// Combine this transform with another (`self` is the parent)
    pub fn combine(&self, other: &Self) -> Self {
        Self {
            position: self.position + self.rotation * (self.scale.component_mul(&other.position)),
            rotation: self.rotation * other.rotation,
            scale: self.scale.component_mul(&other.scale),
        }
    }

    /// Get the inverse transform
    pub fn inverse(&self) -> Self {
        let inv_scale = self.scale.map(utils::safe_recip);
        let inv_rotation = self.rotation.inverse();
        let inv_position = inv_scale.component_mul(&(inv_rotation * -self.position));

        Self {
            position: inv_position,
            rotation: inv_rotation,
            scale: inv_scale,
        }
    }
}

/// Math constants
pub mod constants {
    /// Pi constant
    pub const PI: f32 = std::f32::consts::PI;

    /// Lengths below this are treated as zero
    pub const EPSILON: f32 = 1.0e-6;
}

/// Math utility functions
pub mod utils {
    use super::{constants, Vec3};

    /// Reciprocal that maps zero to zero
    pub fn safe_recip(value: f32) -> f32 {
        if value.abs() > constants::EPSILON {
            1.0 / value
        } else {
            0.0
        }
    }

    /// Wrap an angle into `[-PI, PI]`
    pub fn wrap_angle(angle: f32) -> f32 {
        let tau = 2.0 * constants::PI;
        let wrapped = (angle + constants::PI).rem_euclid(tau) - constants::PI;
        if wrapped < -constants::PI {
            wrapped + tau
        } else {
            wrapped
        }
    }

    /// Two unit vectors completing `normal` into an orthonormal basis
    pub fn orthonormal_basis(normal: &Vec3) -> (Vec3, Vec3) {
        let helper = if normal.x.abs() < 0.57 {
            Vec3::x()
        } else if normal.y.abs() < 0.57 {
            Vec3::y()
        } else {
            Vec3::z()
        };
        let t1 = normal.cross(&helper).normalize();
        let t2 = normal.cross(&t1);
        (t1, t2)
    }
}
