use std::ops::Mul;

use glam::{DMat4, DVec3};

use crate::so3::SO3;

/// A rigid body transformation made of a rotation followed by a translation.
///
/// Applied to a point `p` it yields `r * p + t`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SE3 {
    /// The rotation part.
    pub r: SO3,
    /// The translation part.
    pub t: DVec3,
}

impl SE3 {
    /// The identity transformation.
    pub const IDENTITY: Self = Self {
        r: SO3::IDENTITY,
        t: DVec3::ZERO,
    };

    /// Create a new transformation from a rotation and a translation.
    pub fn new(r: SO3, t: DVec3) -> Self {
        Self { r, t }
    }

    /// Create a pure translation.
    pub fn from_translation(t: DVec3) -> Self {
        Self { r: SO3::IDENTITY, t }
    }

    /// The inverse transformation: `r' = r^-1`, `t' = -(r^-1 * t)`.
    pub fn inverse(&self) -> Self {
        let r_inv = self.r.inverse();
        Self {
            r: r_inv,
            t: -(r_inv * self.t),
        }
    }

    /// Compose two transformations, applying `other` first and `self` second.
    pub fn compose(&self, other: &SE3) -> Self {
        Self {
            r: self.r * other.r,
            t: self.t + self.r * other.t,
        }
    }

    /// Apply the full transformation to a point.
    #[inline]
    pub fn transform_point(&self, p: DVec3) -> DVec3 {
        self.r * p + self.t
    }

    /// Apply only the rotation to a direction-like quantity such as a velocity.
    #[inline]
    pub fn transform_vector(&self, v: DVec3) -> DVec3 {
        self.r * v
    }

    /// The transformation as a homogeneous 4x4 matrix.
    pub fn matrix(&self) -> DMat4 {
        DMat4::from_rotation_translation(self.r.quaternion(), self.t)
    }

    /// Approximate equality on rotation matrix and translation.
    pub fn abs_diff_eq(&self, other: &Self, max_abs_diff: f64) -> bool {
        self.r.abs_diff_eq(&other.r, max_abs_diff) && self.t.abs_diff_eq(other.t, max_abs_diff)
    }
}

impl Default for SE3 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for SE3 {
    type Output = SE3;

    fn mul(self, rhs: Self) -> Self::Output {
        self.compose(&rhs)
    }
}

impl Mul<DVec3> for SE3 {
    type Output = DVec3;

    fn mul(self, rhs: DVec3) -> Self::Output {
        self.transform_point(rhs)
    }
}
