use std::ops::Mul;

use glam::{DMat2, DMat3, DQuat, DVec3};

use crate::error::RotationError;

/// Tolerance used by the checked constructors.
pub const ROTATION_TOLERANCE: f64 = 1e-6;

/// A 3D rotation stored as a unit quaternion.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SO3 {
    q: DQuat,
}

impl SO3 {
    /// The identity rotation.
    pub const IDENTITY: Self = Self { q: DQuat::IDENTITY };

    /// Create a rotation from a quaternion, normalizing it.
    pub fn from_quaternion(quat: DQuat) -> Self {
        Self {
            q: quat.normalize(),
        }
    }

    /// Create a rotation from a quaternion in `[w, x, y, z]` order, normalizing it.
    pub fn from_wxyz(wxyz: [f64; 4]) -> Self {
        Self::from_quaternion(DQuat::from_xyzw(wxyz[1], wxyz[2], wxyz[3], wxyz[0]))
    }

    /// Create a rotation from a quaternion in `[w, x, y, z]` order.
    ///
    /// Fails when the quaternion is not unit length within [`ROTATION_TOLERANCE`].
    pub fn from_wxyz_checked(wxyz: [f64; 4]) -> Result<Self, RotationError> {
        if wxyz.iter().any(|v| !v.is_finite()) {
            return Err(RotationError::NonFinite);
        }
        let quat = DQuat::from_xyzw(wxyz[1], wxyz[2], wxyz[3], wxyz[0]);
        let norm = quat.length();
        if (norm - 1.0).abs() > ROTATION_TOLERANCE {
            return Err(RotationError::NotUnitQuaternion(norm));
        }
        Ok(Self::from_quaternion(quat))
    }

    /// Create a rotation from a 3x3 matrix.
    ///
    /// Fails when the matrix is not orthonormal or is a reflection.
    pub fn from_matrix_checked(mat: &DMat3) -> Result<Self, RotationError> {
        if !mat.is_finite() {
            return Err(RotationError::NonFinite);
        }
        let deviation = (mat.transpose() * *mat - DMat3::IDENTITY)
            .to_cols_array()
            .iter()
            .fold(0.0f64, |acc, v| acc.max(v.abs()));
        if deviation > ROTATION_TOLERANCE {
            return Err(RotationError::NotOrthonormal(deviation));
        }
        let det = mat.determinant();
        if det < 0.0 {
            return Err(RotationError::Reflection(det));
        }
        Ok(Self::from_quaternion(DQuat::from_mat3(mat)))
    }

    /// Lie algebra -> Lie group
    pub fn exp(v: DVec3) -> Self {
        Self::from_quaternion(DQuat::from_scaled_axis(v))
    }

    /// Rotation about the z axis by `angle` radians.
    pub fn from_yaw(angle: f64) -> Self {
        Self::from_quaternion(DQuat::from_rotation_z(angle))
    }

    /// The underlying unit quaternion.
    #[inline]
    pub fn quaternion(&self) -> DQuat {
        self.q
    }

    /// The quaternion in `[w, x, y, z]` order.
    pub fn to_wxyz(&self) -> [f64; 4] {
        [self.q.w, self.q.x, self.q.y, self.q.z]
    }

    /// The rotation as a 3x3 matrix.
    pub fn matrix(&self) -> DMat3 {
        DMat3::from_quat(self.q)
    }

    /// The upper-left 2x2 block of the rotation matrix.
    ///
    /// This is the part of the rotation acting on the x/y plane. It is only itself a rotation
    /// when the 3D rotation is about the z axis.
    pub fn planar_block(&self) -> DMat2 {
        let m = self.matrix();
        DMat2::from_cols(m.x_axis.truncate(), m.y_axis.truncate())
    }

    /// The inverse rotation.
    pub fn inverse(&self) -> Self {
        Self {
            q: self.q.conjugate(),
        }
    }

    /// Rotate a vector.
    #[inline]
    pub fn transform(&self, v: DVec3) -> DVec3 {
        self.q * v
    }

    /// Compare two rotations through their matrices, which is insensitive to the sign of the
    /// quaternion.
    pub fn abs_diff_eq(&self, other: &Self, max_abs_diff: f64) -> bool {
        self.matrix().abs_diff_eq(other.matrix(), max_abs_diff)
    }
}

impl Default for SO3 {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Mul for SO3 {
    type Output = SO3;

    fn mul(self, rhs: Self) -> Self::Output {
        Self::from_quaternion(self.q * rhs.q)
    }
}

impl Mul<DVec3> for SO3 {
    type Output = DVec3;

    fn mul(self, rhs: DVec3) -> Self::Output {
        self.transform(rhs)
    }
}
