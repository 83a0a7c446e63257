/// An error type for building rotations from raw values.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
#[non_exhaustive]
pub enum RotationError {
    /// The quaternion is too far from unit length.
    #[error("Quaternion is not unit length (norm: {0})")]
    NotUnitQuaternion(f64),

    /// The matrix columns are not orthonormal.
    #[error("Rotation matrix is not orthonormal (max deviation: {0})")]
    NotOrthonormal(f64),

    /// The matrix is orthonormal but has a negative determinant.
    #[error("Rotation matrix is a reflection (determinant: {0})")]
    Reflection(f64),

    /// The input contains NaN or infinite values.
    #[error("Rotation contains non-finite values")]
    NonFinite,
}
