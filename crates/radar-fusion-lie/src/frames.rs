use std::fmt;
use std::marker::PhantomData;
use std::ops::Mul;

use glam::DVec3;

use crate::se3::SE3;
use crate::so3::SO3;

/// A named coordinate frame of the vehicle rig.
pub trait Frame: Copy + Send + Sync + 'static {
    /// Human readable frame name.
    const NAME: &'static str;
}

macro_rules! frame_marker {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name;

        impl Frame for $name {
            const NAME: &'static str = $label;
        }
    };
}

frame_marker!(
    /// The native frame of a single sensor.
    SensorFrame,
    "sensor"
);
frame_marker!(
    /// The vehicle body frame at the capture instant of a sensor.
    VehicleFrame,
    "vehicle"
);
frame_marker!(
    /// The global world frame.
    WorldFrame,
    "world"
);
frame_marker!(
    /// The vehicle body frame at the chosen reference instant.
    ReferenceFrame,
    "reference"
);
frame_marker!(
    /// The optical frame of a camera: z forward, x right, y down.
    CameraFrame,
    "camera"
);

/// A rigid transform mapping coordinates expressed in `From` into coordinates expressed in `To`.
///
/// Composition only type-checks when the frames line up:
/// `Isometry3<B, C> * Isometry3<A, B> = Isometry3<A, C>`.
pub struct Isometry3<From, To> {
    inner: SE3,
    frames: PhantomData<fn(From) -> To>,
}

// manual impls so that the markers need no extra bounds
impl<From, To> Clone for Isometry3<From, To> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<From, To> Copy for Isometry3<From, To> {}

impl<From, To> PartialEq for Isometry3<From, To> {
    fn eq(&self, other: &Self) -> bool {
        self.inner == other.inner
    }
}

impl<From: Frame, To: Frame> fmt::Debug for Isometry3<From, To> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Isometry3")
            .field("from", &From::NAME)
            .field("to", &To::NAME)
            .field("rotation", &self.inner.r)
            .field("translation", &self.inner.t)
            .finish()
    }
}

impl<From, To> Isometry3<From, To> {
    /// Declare that `transform` maps `From` coordinates into `To` coordinates.
    ///
    /// The frames are not checked; the caller asserts what the transform means.
    pub fn from_se3(transform: SE3) -> Self {
        Self {
            inner: transform,
            frames: PhantomData,
        }
    }

    /// Create the transform from a rotation and a translation.
    pub fn new(rotation: SO3, translation: DVec3) -> Self {
        Self::from_se3(SE3::new(rotation, translation))
    }

    /// The untyped transform.
    #[inline]
    pub fn as_se3(&self) -> &SE3 {
        &self.inner
    }

    /// The rotation part.
    #[inline]
    pub fn rotation(&self) -> SO3 {
        self.inner.r
    }

    /// The translation part.
    #[inline]
    pub fn translation(&self) -> DVec3 {
        self.inner.t
    }

    /// The transform mapping `To` back into `From`.
    pub fn inverse(&self) -> Isometry3<To, From> {
        Isometry3::from_se3(self.inner.inverse())
    }

    /// Apply `self` and then `next`.
    pub fn then<Next>(&self, next: &Isometry3<To, Next>) -> Isometry3<From, Next> {
        Isometry3::from_se3(next.inner.compose(&self.inner))
    }

    /// Map a position from `From` into `To`.
    #[inline]
    pub fn transform_point(&self, p: DVec3) -> DVec3 {
        self.inner.transform_point(p)
    }

    /// Rotate a direction-like quantity from `From` into `To`, ignoring the translation.
    #[inline]
    pub fn transform_vector(&self, v: DVec3) -> DVec3 {
        self.inner.transform_vector(v)
    }
}

impl<F> Isometry3<F, F> {
    /// The identity transform within a single frame.
    pub fn identity() -> Self {
        Self::from_se3(SE3::IDENTITY)
    }
}

impl<A, B, C> Mul<Isometry3<A, B>> for Isometry3<B, C> {
    type Output = Isometry3<A, C>;

    fn mul(self, rhs: Isometry3<A, B>) -> Self::Output {
        Isometry3::from_se3(self.inner.compose(&rhs.inner))
    }
}
