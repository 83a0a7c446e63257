use glam::{DMat3, DVec3};
use radar_fusion_lie::{
    frames::{Isometry3, ReferenceFrame, SensorFrame, VehicleFrame, WorldFrame},
    so3::SO3,
};

use crate::error::FusionError;

/// The fixed mount of a sensor on the vehicle body.
///
/// Created once per sensor per recording session. Cameras additionally carry their 3x3
/// intrinsic matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibratedSensor {
    /// Rotation from the sensor frame into the vehicle body frame.
    pub rotation: SO3,
    /// Position of the sensor in the vehicle body frame.
    pub translation: DVec3,
    /// The camera intrinsic matrix, for camera sensors only.
    pub camera_intrinsic: Option<DMat3>,
}

impl CalibratedSensor {
    /// Create a new calibration record without intrinsics.
    pub fn new(rotation: SO3, translation: DVec3) -> Self {
        Self {
            rotation,
            translation,
            camera_intrinsic: None,
        }
    }

    /// Create a calibration record from a `[w, x, y, z]` quaternion and a translation.
    ///
    /// The quaternion must be unit length; `sensor` names the record in the error.
    pub fn from_raw(
        sensor: &str,
        rotation: [f64; 4],
        translation: [f64; 3],
    ) -> Result<Self, FusionError> {
        let rotation =
            SO3::from_wxyz_checked(rotation).map_err(|source| FusionError::InvalidRotation {
                component: "calibrated_sensor",
                sensor: sensor.to_string(),
                source,
            })?;
        Ok(Self::new(rotation, DVec3::from_array(translation)))
    }

    /// Attach a camera intrinsic matrix.
    pub fn with_camera_intrinsic(mut self, intrinsic: DMat3) -> Self {
        self.camera_intrinsic = Some(intrinsic);
        self
    }

    /// The mount as a transform from the sensor frame into the vehicle body frame.
    pub fn sensor_to_vehicle(&self) -> Isometry3<SensorFrame, VehicleFrame> {
        Isometry3::new(self.rotation, self.translation)
    }
}

/// The pose of the vehicle body in the world frame at one instant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EgoPose {
    /// Rotation from the vehicle body frame into the world frame.
    pub rotation: SO3,
    /// Position of the vehicle body in the world frame.
    pub translation: DVec3,
    /// Capture time in microseconds.
    pub timestamp: i64,
}

impl EgoPose {
    /// Create a new pose.
    pub fn new(rotation: SO3, translation: DVec3, timestamp: i64) -> Self {
        Self {
            rotation,
            translation,
            timestamp,
        }
    }

    /// Create a pose from a `[w, x, y, z]` quaternion, a translation and a timestamp.
    ///
    /// `owner` names the record in the error, usually the channel captured at this pose.
    pub fn from_raw(
        owner: &str,
        rotation: [f64; 4],
        translation: [f64; 3],
        timestamp: i64,
    ) -> Result<Self, FusionError> {
        let rotation =
            SO3::from_wxyz_checked(rotation).map_err(|source| FusionError::InvalidRotation {
                component: "ego_pose",
                sensor: owner.to_string(),
                source,
            })?;
        Ok(Self::new(rotation, DVec3::from_array(translation), timestamp))
    }

    /// The pose as a transform from the vehicle body frame into the world frame.
    pub fn vehicle_to_world(&self) -> Isometry3<VehicleFrame, WorldFrame> {
        Isometry3::new(self.rotation, self.translation)
    }
}

/// The ego pose chosen as the common target frame of one fusion run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReferencePose(pub EgoPose);

impl ReferencePose {
    /// Use `pose` as the reference.
    pub fn new(pose: EgoPose) -> Self {
        Self(pose)
    }

    /// The underlying ego pose.
    #[inline]
    pub fn pose(&self) -> &EgoPose {
        &self.0
    }

    /// The reference vehicle body as seen from the world frame.
    pub fn reference_to_world(&self) -> Isometry3<ReferenceFrame, WorldFrame> {
        Isometry3::new(self.0.rotation, self.0.translation)
    }

    /// The transform taking world coordinates into the reference vehicle body frame.
    pub fn world_to_reference(&self) -> Isometry3<WorldFrame, ReferenceFrame> {
        self.reference_to_world().inverse()
    }
}

impl From<EgoPose> for ReferencePose {
    fn from(pose: EgoPose) -> Self {
        Self(pose)
    }
}
