use glam::{DMat2, DVec2, DVec3};
use radar_fusion_lie::frames::{Isometry3, ReferenceFrame, SensorFrame, VehicleFrame, WorldFrame};

use crate::{
    pointcloud::{PointCloudFrame, RadarPoint},
    pose::{CalibratedSensor, EgoPose, ReferencePose},
};

/// The chain of transforms taking one sensor's detections into the reference vehicle frame.
///
/// Positions go through sensor -> vehicle -> world -> reference. Velocities are only rotated by
/// the planar block of the sensor mount and stay in the capture-instant vehicle orientation:
/// the radar reports them already compensated for ego motion.
#[derive(Debug, Clone, Copy)]
pub struct SensorToReference {
    sensor_to_vehicle: Isometry3<SensorFrame, VehicleFrame>,
    vehicle_to_world: Isometry3<VehicleFrame, WorldFrame>,
    world_to_reference: Isometry3<WorldFrame, ReferenceFrame>,
    velocity_rotation: DMat2,
}

impl SensorToReference {
    /// Build the chain for a sensor captured at `ego_pose`.
    pub fn new(
        calibration: &CalibratedSensor,
        ego_pose: &EgoPose,
        reference: &ReferencePose,
    ) -> Self {
        Self {
            sensor_to_vehicle: calibration.sensor_to_vehicle(),
            vehicle_to_world: ego_pose.vehicle_to_world(),
            world_to_reference: reference.world_to_reference(),
            velocity_rotation: calibration.rotation.planar_block(),
        }
    }

    /// The sensor mount.
    pub fn sensor_to_vehicle(&self) -> &Isometry3<SensorFrame, VehicleFrame> {
        &self.sensor_to_vehicle
    }

    /// The vehicle pose at the capture instant.
    pub fn vehicle_to_world(&self) -> &Isometry3<VehicleFrame, WorldFrame> {
        &self.vehicle_to_world
    }

    /// The inverse of the reference pose.
    pub fn world_to_reference(&self) -> &Isometry3<WorldFrame, ReferenceFrame> {
        &self.world_to_reference
    }

    /// The position chain collapsed into a single transform.
    pub fn composed(&self) -> Isometry3<SensorFrame, ReferenceFrame> {
        self.world_to_reference * self.vehicle_to_world * self.sensor_to_vehicle
    }

    /// Map a position step by step through the chain.
    #[inline]
    pub fn transform_position(&self, position: DVec3) -> DVec3 {
        let in_vehicle = self.sensor_to_vehicle.transform_point(position);
        let in_world = self.vehicle_to_world.transform_point(in_vehicle);
        self.world_to_reference.transform_point(in_world)
    }

    /// Rotate a planar velocity by the sensor mount only.
    #[inline]
    pub fn transform_velocity(&self, velocity: DVec2) -> DVec2 {
        self.velocity_rotation * velocity
    }

    /// Convert a whole point cloud. Auxiliary channels are copied unchanged.
    pub fn apply(&self, frame: &PointCloudFrame<SensorFrame>) -> PointCloudFrame<ReferenceFrame> {
        let points = frame
            .iter()
            .map(|point| RadarPoint {
                position: self.transform_position(point.position),
                velocity: self.transform_velocity(point.velocity),
                auxiliary: point.auxiliary.clone(),
            })
            .collect();
        PointCloudFrame::new(frame.sensor(), points)
    }
}

/// Express the detections of one sensor in the reference vehicle frame.
///
/// # Arguments
///
/// * `frame` - The detections in the sensor's native frame.
/// * `calibration` - The sensor mount on the vehicle body.
/// * `ego_pose` - The vehicle pose at the sensor's capture instant.
/// * `reference` - The pose defining the common target frame.
///
/// # Returns
///
/// The same points, in the same order, with positions in the reference frame and velocities
/// rotated into the capture-instant vehicle orientation.
///
/// Example:
///
/// ```
/// use glam::{DVec2, DVec3};
/// use radar_fusion_3d::convert::convert_to_reference;
/// use radar_fusion_3d::pointcloud::{PointCloudFrame, RadarPoint};
/// use radar_fusion_3d::pose::{CalibratedSensor, EgoPose, ReferencePose};
/// use radar_fusion_3d::SensorFrame;
/// use radar_fusion_lie::so3::SO3;
///
/// let calibration = CalibratedSensor::new(SO3::IDENTITY, DVec3::new(1.0, 0.0, 0.0));
/// let ego_pose = EgoPose::new(SO3::IDENTITY, DVec3::ZERO, 0);
/// let reference = ReferencePose::new(ego_pose);
///
/// let frame = PointCloudFrame::<SensorFrame>::new(
///     "RADAR_FRONT",
///     vec![RadarPoint::new(DVec3::ZERO, DVec2::new(1.0, 0.0))],
/// );
/// let converted = convert_to_reference(&frame, &calibration, &ego_pose, &reference);
/// assert_eq!(converted.points()[0].position, DVec3::new(1.0, 0.0, 0.0));
/// assert_eq!(converted.points()[0].velocity, DVec2::new(1.0, 0.0));
/// ```
pub fn convert_to_reference(
    frame: &PointCloudFrame<SensorFrame>,
    calibration: &CalibratedSensor,
    ego_pose: &EgoPose,
    reference: &ReferencePose,
) -> PointCloudFrame<ReferenceFrame> {
    let chain = SensorToReference::new(calibration, ego_pose, reference);
    let converted = chain.apply(frame);
    log::debug!(
        "converted {} points of {} (capture {} us, reference {} us)",
        converted.len(),
        frame.sensor(),
        ego_pose.timestamp,
        reference.pose().timestamp
    );
    converted
}
