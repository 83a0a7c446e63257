use radar_fusion_lie::frames::SensorFrame;

use crate::{
    camera::{CameraView, ImageSize},
    error::FusionError,
    pointcloud::PointCloudFrame,
    pose::{CalibratedSensor, EgoPose},
};

/// One sensor capture belonging to a sample.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SampleData {
    /// The capture token.
    pub token: String,
    /// The sample the capture belongs to.
    pub sample_token: String,
    /// The sensor channel, e.g. `RADAR_FRONT` or `CAM_FRONT`.
    pub channel: String,
    /// Token of the sensor calibration record.
    pub calibrated_sensor_token: String,
    /// Token of the ego pose at the capture instant.
    pub ego_pose_token: String,
    /// Path of the raw data file, relative to the dataset root.
    pub filename: String,
    /// Capture time in microseconds.
    pub timestamp: i64,
    /// Image dimensions, for camera captures.
    pub image_size: Option<ImageSize>,
}

/// Read-only access to a recorded dataset.
///
/// The fusion pipeline only queries records; it never mutates the catalog.
pub trait Catalog {
    /// The capture of `channel` in the sample `sample_token`.
    fn sample_data(&self, sample_token: &str, channel: &str) -> Result<&SampleData, FusionError>;

    /// The calibration record with the given token.
    fn calibrated_sensor(&self, token: &str) -> Result<&CalibratedSensor, FusionError>;

    /// The ego pose record with the given token.
    fn ego_pose(&self, token: &str) -> Result<&EgoPose, FusionError>;

    /// Decode the radar detections of a capture, in the sensor's native frame.
    fn radar_points(
        &self,
        sample_data: &SampleData,
    ) -> Result<PointCloudFrame<SensorFrame>, FusionError>;

    /// Build the view of a camera capture from its calibration record.
    fn camera_view(&self, sample_token: &str, channel: &str) -> Result<CameraView, FusionError> {
        let sample_data = self.sample_data(sample_token, channel)?;
        let calibration = self.calibrated_sensor(&sample_data.calibrated_sensor_token)?;
        let image_size = sample_data
            .image_size
            .ok_or_else(|| FusionError::InvalidIntrinsic {
                camera: channel.to_string(),
                reason: "capture has no image size".to_string(),
            })?;
        CameraView::from_calibration(channel, calibration, image_size)
    }
}
