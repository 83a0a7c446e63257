use glam::{DMat3, DVec3};
use radar_fusion_lie::frames::{CameraFrame, Isometry3, ReferenceFrame};

use crate::{error::FusionError, pose::CalibratedSensor};

/// Image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ImageSize {
    /// Width of the image in pixels.
    pub width: usize,
    /// Height of the image in pixels.
    pub height: usize,
}

/// A struct representing the intrinsic parameters of a pinhole camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PinholeCameraIntrinsic {
    /// The focal length in pixels (fx, fy)
    pub focal_length: (f64, f64),
    /// The principal point in pixels (cx, cy)
    pub principal_point: (f64, f64),
    /// The axis skew
    pub skew: f64,
    /// The image dimensions
    pub image_size: ImageSize,
}

impl PinholeCameraIntrinsic {
    /// Creates a new PinholeCameraIntrinsic with the given parameters and no skew.
    pub fn new(
        focal_length: (f64, f64),
        principal_point: (f64, f64),
        image_size: ImageSize,
    ) -> Self {
        Self {
            focal_length,
            principal_point,
            skew: 0.0,
            image_size,
        }
    }

    /// Creates the intrinsic from an upper triangular 3x3 camera matrix.
    ///
    /// The last row must be `[0, 0, 1]` and both focal lengths must be finite and non-zero.
    pub fn from_matrix(
        camera: &str,
        k: &DMat3,
        image_size: ImageSize,
    ) -> Result<Self, FusionError> {
        let invalid = |reason: &str| FusionError::InvalidIntrinsic {
            camera: camera.to_string(),
            reason: reason.to_string(),
        };

        if !k.is_finite() {
            return Err(invalid("matrix contains non-finite values"));
        }
        // glam is column major: row 2 is the z component of every column
        if k.row(2) != DVec3::new(0.0, 0.0, 1.0) {
            return Err(invalid("last row must be [0, 0, 1]"));
        }
        if k.x_axis.y != 0.0 {
            return Err(invalid("matrix must be upper triangular"));
        }

        let (fx, fy) = (k.x_axis.x, k.y_axis.y);
        if fx == 0.0 || fy == 0.0 {
            return Err(invalid("focal length must be non-zero"));
        }

        Ok(Self {
            focal_length: (fx, fy),
            principal_point: (k.z_axis.x, k.z_axis.y),
            skew: k.y_axis.x,
            image_size,
        })
    }

    /// Returns the camera matrix.
    pub fn camera_matrix(&self) -> DMat3 {
        DMat3::from_cols(
            DVec3::new(self.focal_length.0, 0.0, 0.0),
            DVec3::new(self.skew, self.focal_length.1, 0.0),
            DVec3::new(self.principal_point.0, self.principal_point.1, 1.0),
        )
    }
}

/// Everything needed to project reference-frame points into one camera.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraView {
    /// The camera identifier, e.g. `CAM_FRONT`.
    pub name: String,
    /// The camera mount on the vehicle body.
    pub mount: CalibratedSensor,
    /// The pinhole intrinsic.
    pub intrinsic: PinholeCameraIntrinsic,
}

impl CameraView {
    /// Create a new camera view.
    pub fn new(
        name: impl Into<String>,
        mount: CalibratedSensor,
        intrinsic: PinholeCameraIntrinsic,
    ) -> Self {
        Self {
            name: name.into(),
            mount,
            intrinsic,
        }
    }

    /// Create a camera view from a calibration record carrying the camera intrinsic.
    pub fn from_calibration(
        name: &str,
        calibration: &CalibratedSensor,
        image_size: ImageSize,
    ) -> Result<Self, FusionError> {
        let k = calibration
            .camera_intrinsic
            .ok_or_else(|| FusionError::InvalidIntrinsic {
                camera: name.to_string(),
                reason: "calibration has no camera intrinsic".to_string(),
            })?;
        let intrinsic = PinholeCameraIntrinsic::from_matrix(name, &k, image_size)?;
        Ok(Self::new(name, calibration.clone(), intrinsic))
    }

    /// The image dimensions.
    #[inline]
    pub fn image_size(&self) -> ImageSize {
        self.intrinsic.image_size
    }

    /// The transform from the reference vehicle frame into the camera frame.
    ///
    /// The mount is relative to the vehicle body and is applied against the reference vehicle
    /// frame as is: `R^T * (p - t)`.
    pub fn reference_to_camera(&self) -> Isometry3<ReferenceFrame, CameraFrame> {
        let camera_to_reference: Isometry3<CameraFrame, ReferenceFrame> =
            Isometry3::new(self.mount.rotation, self.mount.translation);
        camera_to_reference.inverse()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use radar_fusion_lie::so3::SO3;

    const SIZE: ImageSize = ImageSize {
        width: 1600,
        height: 900,
    };

    fn nuscenes_front_k() -> DMat3 {
        // row major [[1266.4, 0, 816.3], [0, 1266.4, 491.5], [0, 0, 1]]
        DMat3::from_cols_array_2d(&[
            [1266.417203046554, 0.0, 816.2670197447984],
            [0.0, 1266.417203046554, 491.50706579294757],
            [0.0, 0.0, 1.0],
        ])
        .transpose()
    }

    #[test]
    fn test_from_matrix() -> Result<(), FusionError> {
        let intrinsic =
            PinholeCameraIntrinsic::from_matrix("CAM_FRONT", &nuscenes_front_k(), SIZE)?;
        assert_eq!(intrinsic.focal_length, (1266.417203046554, 1266.417203046554));
        assert_eq!(intrinsic.principal_point, (816.2670197447984, 491.50706579294757));
        assert_eq!(intrinsic.skew, 0.0);
        assert_eq!(intrinsic.camera_matrix(), nuscenes_front_k());
        Ok(())
    }

    #[test]
    fn test_from_matrix_rejects_bad_rows() {
        let mut k = nuscenes_front_k();
        k.z_axis.z = 2.0;
        assert!(matches!(
            PinholeCameraIntrinsic::from_matrix("CAM_BACK", &k, SIZE),
            Err(FusionError::InvalidIntrinsic { .. })
        ));

        let mut k = nuscenes_front_k();
        k.x_axis.x = 0.0;
        assert!(PinholeCameraIntrinsic::from_matrix("CAM_BACK", &k, SIZE).is_err());
    }

    #[test]
    fn test_from_calibration_requires_intrinsic() {
        let mount = CalibratedSensor::new(SO3::IDENTITY, DVec3::ZERO);
        let res = CameraView::from_calibration("CAM_FRONT", &mount, SIZE);
        assert!(matches!(
            res,
            Err(FusionError::InvalidIntrinsic { camera, .. }) if camera == "CAM_FRONT"
        ));

        let mount = mount.with_camera_intrinsic(nuscenes_front_k());
        let view = CameraView::from_calibration("CAM_FRONT", &mount, SIZE);
        assert!(view.is_ok_and(|v| v.image_size() == SIZE));
    }

    #[test]
    fn test_reference_to_camera() {
        let rotation = SO3::exp(DVec3::new(0.2, -0.4, 1.0));
        let translation = DVec3::new(1.7, 0.01, 1.5);
        let view = CameraView::new(
            "CAM_FRONT",
            CalibratedSensor::new(rotation, translation),
            PinholeCameraIntrinsic::new((1000.0, 1000.0), (800.0, 450.0), SIZE),
        );

        let p = DVec3::new(20.0, -3.0, 0.4);
        let expected = rotation.matrix().transpose() * (p - translation);
        let actual = view.reference_to_camera().transform_point(p);
        assert!(actual.abs_diff_eq(expected, 1e-9));
    }
}
