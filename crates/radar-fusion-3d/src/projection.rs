use glam::{DMat3, DVec2, DVec3};
use rayon::prelude::*;

use radar_fusion_lie::frames::ReferenceFrame;

use crate::{
    camera::{CameraView, ImageSize},
    fusion::{Color, FusedRadarSweep},
    pointcloud::PointCloudFrame,
};

/// A point projected onto the image plane of a camera.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProjectedPoint {
    /// Pixel coordinates (x right, y down).
    pub pixel: DVec2,
    /// Depth along the optical axis, always positive.
    pub depth: f64,
}

impl ProjectedPoint {
    /// Check whether the pixel lies within an image of the given size.
    pub fn is_inside(&self, size: ImageSize) -> bool {
        self.pixel.x >= 0.0
            && self.pixel.y >= 0.0
            && self.pixel.x < size.width as f64
            && self.pixel.y < size.height as f64
    }
}

/// The projected points of one sensor in one camera.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorProjection {
    /// The source sensor identifier.
    pub sensor: String,
    /// The display color of the sensor.
    pub color: Color,
    /// The visible points, in source order.
    pub points: Vec<ProjectedPoint>,
}

/// The projection of a fused sweep into one camera, grouped by source sensor.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraProjection {
    /// The camera identifier.
    pub camera: String,
    /// The image dimensions of the camera.
    pub image_size: ImageSize,
    /// One group per sensor of the sweep, in sweep order. Groups may be empty.
    pub sensors: Vec<SensorProjection>,
}

impl CameraProjection {
    /// The projection group of a sensor.
    pub fn get(&self, sensor: &str) -> Option<&SensorProjection> {
        self.sensors.iter().find(|s| s.sensor == sensor)
    }

    /// Number of points in front of the camera over all sensors.
    pub fn visible_count(&self) -> usize {
        self.sensors.iter().map(|s| s.points.len()).sum()
    }

    /// Number of points that also land within the image bounds.
    pub fn in_image_count(&self) -> usize {
        self.iter_points()
            .filter(|(_, _, p)| p.is_inside(self.image_size))
            .count()
    }

    /// Iterate over every projected point with its source sensor and color.
    pub fn iter_points(&self) -> impl Iterator<Item = (&str, Color, &ProjectedPoint)> + '_ {
        self.sensors.iter().flat_map(|s| {
            s.points
                .iter()
                .map(move |p| (s.sensor.as_str(), s.color, p))
        })
    }
}

/// Apply a 3x3 projection to points, optionally dividing by the third coordinate.
///
/// # Arguments
///
/// * `points` - The points to project.
/// * `view` - The projection matrix, e.g. a camera intrinsic.
/// * `normalize` - Whether to divide x and y by z after projecting.
///
/// PRECONDITION: when `normalize` is set, every point has a non-zero projected z.
pub fn view_points(points: &[DVec3], view: &DMat3, normalize: bool) -> Vec<DVec3> {
    points
        .iter()
        .map(|&p| {
            let q = *view * p;
            match normalize {
                true => DVec3::new(q.x / q.z, q.y / q.z, q.z),
                false => q,
            }
        })
        .collect()
}

/// Project the points of one sensor into a camera.
///
/// Points are moved into the camera frame with the inverse of the camera mount, points at or
/// behind the image plane (`z <= 0`) are dropped, and the rest are projected with the intrinsic
/// and a perspective divide. No clipping against the image bounds is done.
pub fn project_frame(
    view: &CameraView,
    frame: &PointCloudFrame<ReferenceFrame>,
) -> Vec<ProjectedPoint> {
    let reference_to_camera = view.reference_to_camera();
    let k = view.intrinsic.camera_matrix();

    // the cull must happen before the divide
    let in_front: Vec<DVec3> = frame
        .positions()
        .map(|p| reference_to_camera.transform_point(p))
        .filter(|p| p.z > 0.0)
        .collect();

    view_points(&in_front, &k, true)
        .into_iter()
        .map(|q| ProjectedPoint {
            pixel: q.truncate(),
            depth: q.z,
        })
        .collect()
}

/// Project every sensor of a sweep into one camera.
pub fn project_sweep(view: &CameraView, sweep: &FusedRadarSweep) -> CameraProjection {
    let sensors = sweep
        .iter()
        .map(|entry| SensorProjection {
            sensor: entry.sensor().to_string(),
            color: entry.color,
            points: project_frame(view, &entry.frame),
        })
        .collect();

    let projection = CameraProjection {
        camera: view.name.clone(),
        image_size: view.image_size(),
        sensors,
    };
    log::debug!(
        "{}: {} of {} points in front of the camera",
        projection.camera,
        projection.visible_count(),
        sweep.total_points()
    );
    projection
}

/// Project a sweep into several cameras. Cameras are processed in parallel and returned in the
/// given order.
pub fn project_all(views: &[CameraView], sweep: &FusedRadarSweep) -> Vec<CameraProjection> {
    views
        .par_iter()
        .map(|view| project_sweep(view, sweep))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        camera::PinholeCameraIntrinsic,
        pointcloud::RadarPoint,
        pose::{CalibratedSensor, EgoPose, ReferencePose},
    };
    use approx::assert_relative_eq;
    use radar_fusion_lie::so3::SO3;
    use rand::{rngs::StdRng, Rng, SeedableRng};

    const SIZE: ImageSize = ImageSize {
        width: 1600,
        height: 900,
    };

    /// A camera at the reference origin whose optical frame equals the reference frame.
    fn aligned_view(f: f64) -> CameraView {
        CameraView::new(
            "CAM_FRONT",
            CalibratedSensor::new(SO3::IDENTITY, DVec3::ZERO),
            PinholeCameraIntrinsic::new((f, f), (816.0, 491.0), SIZE),
        )
    }

    fn frame_of(positions: &[DVec3]) -> PointCloudFrame<ReferenceFrame> {
        PointCloudFrame::new(
            "RADAR_FRONT",
            positions
                .iter()
                .map(|&p| RadarPoint::new(p, DVec2::ZERO))
                .collect(),
        )
    }

    #[test]
    fn test_optical_axis_hits_principal_point() {
        for f in [1.0, 500.0, 1266.4, 1e5] {
            let out = project_frame(&aligned_view(f), &frame_of(&[DVec3::new(0.0, 0.0, 5.0)]));
            assert_eq!(out.len(), 1);
            assert_relative_eq!(out[0].pixel.x, 816.0);
            assert_relative_eq!(out[0].pixel.y, 491.0);
            assert_relative_eq!(out[0].depth, 5.0);
        }
    }

    #[test]
    fn test_cull_drops_zero_and_negative_depth() {
        let frame = frame_of(&[
            DVec3::new(1.0, 1.0, 0.0),
            DVec3::new(1.0, 1.0, -4.0),
            DVec3::new(1.0, 1.0, 1e-9),
            DVec3::new(0.0, 0.0, -0.0),
        ]);
        let out = project_frame(&aligned_view(1000.0), &frame);
        assert_eq!(out.len(), 1);
        assert!(out[0].depth > 0.0);
        assert!(out[0].pixel.is_finite());
    }

    #[test]
    fn test_depth_scaling_invariance() {
        let mut rng = StdRng::seed_from_u64(5);
        let view = aligned_view(1266.4);
        for _ in 0..100 {
            let p = DVec3::new(
                rng.random_range(-10.0..10.0),
                rng.random_range(-5.0..5.0),
                rng.random_range(0.5..80.0),
            );
            let scale = rng.random_range(0.01..100.0);
            let out = project_frame(&view, &frame_of(&[p, p * scale]));
            assert_eq!(out.len(), 2);
            assert!(out[0].pixel.abs_diff_eq(out[1].pixel, 1e-6));
            assert_relative_eq!(out[1].depth, out[0].depth * scale, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_projected_pixels_are_finite() {
        let mut rng = StdRng::seed_from_u64(9);
        let view = CameraView::new(
            "CAM_FRONT_LEFT",
            CalibratedSensor::new(
                SO3::exp(DVec3::new(-1.2, 0.0, 0.9)),
                DVec3::new(1.5, 0.5, 1.5),
            ),
            PinholeCameraIntrinsic::new((1257.8, 1257.8), (827.2, 450.9), SIZE),
        );
        let positions: Vec<DVec3> = (0..500)
            .map(|_| {
                DVec3::new(
                    rng.random_range(-100.0..100.0),
                    rng.random_range(-100.0..100.0),
                    rng.random_range(-2.0..3.0),
                )
            })
            .collect();
        let out = project_frame(&view, &frame_of(&positions));
        assert!(!out.is_empty());
        assert!(out.len() < positions.len());
        assert!(out.iter().all(|p| p.pixel.is_finite() && p.depth > 0.0));
    }

    #[test]
    fn test_no_bounds_clipping() {
        // far off to the side, still in front of the camera
        let out = project_frame(&aligned_view(1000.0), &frame_of(&[DVec3::new(50.0, 0.0, 1.0)]));
        assert_eq!(out.len(), 1);
        assert!(out[0].pixel.x > SIZE.width as f64);
        assert!(!out[0].is_inside(SIZE));
    }

    #[test]
    fn test_project_all_keeps_order_and_empty_groups() {
        let reference = ReferencePose::new(EgoPose::new(SO3::IDENTITY, DVec3::ZERO, 0));
        let mut sweep = FusedRadarSweep::new(reference);
        sweep.insert(frame_of(&[DVec3::new(0.0, 0.0, 10.0)]), Color::BLUE);
        sweep.insert(PointCloudFrame::empty("RADAR_BACK_LEFT"), Color::ORANGE);

        // looking backwards: 180 deg about the camera y axis
        let back = CameraView::new(
            "CAM_BACK",
            CalibratedSensor::new(
                SO3::exp(DVec3::new(0.0, std::f64::consts::PI, 0.0)),
                DVec3::ZERO,
            ),
            PinholeCameraIntrinsic::new((800.0, 800.0), (800.0, 450.0), SIZE),
        );
        let projections = project_all(&[aligned_view(1000.0), back], &sweep);

        assert_eq!(projections.len(), 2);
        assert_eq!(projections[0].camera, "CAM_FRONT");
        assert_eq!(projections[1].camera, "CAM_BACK");

        assert_eq!(projections[0].visible_count(), 1);
        assert_eq!(projections[0].in_image_count(), 1);
        assert_eq!(projections[1].visible_count(), 0);

        for projection in &projections {
            assert_eq!(projection.sensors.len(), 2);
            assert_eq!(projection.sensors[0].sensor, "RADAR_FRONT");
            assert!(projection.get("RADAR_BACK_LEFT").is_some_and(|s| s.points.is_empty()));
        }
    }

    #[test]
    fn test_view_points_without_normalize() {
        let k = DMat3::from_cols(
            DVec3::new(2.0, 0.0, 0.0),
            DVec3::new(0.0, 2.0, 0.0),
            DVec3::new(1.0, 1.0, 1.0),
        );
        let out = view_points(&[DVec3::new(1.0, 2.0, 4.0)], &k, false);
        assert_eq!(out, vec![DVec3::new(6.0, 8.0, 4.0)]);
        let out = view_points(&[DVec3::new(1.0, 2.0, 4.0)], &k, true);
        assert_eq!(out, vec![DVec3::new(1.5, 2.0, 4.0)]);
    }
}
