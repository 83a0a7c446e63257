use std::marker::PhantomData;

use glam::{DVec2, DVec3};
use radar_fusion_lie::frames::Frame;

use crate::error::FusionError;

/// A single radar detection.
#[derive(Debug, Clone, PartialEq)]
pub struct RadarPoint {
    /// Position in the frame of the owning point cloud.
    pub position: DVec3,
    /// Planar velocity (vx, vy).
    pub velocity: DVec2,
    /// Extra per-point channels, carried through every transform unchanged.
    pub auxiliary: Vec<f32>,
}

impl RadarPoint {
    /// Create a new point without auxiliary channels.
    pub fn new(position: DVec3, velocity: DVec2) -> Self {
        Self {
            position,
            velocity,
            auxiliary: Vec::new(),
        }
    }

    /// Attach auxiliary channels.
    pub fn with_auxiliary(mut self, auxiliary: Vec<f32>) -> Self {
        self.auxiliary = auxiliary;
        self
    }
}

/// The radar detections of one sensor, expressed in the frame `F`.
#[derive(Debug, Clone, PartialEq)]
pub struct PointCloudFrame<F> {
    // The sensor identifier, e.g. `RADAR_FRONT`.
    sensor: String,
    // The points in capture order.
    points: Vec<RadarPoint>,
    frame: PhantomData<F>,
}

impl<F: Frame> PointCloudFrame<F> {
    /// Create a new point cloud frame from structured points.
    pub fn new(sensor: impl Into<String>, points: Vec<RadarPoint>) -> Self {
        Self {
            sensor: sensor.into(),
            points,
            frame: PhantomData,
        }
    }

    /// Create an empty point cloud frame.
    pub fn empty(sensor: impl Into<String>) -> Self {
        Self::new(sensor, Vec::new())
    }

    /// Create a point cloud frame from separate position, velocity and auxiliary channels.
    ///
    /// All channels must have one row per point.
    ///
    /// Example:
    ///
    /// ```
    /// use radar_fusion_3d::{pointcloud::PointCloudFrame, SensorFrame};
    ///
    /// let frame = PointCloudFrame::<SensorFrame>::from_channels(
    ///     "RADAR_FRONT",
    ///     &[[10.0, 0.5, 0.0], [25.0, -3.0, 0.0]],
    ///     &[[1.0, 0.0], [-0.5, 0.2]],
    ///     None,
    /// )
    /// .unwrap();
    /// assert_eq!(frame.len(), 2);
    /// ```
    pub fn from_channels(
        sensor: impl Into<String>,
        positions: &[[f64; 3]],
        velocities: &[[f64; 2]],
        auxiliary: Option<Vec<Vec<f32>>>,
    ) -> Result<Self, FusionError> {
        let sensor = sensor.into();

        if positions.len() != velocities.len() {
            return Err(FusionError::ShapeMismatch {
                sensor,
                positions: positions.len(),
                velocities: velocities.len(),
            });
        }

        let auxiliary = match auxiliary {
            Some(rows) if rows.len() != positions.len() => {
                return Err(FusionError::AuxiliaryShapeMismatch {
                    sensor,
                    positions: positions.len(),
                    auxiliary: rows.len(),
                });
            }
            Some(rows) => rows,
            None => vec![Vec::new(); positions.len()],
        };

        let points = positions
            .iter()
            .zip(velocities.iter())
            .zip(auxiliary)
            .map(|((p, v), aux)| RadarPoint {
                position: DVec3::from_array(*p),
                velocity: DVec2::from_array(*v),
                auxiliary: aux,
            })
            .collect();

        Ok(Self::new(sensor, points))
    }

    /// The sensor identifier.
    #[inline]
    pub fn sensor(&self) -> &str {
        &self.sensor
    }

    /// The name of the frame the positions are expressed in.
    #[inline]
    pub fn frame_name(&self) -> &'static str {
        F::NAME
    }

    /// Get the number of points.
    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    /// Check if the frame holds no points.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Get as reference the points.
    pub fn points(&self) -> &[RadarPoint] {
        &self.points
    }

    /// Iterate over the points.
    pub fn iter(&self) -> std::slice::Iter<'_, RadarPoint> {
        self.points.iter()
    }

    /// Iterate over the positions.
    pub fn positions(&self) -> impl Iterator<Item = DVec3> + '_ {
        self.points.iter().map(|p| p.position)
    }

    /// Iterate over the velocities.
    pub fn velocities(&self) -> impl Iterator<Item = DVec2> + '_ {
        self.points.iter().map(|p| p.velocity)
    }

    /// Consume the frame and return its points.
    pub fn into_points(self) -> Vec<RadarPoint> {
        self.points
    }

    /// The axis-aligned bounds of the positions, or `None` when empty.
    pub fn bounds(&self) -> Option<(DVec3, DVec3)> {
        let first = self.points.first()?.position;
        Some(
            self.positions()
                .fold((first, first), |(lo, hi), p| (lo.min(p), hi.max(p))),
        )
    }
}

impl<'a, F> IntoIterator for &'a PointCloudFrame<F> {
    type Item = &'a RadarPoint;
    type IntoIter = std::slice::Iter<'a, RadarPoint>;

    fn into_iter(self) -> Self::IntoIter {
        self.points.iter()
    }
}
