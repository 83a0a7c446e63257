use rayon::prelude::*;
use serde::Deserialize;

use radar_fusion_lie::frames::{ReferenceFrame, SensorFrame};

use crate::{
    catalog::Catalog,
    config::RadarChannel,
    convert::convert_to_reference,
    error::FusionError,
    pointcloud::{PointCloudFrame, RadarPoint},
    pose::{CalibratedSensor, EgoPose, ReferencePose},
};

/// An RGB display color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(try_from = "ColorRepr")]
pub struct Color {
    /// Red channel.
    pub r: u8,
    /// Green channel.
    pub g: u8,
    /// Blue channel.
    pub b: u8,
}

impl Color {
    /// Pure blue.
    pub const BLUE: Self = Self::new(0, 0, 255);
    /// Dark green.
    pub const GREEN: Self = Self::new(0, 128, 0);
    /// Cyan.
    pub const CYAN: Self = Self::new(0, 255, 255);
    /// Orange.
    pub const ORANGE: Self = Self::new(255, 165, 0);
    /// Pure red.
    pub const RED: Self = Self::new(255, 0, 0);

    /// Create a new color.
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Look up a named color.
    pub fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_lowercase().as_str() {
            "blue" => Some(Self::BLUE),
            "green" => Some(Self::GREEN),
            "cyan" => Some(Self::CYAN),
            "orange" => Some(Self::ORANGE),
            "red" => Some(Self::RED),
            _ => None,
        }
    }

    /// The color as an `[r, g, b]` array.
    pub fn to_array(self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ColorRepr {
    Name(String),
    Rgb([u8; 3]),
}

impl TryFrom<ColorRepr> for Color {
    type Error = String;

    fn try_from(repr: ColorRepr) -> Result<Self, Self::Error> {
        match repr {
            ColorRepr::Name(name) => {
                Color::from_name(&name).ok_or_else(|| format!("unknown color name: {name}"))
            }
            ColorRepr::Rgb([r, g, b]) => Ok(Color::new(r, g, b)),
        }
    }
}

/// One sensor's detections in the reference frame, with its display color.
#[derive(Debug, Clone, PartialEq)]
pub struct SensorEntry {
    /// The converted detections.
    pub frame: PointCloudFrame<ReferenceFrame>,
    /// The display color of the sensor.
    pub color: Color,
}

impl SensorEntry {
    /// The sensor identifier.
    #[inline]
    pub fn sensor(&self) -> &str {
        self.frame.sensor()
    }
}

/// The detections of several radars, all expressed in one reference vehicle frame.
///
/// Entries keep the order they were inserted in. Inserting a sensor that is already present
/// replaces its entry in place.
#[derive(Debug, Clone, PartialEq)]
pub struct FusedRadarSweep {
    reference: ReferencePose,
    entries: Vec<SensorEntry>,
}

impl FusedRadarSweep {
    /// Create an empty sweep in the frame of `reference`.
    pub fn new(reference: ReferencePose) -> Self {
        Self {
            reference,
            entries: Vec::new(),
        }
    }

    /// The pose all positions are expressed relative to.
    pub fn reference(&self) -> &ReferencePose {
        &self.reference
    }

    /// Insert a sensor's frame. Returns the replaced entry when the sensor was already present.
    pub fn insert(
        &mut self,
        frame: PointCloudFrame<ReferenceFrame>,
        color: Color,
    ) -> Option<SensorEntry> {
        let entry = SensorEntry { frame, color };
        match self
            .entries
            .iter_mut()
            .find(|e| e.sensor() == entry.sensor())
        {
            Some(existing) => {
                log::warn!("replacing frame of sensor {}", entry.sensor());
                Some(std::mem::replace(existing, entry))
            }
            None => {
                self.entries.push(entry);
                None
            }
        }
    }

    /// Get the entry of a sensor.
    pub fn get(&self, sensor: &str) -> Option<&SensorEntry> {
        self.entries.iter().find(|e| e.sensor() == sensor)
    }

    /// Number of sensors.
    #[inline]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if no sensor has been inserted.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over the entries in insertion order.
    pub fn iter(&self) -> std::slice::Iter<'_, SensorEntry> {
        self.entries.iter()
    }

    /// The sensor identifiers in insertion order.
    pub fn sensors(&self) -> impl Iterator<Item = &str> + '_ {
        self.entries.iter().map(SensorEntry::sensor)
    }

    /// Number of points of each sensor, in insertion order.
    pub fn points_per_sensor(&self) -> Vec<(&str, usize)> {
        self.entries
            .iter()
            .map(|e| (e.sensor(), e.frame.len()))
            .collect()
    }

    /// Total number of points over all sensors.
    pub fn total_points(&self) -> usize {
        self.entries.iter().map(|e| e.frame.len()).sum()
    }

    /// Iterate over every point together with its sensor and color.
    pub fn iter_points(&self) -> impl Iterator<Item = (&str, Color, &RadarPoint)> + '_ {
        self.entries
            .iter()
            .flat_map(|e| e.frame.iter().map(move |p| (e.sensor(), e.color, p)))
    }
}

impl<'a> IntoIterator for &'a FusedRadarSweep {
    type Item = &'a SensorEntry;
    type IntoIter = std::slice::Iter<'a, SensorEntry>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

/// The raw capture of one radar together with the records needed to convert it.
#[derive(Debug, Clone)]
pub struct SensorCapture {
    /// The detections in the sensor frame.
    pub frame: PointCloudFrame<SensorFrame>,
    /// The sensor mount.
    pub calibration: CalibratedSensor,
    /// The vehicle pose at the capture instant.
    pub ego_pose: EgoPose,
    /// The display color of the sensor.
    pub color: Color,
}

/// Convert every capture into the reference frame and merge them, keeping the given order.
///
/// The conversions run in parallel; each one only reads its own capture.
pub fn fuse_captures(reference: ReferencePose, captures: &[SensorCapture]) -> FusedRadarSweep {
    let converted: Vec<_> = captures
        .par_iter()
        .map(|c| {
            (
                convert_to_reference(&c.frame, &c.calibration, &c.ego_pose, &reference),
                c.color,
            )
        })
        .collect();

    let mut sweep = FusedRadarSweep::new(reference);
    for (frame, color) in converted {
        sweep.insert(frame, color);
    }
    sweep
}

/// Fuse the radar captures of one sample of a catalog.
///
/// # Arguments
///
/// * `catalog` - The dataset to read records and detections from.
/// * `sample_token` - The sample to fuse.
/// * `radars` - The radar channels to fuse, in output order.
/// * `reference_channel` - The channel whose ego pose becomes the reference frame.
///
/// # Returns
///
/// The fused sweep, or the first error met while loading any of the sensors. Errors are
/// wrapped in [`FusionError::Sensor`] naming the channel that failed.
pub fn fuse_sample<C: Catalog + Sync>(
    catalog: &C,
    sample_token: &str,
    radars: &[RadarChannel],
    reference_channel: &str,
) -> Result<FusedRadarSweep, FusionError> {
    let reference = catalog
        .sample_data(sample_token, reference_channel)
        .and_then(|data| catalog.ego_pose(&data.ego_pose_token))
        .map(|pose| ReferencePose::new(*pose))
        .map_err(|e| e.in_sensor(reference_channel))?;

    let converted = radars
        .par_iter()
        .map(|radar| {
            let load = || -> Result<_, FusionError> {
                let sample_data = catalog.sample_data(sample_token, &radar.channel)?;
                let calibration =
                    catalog.calibrated_sensor(&sample_data.calibrated_sensor_token)?;
                let ego_pose = catalog.ego_pose(&sample_data.ego_pose_token)?;
                let raw = catalog.radar_points(sample_data)?;
                Ok(convert_to_reference(&raw, calibration, ego_pose, &reference))
            };
            load()
                .map(|frame| (frame, radar.color))
                .map_err(|e| e.in_sensor(&radar.channel))
        })
        .collect::<Result<Vec<_>, FusionError>>()?;

    let mut sweep = FusedRadarSweep::new(reference);
    for (frame, color) in converted {
        sweep.insert(frame, color);
    }
    log::info!(
        "fused {} points from {} radars of sample {}",
        sweep.total_points(),
        sweep.len(),
        sample_token
    );
    Ok(sweep)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::SampleData;
    use glam::{DVec2, DVec3};
    use radar_fusion_lie::so3::SO3;

    fn capture(sensor: &str, num_points: usize, x_offset: f64, color: Color) -> SensorCapture {
        let points = (0..num_points)
            .map(|i| RadarPoint::new(DVec3::new(i as f64, 0.0, 0.0), DVec2::new(1.0, 0.0)))
            .collect();
        SensorCapture {
            frame: PointCloudFrame::new(sensor, points),
            calibration: CalibratedSensor::new(SO3::IDENTITY, DVec3::new(x_offset, 0.0, 0.0)),
            ego_pose: EgoPose::new(SO3::IDENTITY, DVec3::ZERO, 0),
            color,
        }
    }

    fn reference() -> ReferencePose {
        ReferencePose::new(EgoPose::new(SO3::IDENTITY, DVec3::ZERO, 0))
    }

    #[test]
    fn test_order_and_completeness() {
        let captures = vec![
            capture("RADAR_FRONT", 3, 3.4, Color::BLUE),
            capture("RADAR_FRONT_LEFT", 0, 2.4, Color::GREEN),
            capture("RADAR_FRONT_RIGHT", 7, 2.4, Color::CYAN),
            capture("RADAR_BACK_LEFT", 1, -0.5, Color::ORANGE),
            capture("RADAR_BACK_RIGHT", 12, -0.5, Color::RED),
        ];
        let sweep = fuse_captures(reference(), &captures);

        assert_eq!(sweep.len(), 5);
        assert_eq!(
            sweep.points_per_sensor(),
            vec![
                ("RADAR_FRONT", 3),
                ("RADAR_FRONT_LEFT", 0),
                ("RADAR_FRONT_RIGHT", 7),
                ("RADAR_BACK_LEFT", 1),
                ("RADAR_BACK_RIGHT", 12),
            ]
        );
        assert_eq!(sweep.total_points(), 23);
        assert_eq!(sweep.iter_points().count(), 23);

        let front = sweep.get("RADAR_FRONT").map(|e| e.frame.points()[2].position);
        assert_eq!(front, Some(DVec3::new(5.4, 0.0, 0.0)));
        assert!(sweep.get("RADAR_FRONT_LEFT").is_some_and(|e| e.frame.is_empty()));
    }

    #[test]
    fn test_last_write_wins() {
        let mut sweep = FusedRadarSweep::new(reference());
        sweep.insert(PointCloudFrame::empty("RADAR_FRONT"), Color::BLUE);
        sweep.insert(PointCloudFrame::empty("RADAR_BACK_LEFT"), Color::ORANGE);

        let replaced = sweep.insert(
            PointCloudFrame::new(
                "RADAR_FRONT",
                vec![RadarPoint::new(DVec3::ONE, DVec2::ZERO)],
            ),
            Color::RED,
        );

        assert!(replaced.is_some_and(|e| e.color == Color::BLUE));
        assert_eq!(sweep.len(), 2);
        assert_eq!(
            sweep.sensors().collect::<Vec<_>>(),
            vec!["RADAR_FRONT", "RADAR_BACK_LEFT"]
        );
        assert_eq!(sweep.get("RADAR_FRONT").map(|e| e.color), Some(Color::RED));
        assert_eq!(sweep.total_points(), 1);
    }

    #[test]
    fn test_iter_points_carries_sensor_and_color() {
        let captures = vec![
            capture("RADAR_FRONT", 1, 0.0, Color::BLUE),
            capture("RADAR_BACK_RIGHT", 2, 0.0, Color::RED),
        ];
        let sweep = fuse_captures(reference(), &captures);
        let tags: Vec<_> = sweep.iter_points().map(|(s, c, _)| (s, c)).collect();
        assert_eq!(
            tags,
            vec![
                ("RADAR_FRONT", Color::BLUE),
                ("RADAR_BACK_RIGHT", Color::RED),
                ("RADAR_BACK_RIGHT", Color::RED),
            ]
        );
    }

    /// One sample `s0` whose radars share a mount and a pose. Reading `broken` fails.
    struct MemoryCatalog {
        data: Vec<SampleData>,
        calibration: CalibratedSensor,
        ego_pose: EgoPose,
        broken: &'static str,
    }

    impl MemoryCatalog {
        fn new(channels: &[&str], broken: &'static str) -> Self {
            let data = channels
                .iter()
                .map(|channel| SampleData {
                    token: format!("sd-{channel}"),
                    sample_token: "s0".to_string(),
                    channel: channel.to_string(),
                    calibrated_sensor_token: "cs".to_string(),
                    ego_pose_token: "ep".to_string(),
                    filename: format!("samples/{channel}.pcd"),
                    timestamp: 0,
                    image_size: None,
                })
                .collect();
            Self {
                data,
                calibration: CalibratedSensor::new(SO3::IDENTITY, DVec3::X),
                ego_pose: EgoPose::new(SO3::IDENTITY, DVec3::ZERO, 0),
                broken,
            }
        }
    }

    impl Catalog for MemoryCatalog {
        fn sample_data(&self, sample: &str, channel: &str) -> Result<&SampleData, FusionError> {
            self.data
                .iter()
                .find(|d| d.sample_token == sample && d.channel == channel)
                .ok_or_else(|| FusionError::UnknownSensor {
                    sample: sample.to_string(),
                    channel: channel.to_string(),
                })
        }

        fn calibrated_sensor(&self, token: &str) -> Result<&CalibratedSensor, FusionError> {
            (token == "cs")
                .then_some(&self.calibration)
                .ok_or_else(|| FusionError::UnknownRecord {
                    table: "calibrated_sensor",
                    token: token.to_string(),
                })
        }

        fn ego_pose(&self, token: &str) -> Result<&EgoPose, FusionError> {
            (token == "ep")
                .then_some(&self.ego_pose)
                .ok_or_else(|| FusionError::UnknownRecord {
                    table: "ego_pose",
                    token: token.to_string(),
                })
        }

        fn radar_points(
            &self,
            sample_data: &SampleData,
        ) -> Result<PointCloudFrame<SensorFrame>, FusionError> {
            if sample_data.channel == self.broken {
                return Err(FusionError::Catalog("file not found".into()));
            }
            Ok(PointCloudFrame::new(
                sample_data.channel.as_str(),
                vec![RadarPoint::new(DVec3::ZERO, DVec2::ZERO)],
            ))
        }
    }

    fn channels(names: &[&str]) -> Vec<RadarChannel> {
        names
            .iter()
            .map(|name| RadarChannel::new(*name, Color::BLUE))
            .collect()
    }

    #[test]
    fn test_fuse_sample() -> Result<(), FusionError> {
        let catalog = MemoryCatalog::new(&["RADAR_FRONT", "RADAR_BACK_LEFT"], "");
        let radars = channels(&["RADAR_BACK_LEFT", "RADAR_FRONT"]);
        let sweep = fuse_sample(&catalog, "s0", &radars, "RADAR_FRONT")?;
        assert_eq!(
            sweep.sensors().collect::<Vec<_>>(),
            vec!["RADAR_BACK_LEFT", "RADAR_FRONT"]
        );
        let position = sweep.get("RADAR_FRONT").map(|e| e.frame.points()[0].position);
        assert_eq!(position, Some(DVec3::X));
        Ok(())
    }

    #[test]
    fn test_fuse_sample_names_failed_sensor() {
        let catalog = MemoryCatalog::new(&["RADAR_FRONT", "RADAR_BACK_LEFT"], "RADAR_BACK_LEFT");
        let radars = channels(&["RADAR_FRONT", "RADAR_BACK_LEFT"]);
        match fuse_sample(&catalog, "s0", &radars, "RADAR_FRONT") {
            Err(FusionError::Sensor { channel, source }) => {
                assert_eq!(channel, "RADAR_BACK_LEFT");
                assert!(matches!(*source, FusionError::Catalog(_)));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_fuse_sample_names_sensor_of_missing_record() {
        let mut catalog = MemoryCatalog::new(&["RADAR_FRONT", "RADAR_FRONT_LEFT"], "");
        catalog.data[1].ego_pose_token = "gone".to_string();
        let radars = channels(&["RADAR_FRONT", "RADAR_FRONT_LEFT"]);

        let err = fuse_sample(&catalog, "s0", &radars, "RADAR_FRONT").err();
        assert!(matches!(
            err,
            Some(FusionError::Sensor { ref channel, ref source })
                if channel == "RADAR_FRONT_LEFT"
                    && matches!(**source, FusionError::UnknownRecord { table: "ego_pose", .. })
        ));
        assert!(err.is_some_and(|e| e.to_string().contains("RADAR_FRONT_LEFT")));

        // a missing reference channel is reported against that channel
        let err = fuse_sample(&catalog, "s0", &radars, "RADAR_BACK_RIGHT").err();
        assert!(matches!(
            err,
            Some(FusionError::Sensor { channel, .. }) if channel == "RADAR_BACK_RIGHT"
        ));
    }

    #[test]
    fn test_color_names() {
        assert_eq!(Color::from_name("Orange"), Some(Color::ORANGE));
        assert_eq!(Color::from_name("mauve"), None);
        assert_eq!(Color::CYAN.to_array(), [0, 255, 255]);
    }
}
