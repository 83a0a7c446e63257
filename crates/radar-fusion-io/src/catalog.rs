use std::collections::HashMap;
use std::path::{Path, PathBuf};

use glam::DMat3;
use serde::{de::DeserializeOwned, Deserialize};

use radar_fusion_3d::{
    camera::ImageSize,
    catalog::{Catalog, SampleData},
    pointcloud::PointCloudFrame,
    pose::{CalibratedSensor, EgoPose},
    FusionError, SensorFrame,
};

use crate::pcd::{read_radar_pcd, PcdError, RadarPcdOptions};

/// Error types for loading a catalog.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CatalogError {
    /// Failed to read a table file
    #[error("Failed to read {path}")]
    Io {
        /// The table file.
        path: PathBuf,
        /// The underlying failure.
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse a table file
    #[error("Failed to parse {path}")]
    Json {
        /// The table file.
        path: PathBuf,
        /// The underlying failure.
        #[source]
        source: serde_json::Error,
    },

    /// A record references a token that does not exist
    #[error("{table} record {token} references missing {target} {missing}")]
    DanglingReference {
        /// The table holding the reference.
        table: &'static str,
        /// The referencing record.
        token: String,
        /// The referenced table.
        target: &'static str,
        /// The missing token.
        missing: String,
    },

    /// A record holds invalid values
    #[error("Invalid record")]
    InvalidRecord(#[from] FusionError),

    /// Failed to decode the radar file of a capture
    #[error("Failed to read radar file {path} of {channel}")]
    RadarFile {
        /// The sensor channel of the capture.
        channel: String,
        /// The radar file.
        path: PathBuf,
        /// The underlying failure.
        #[source]
        source: PcdError,
    },
}

#[derive(Debug, Deserialize)]
struct SampleRecord {
    token: String,
    timestamp: i64,
}

#[derive(Debug, Deserialize)]
struct SampleDataRecord {
    token: String,
    sample_token: String,
    ego_pose_token: String,
    calibrated_sensor_token: String,
    filename: String,
    timestamp: i64,
    is_key_frame: bool,
    #[serde(default)]
    width: usize,
    #[serde(default)]
    height: usize,
}

#[derive(Debug, Deserialize)]
struct CalibratedSensorRecord {
    token: String,
    sensor_token: String,
    translation: [f64; 3],
    rotation: [f64; 4],
    #[serde(default)]
    camera_intrinsic: Vec<[f64; 3]>,
}

#[derive(Debug, Deserialize)]
struct SensorRecord {
    token: String,
    channel: String,
}

#[derive(Debug, Deserialize)]
struct EgoPoseRecord {
    token: String,
    translation: [f64; 3],
    rotation: [f64; 4],
    timestamp: i64,
}

fn read_table<T: DeserializeOwned>(dir: &Path, name: &str) -> Result<Vec<T>, CatalogError> {
    let path = dir.join(format!("{name}.json"));
    let text = std::fs::read_to_string(&path).map_err(|source| CatalogError::Io {
        path: path.clone(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| CatalogError::Json { path, source })
}

/// A nuScenes style dataset catalog held in memory.
///
/// Tables are read from `<dataroot>/<version>/*.json`; raw files are resolved against
/// `<dataroot>`. Only key frame captures are indexed by sample and channel.
#[derive(Debug)]
pub struct NuScenesCatalog {
    dataroot: PathBuf,
    samples: Vec<(String, i64)>,
    sample_data: HashMap<(String, String), SampleData>,
    calibrated_sensors: HashMap<String, CalibratedSensor>,
    ego_poses: HashMap<String, EgoPose>,
    pcd_options: RadarPcdOptions,
}

impl NuScenesCatalog {
    /// Load the catalog of a dataset version.
    ///
    /// # Arguments
    ///
    /// * `dataroot` - The dataset root directory.
    /// * `version` - The version subdirectory holding the tables, e.g. `v1.0-mini`.
    pub fn load(dataroot: impl AsRef<Path>, version: &str) -> Result<Self, CatalogError> {
        let dataroot = dataroot.as_ref().to_path_buf();
        let tables = dataroot.join(version);

        let samples: Vec<SampleRecord> = read_table(&tables, "sample")?;
        let sample_data: Vec<SampleDataRecord> = read_table(&tables, "sample_data")?;
        let calibrated_sensors: Vec<CalibratedSensorRecord> =
            read_table(&tables, "calibrated_sensor")?;
        let sensors: Vec<SensorRecord> = read_table(&tables, "sensor")?;
        let ego_poses: Vec<EgoPoseRecord> = read_table(&tables, "ego_pose")?;

        let channels: HashMap<String, String> = sensors
            .into_iter()
            .map(|s| (s.token, s.channel))
            .collect();

        // calibration token -> channel, used to name captures and errors
        let mut calibration_channels = HashMap::with_capacity(calibrated_sensors.len());
        let mut calibrations = HashMap::with_capacity(calibrated_sensors.len());
        for record in calibrated_sensors {
            let channel = channels.get(&record.sensor_token).ok_or_else(|| {
                CatalogError::DanglingReference {
                    table: "calibrated_sensor",
                    token: record.token.clone(),
                    target: "sensor",
                    missing: record.sensor_token.clone(),
                }
            })?;

            let mut calibration =
                CalibratedSensor::from_raw(channel, record.rotation, record.translation)?;
            if let Ok(rows) = <[[f64; 3]; 3]>::try_from(record.camera_intrinsic.as_slice()) {
                // tables store the intrinsic row major
                calibration =
                    calibration.with_camera_intrinsic(DMat3::from_cols_array_2d(&rows).transpose());
            }
            calibration_channels.insert(record.token.clone(), channel.clone());
            calibrations.insert(record.token, calibration);
        }

        // ego pose token -> channel of the capture taken at that pose
        let pose_channels: HashMap<&str, &str> = sample_data
            .iter()
            .filter_map(|r| {
                calibration_channels
                    .get(&r.calibrated_sensor_token)
                    .map(|channel| (r.ego_pose_token.as_str(), channel.as_str()))
            })
            .collect();

        let mut poses = HashMap::with_capacity(ego_poses.len());
        for record in ego_poses {
            let owner = pose_channels
                .get(record.token.as_str())
                .copied()
                .unwrap_or(record.token.as_str());
            let pose =
                EgoPose::from_raw(owner, record.rotation, record.translation, record.timestamp)?;
            poses.insert(record.token, pose);
        }

        let mut index = HashMap::new();
        for record in sample_data.into_iter().filter(|r| r.is_key_frame) {
            let channel = calibration_channels
                .get(&record.calibrated_sensor_token)
                .ok_or_else(|| CatalogError::DanglingReference {
                    table: "sample_data",
                    token: record.token.clone(),
                    target: "calibrated_sensor",
                    missing: record.calibrated_sensor_token.clone(),
                })?
                .clone();

            let image_size = (record.width > 0 && record.height > 0).then_some(ImageSize {
                width: record.width,
                height: record.height,
            });

            let data = SampleData {
                token: record.token,
                sample_token: record.sample_token,
                channel: channel.clone(),
                calibrated_sensor_token: record.calibrated_sensor_token,
                ego_pose_token: record.ego_pose_token,
                filename: record.filename,
                timestamp: record.timestamp,
                image_size,
            };
            index.insert((data.sample_token.clone(), channel), data);
        }

        log::info!(
            "loaded {} samples, {} key frame captures, {} calibrations, {} ego poses from {}",
            samples.len(),
            index.len(),
            calibrations.len(),
            poses.len(),
            tables.display()
        );

        Ok(Self {
            dataroot,
            samples: samples.into_iter().map(|s| (s.token, s.timestamp)).collect(),
            sample_data: index,
            calibrated_sensors: calibrations,
            ego_poses: poses,
            pcd_options: RadarPcdOptions::default(),
        })
    }

    /// Use different options when decoding radar files.
    pub fn with_pcd_options(mut self, options: RadarPcdOptions) -> Self {
        self.pcd_options = options;
        self
    }

    /// The dataset root directory.
    pub fn dataroot(&self) -> &Path {
        &self.dataroot
    }

    /// The sample tokens in table order.
    pub fn samples(&self) -> impl Iterator<Item = &str> + '_ {
        self.samples.iter().map(|(token, _)| token.as_str())
    }

    /// The sample tokens ordered by timestamp. Ties keep table order.
    pub fn samples_by_timestamp(&self) -> Vec<&str> {
        let mut samples: Vec<&(String, i64)> = self.samples.iter().collect();
        samples.sort_by_key(|(_, timestamp)| *timestamp);
        samples.into_iter().map(|(token, _)| token.as_str()).collect()
    }

    /// The sample token at `index` in table order.
    pub fn sample(&self, index: usize) -> Result<&str, FusionError> {
        self.samples
            .get(index)
            .map(|(token, _)| token.as_str())
            .ok_or_else(|| FusionError::UnknownSample(format!("#{index}")))
    }

    /// Number of samples.
    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }
}

impl Catalog for NuScenesCatalog {
    fn sample_data(&self, sample_token: &str, channel: &str) -> Result<&SampleData, FusionError> {
        self.sample_data
            .get(&(sample_token.to_string(), channel.to_string()))
            .ok_or_else(|| FusionError::UnknownSensor {
                sample: sample_token.to_string(),
                channel: channel.to_string(),
            })
    }

    fn calibrated_sensor(&self, token: &str) -> Result<&CalibratedSensor, FusionError> {
        self.calibrated_sensors
            .get(token)
            .ok_or_else(|| FusionError::UnknownRecord {
                table: "calibrated_sensor",
                token: token.to_string(),
            })
    }

    fn ego_pose(&self, token: &str) -> Result<&EgoPose, FusionError> {
        self.ego_poses
            .get(token)
            .ok_or_else(|| FusionError::UnknownRecord {
                table: "ego_pose",
                token: token.to_string(),
            })
    }

    fn radar_points(
        &self,
        sample_data: &SampleData,
    ) -> Result<PointCloudFrame<SensorFrame>, FusionError> {
        let path = self.dataroot.join(&sample_data.filename);
        read_radar_pcd(&path, &sample_data.channel, &self.pcd_options).map_err(|source| {
            FusionError::Catalog(Box::new(CatalogError::RadarFile {
                channel: sample_data.channel.clone(),
                path,
                source,
            }))
        })
    }
}
