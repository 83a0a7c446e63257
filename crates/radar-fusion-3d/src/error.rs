use radar_fusion_lie::RotationError;

/// Error types for the fusion pipeline.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum FusionError {
    /// The position and velocity channels of a point cloud have different lengths.
    #[error("Sensor {sensor}: {positions} positions but {velocities} velocities")]
    ShapeMismatch {
        /// The sensor the point cloud belongs to.
        sensor: String,
        /// Number of positions.
        positions: usize,
        /// Number of velocities.
        velocities: usize,
    },

    /// The auxiliary channels have a different number of rows than the positions.
    #[error("Sensor {sensor}: {positions} positions but {auxiliary} auxiliary rows")]
    AuxiliaryShapeMismatch {
        /// The sensor the point cloud belongs to.
        sensor: String,
        /// Number of positions.
        positions: usize,
        /// Number of auxiliary rows.
        auxiliary: usize,
    },

    /// A rotation record is malformed.
    #[error("Invalid rotation in {component} of {sensor}")]
    InvalidRotation {
        /// The record kind holding the rotation, e.g. `calibrated_sensor`.
        component: &'static str,
        /// The sensor or camera the record belongs to, or the record token when no capture
        /// references it.
        sensor: String,
        /// The underlying failure.
        #[source]
        source: RotationError,
    },

    /// A camera intrinsic matrix is missing or malformed.
    #[error("Invalid intrinsic for camera {camera}: {reason}")]
    InvalidIntrinsic {
        /// The camera identifier.
        camera: String,
        /// What is wrong with the intrinsic.
        reason: String,
    },

    /// No sample with the given token.
    #[error("Unknown sample {0}")]
    UnknownSample(String),

    /// The sample has no capture for the given sensor channel.
    #[error("Sample {sample} has no data for sensor {channel}")]
    UnknownSensor {
        /// The sample token.
        sample: String,
        /// The sensor channel.
        channel: String,
    },

    /// A record referenced by token does not exist.
    #[error("Unknown {table} record {token}")]
    UnknownRecord {
        /// The table name.
        table: &'static str,
        /// The token that was looked up.
        token: String,
    },

    /// A collaborator failed to provide its data.
    #[error("Catalog error")]
    Catalog(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// Loading the records or detections of one sensor failed.
    #[error("Failed to load sensor {channel}")]
    Sensor {
        /// The sensor channel.
        channel: String,
        /// The underlying failure.
        #[source]
        source: Box<FusionError>,
    },
}

impl FusionError {
    /// Attach the sensor channel a failure belongs to.
    pub fn in_sensor(self, channel: &str) -> Self {
        Self::Sensor {
            channel: channel.to_string(),
            source: Box::new(self),
        }
    }
}
