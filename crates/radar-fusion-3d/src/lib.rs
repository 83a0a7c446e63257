#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// Pinhole camera models and camera views.
pub mod camera;

/// Read-only access to calibration, pose and point cloud records.
pub mod catalog;

/// Fusion configuration.
pub mod config;

/// Sensor to reference frame conversion of radar point clouds.
pub mod convert;

/// Error types for the fusion pipeline.
pub mod error;

/// Multi-sensor aggregation.
pub mod fusion;

/// Radar point cloud types.
pub mod pointcloud;

/// Sensor calibration and vehicle pose records.
pub mod pose;

/// Projection of fused points onto camera images.
pub mod projection;

pub use error::FusionError;
pub use radar_fusion_lie::frames::{
    CameraFrame, Frame, Isometry3, ReferenceFrame, SensorFrame, VehicleFrame, WorldFrame,
};
