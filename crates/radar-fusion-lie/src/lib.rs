#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]
//!
//! # Radar Fusion Lie Groups
//!
//! This crate provides the rigid body transforms used to move radar measurements between the
//! coordinate frames of a vehicle rig.
//!
//! ## Supported Groups
//!
//! - **SO(3)**: 3D rotation group, stored as a unit quaternion
//! - **SE(3)**: 3D rigid body transformations (rotation + translation)
//!
//! On top of [`se3::SE3`] the [`frames::Isometry3`] type tags each transform with its source and
//! destination frame, so chaining transforms in the wrong order is a compile error.
//!
//! ## Example
//!
//! ```rust
//! use glam::DVec3;
//! use radar_fusion_lie::frames::{Isometry3, SensorFrame, VehicleFrame, WorldFrame};
//! use radar_fusion_lie::se3::SE3;
//! use radar_fusion_lie::so3::SO3;
//!
//! let mount: Isometry3<SensorFrame, VehicleFrame> =
//!     Isometry3::from_se3(SE3::new(SO3::IDENTITY, DVec3::new(1.0, 0.0, 0.0)));
//! let pose: Isometry3<VehicleFrame, WorldFrame> = Isometry3::from_se3(SE3::IDENTITY);
//!
//! let sensor_to_world = pose * mount;
//! let p = sensor_to_world.transform_point(DVec3::ZERO);
//! assert_eq!(p, DVec3::new(1.0, 0.0, 0.0));
//! ```

/// Error types for the rotation constructors.
pub mod error;

/// Coordinate frame markers and frame-tagged rigid transforms.
pub mod frames;

/// Special Euclidean group SE(3) for 3D rigid transformations.
pub mod se3;

/// Special Orthogonal group SO(3) for 3D rotations.
pub mod so3;

pub use error::RotationError;
