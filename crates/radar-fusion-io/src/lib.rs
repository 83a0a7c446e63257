#![deny(missing_docs)]
#![doc = env!("CARGO_PKG_DESCRIPTION")]

/// nuScenes style JSON catalog.
pub mod catalog;

/// Radar PCD reader module.
pub mod pcd;
