#![doc = env!("CARGO_PKG_DESCRIPTION")]

#[doc(inline)]
pub use radar_fusion_lie as lie;

#[doc(inline)]
pub use radar_fusion_3d as f3d;

#[doc(inline)]
pub use radar_fusion_io as io;
