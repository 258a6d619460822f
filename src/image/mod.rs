//! Raster containers and the resampling primitives the feature pyramid and
//! the trainer's example warping are built on.

pub mod f32;
pub mod io;
pub mod resample;
pub mod u8;

pub use self::f32::ImageF32;
pub use self::u8::ImageU8;
