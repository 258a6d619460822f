//! HOG feature maps.
//!
//! Every cell carries [`FEATURE_CHANNELS`] values laid out as
//!
//! | channels  | content                                           |
//! |-----------|---------------------------------------------------|
//! | `0..4`    | texture energy under the four 2×2 normalisation blocks |
//! | `4..13`   | 9 contrast-insensitive orientation bins           |
//! | `13..31`  | 18 contrast-sensitive orientation bins            |
//!
//! Filters (root and part weights) use the same layout, so a score is a plain
//! dot product between a filter and a window of a map. [`SYM_LUT`] gives the
//! channel each channel maps to under a left-right mirror.

pub mod hog;
pub mod map;
pub mod symmetry;

pub use hog::hog;
pub use map::FeatureMap;
pub use symmetry::{is_symmetric, worst_asymmetry, Asymmetry, SYM_LUT};

/// Channels per HOG cell.
pub const FEATURE_CHANNELS: usize = 31;
