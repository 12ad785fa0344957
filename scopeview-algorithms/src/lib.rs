//! scopeview-algorithms: Intensity statistics and display mapping.
//!
//! This crate provides the numeric side of image display:
//! - **Histograms** - binned counts, exact and trimmed extrema, mean, deviation
//! - **Contrast** - clamped per-component scaling ranges with gamma
//! - **Lookup tables** - color ramps, palettes, gamma resampling
//! - **Application** - intensity mapping, additive composites, RGB remaps
//!
#![warn(missing_docs)]

pub mod contrast;
pub mod histogram;
pub mod lut;
mod processing;
mod util;

pub use contrast::{snap_gamma, ContrastState};
pub use histogram::{compute_histogram, HistogramConfig, HistogramResult, Roi, DEFAULT_BIN_POWER};
pub use lut::apply::{composite_into, ComponentRemap, IntensityMapper, RgbFrame, RgbPlanes};
pub use lut::{Lut, Palette, LUT_SIZE};
pub use processing::compute_all_components;
