//! Error types for scopeview-core.

use thiserror::Error;

/// Result type alias for scopeview operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types for scopeview operations.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// Image width or height is zero.
    #[error("invalid image geometry: {width}x{height}")]
    InvalidGeometry { width: usize, height: usize },

    /// Bytes per pixel and component count do not describe 8- or 16-bit samples.
    #[error(
        "unsupported sample layout: {bytes_per_pixel} bytes per pixel for {num_components} components"
    )]
    UnsupportedSampleLayout {
        bytes_per_pixel: usize,
        num_components: usize,
    },

    /// Pixel buffer does not match the declared geometry.
    #[error("pixel buffer length mismatch: expected {expected} bytes, found {actual}")]
    BufferLength { expected: usize, actual: usize },

    /// Declared bit depth is zero or wider than the sample size.
    #[error("invalid bit depth {bit_depth} for {sample_bits}-bit samples")]
    InvalidBitDepth { bit_depth: u8, sample_bits: u8 },

    /// Component index past the image's component count.
    #[error("component {component} out of range for image with {num_components} components")]
    ComponentOutOfRange {
        component: usize,
        num_components: usize,
    },

    /// Histogram bin power outside `1..=16`.
    #[error("invalid histogram bin power: {0}")]
    InvalidBinPower(u8),

    /// Trim percentage outside `[0, 50)`.
    #[error("trim percentage must be in [0, 50), got {0}")]
    InvalidTrimPercentage(f64),

    /// Region of interest does not fit the image, or its mask has the wrong size.
    #[error("invalid region of interest: {0}")]
    InvalidRoi(String),

    /// No pixel contributed to the statistics.
    #[error("no pixels in the measured region")]
    NoPixels,

    /// Lookup table with the wrong number of entries.
    #[error("lookup table must have {expected} entries, found {actual}")]
    LutLength { expected: usize, actual: usize },

    /// Color string that is not `#rrggbb`.
    #[error("invalid color '{0}', expected #rrggbb")]
    InvalidColor(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}
