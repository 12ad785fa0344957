//! scopeview-core: Core types for multi-dimensional image display.
//!
//! This crate provides the data model shared by the histogram and lookup
//! table algorithms and the display runtime: dataset coordinates, image
//! buffers, channel colors, and display settings snapshots.
//!

pub mod color;
pub mod coords;
pub mod error;
pub mod image;
pub mod settings;

pub use color::{default_channel_color, Rgb, COLORBLIND_FRIENDLY};
pub use coords::Coords;
pub use error::{Error, Result};
pub use image::{Image, ImageMetadata};
pub use settings::{
    ChannelSettings, ColorMode, ComponentRange, DisplaySettings, HistogramUpdateRate,
    GAMMA_SNAP_BAND,
};
