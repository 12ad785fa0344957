//! Display settings shared between the settings store and the draw pipeline.
//!
//! [`DisplaySettings`] is an immutable snapshot: edits produce a new value
//! via the `with_*` builders, and the store assigns it a fresh version.

use std::fmt;
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::color::{default_channel_color, Rgb};

/// Gamma values in this band are treated as exactly linear.
pub const GAMMA_SNAP_BAND: (f64, f64) = (0.9, 1.1);

/// How channels are turned into display colors.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ColorMode {
    /// Current channel drawn as a white ramp.
    #[default]
    Grayscale,
    /// Current channel drawn as a ramp of its channel color.
    Color,
    /// All visible channels blended additively.
    Composite,
    /// Grayscale with the two ends of the range flagged in color.
    HighlightLimits,
    /// Black through red and yellow to white.
    Fire,
    /// Black through red to yellow.
    RedHot,
    /// Hue sweep.
    Spectrum,
    /// User-supplied 256-entry table from the settings.
    Custom,
}

impl ColorMode {
    /// Whether every channel is drawn, rather than only the current one.
    #[must_use]
    pub fn is_composite(self) -> bool {
        self == Self::Composite
    }
}

impl fmt::Display for ColorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Grayscale => "Grayscale",
            Self::Color => "Color",
            Self::Composite => "Composite",
            Self::HighlightLimits => "Highlight Limits",
            Self::Fire => "Fire",
            Self::RedHot => "Red Hot",
            Self::Spectrum => "Spectrum",
            Self::Custom => "Custom",
        };
        write!(f, "{name}")
    }
}

/// How often histograms are recomputed while images stream in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum HistogramUpdateRate {
    /// Every drawn image.
    #[default]
    Always,
    /// At most once per period; the latest image wins.
    Every(Duration),
    /// Only on explicit request.
    Manual,
}

impl HistogramUpdateRate {
    /// Interprets a seconds value: zero means always, negative means never,
    /// positive is the minimum interval.
    #[must_use]
    pub fn from_seconds(seconds: f64) -> Self {
        if seconds < 0.0 {
            Self::Manual
        } else if seconds > 0.0 && seconds.is_finite() {
            Self::Every(Duration::from_secs_f64(seconds))
        } else {
            Self::Always
        }
    }

    /// Inverse of [`HistogramUpdateRate::from_seconds`].
    #[must_use]
    pub fn as_seconds(self) -> f64 {
        match self {
            Self::Always => 0.0,
            Self::Every(period) => period.as_secs_f64(),
            Self::Manual => -1.0,
        }
    }
}

/// Scaling range of one component, in raw intensity units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ComponentRange {
    pub min: u32,
    pub max: u32,
}

impl ComponentRange {
    #[inline]
    #[must_use]
    pub fn new(min: u32, max: u32) -> Self {
        Self { min, max }
    }

    /// Range spanning `0..=max_intensity`.
    #[inline]
    #[must_use]
    pub fn full(max_intensity: u32) -> Self {
        Self::new(0, max_intensity)
    }
}

/// Per-channel display record.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChannelSettings {
    /// Channel name, also the key for remembered settings.
    pub name: String,
    /// Tint used by color and composite modes.
    pub color: Rgb,
    /// Display gamma.
    pub gamma: f64,
    /// Whether the channel contributes to composites.
    pub visible: bool,
    /// Per-component scaling; empty until the first image is seen.
    pub ranges: Vec<ComponentRange>,
}

impl ChannelSettings {
    /// Defaults for a channel seen for the first time.
    #[must_use]
    pub fn default_for(index: usize) -> Self {
        Self {
            name: format!("Channel {index}"),
            color: default_channel_color(index),
            gamma: 1.0,
            visible: true,
            ranges: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    #[must_use]
    pub fn with_color(mut self, color: Rgb) -> Self {
        self.color = color;
        self
    }

    #[must_use]
    pub fn with_ranges(mut self, ranges: Vec<ComponentRange>) -> Self {
        self.ranges = ranges;
        self
    }
}

/// Snapshot of everything that affects how images are displayed.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DisplaySettings {
    /// Assigned by the settings store; increases on every install.
    pub version: u64,
    pub color_mode: ColorMode,
    /// Recompute scaling from each new histogram.
    pub autostretch: bool,
    /// Restrict statistics to the region of interest when one is set.
    pub roi_autoscale: bool,
    /// Percentage of pixels ignored at each end when autostretching.
    pub extrema_percentage: f64,
    pub histogram_update_rate: HistogramUpdateRate,
    /// Report log-scaled histogram bins to observers.
    pub log_histogram: bool,
    /// Table used by [`ColorMode::Custom`].
    pub custom_lut: Option<Vec<Rgb>>,
    pub channels: Vec<ChannelSettings>,
}

impl Default for DisplaySettings {
    fn default() -> Self {
        Self {
            version: 0,
            color_mode: ColorMode::Grayscale,
            autostretch: true,
            roi_autoscale: true,
            extrema_percentage: 0.0,
            histogram_update_rate: HistogramUpdateRate::Always,
            log_histogram: false,
            custom_lut: None,
            channels: Vec::new(),
        }
    }
}

impl DisplaySettings {
    /// Creates settings with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_color_mode(mut self, mode: ColorMode) -> Self {
        self.color_mode = mode;
        self
    }

    #[must_use]
    pub fn with_autostretch(mut self, enabled: bool) -> Self {
        self.autostretch = enabled;
        self
    }

    #[must_use]
    pub fn with_roi_autoscale(mut self, enabled: bool) -> Self {
        self.roi_autoscale = enabled;
        self
    }

    /// Sets the trim percentage, clamped to `[0, 50)`.
    #[must_use]
    pub fn with_extrema_percentage(mut self, percentage: f64) -> Self {
        self.extrema_percentage = if percentage.is_finite() {
            percentage.clamp(0.0, 49.99)
        } else {
            0.0
        };
        self
    }

    #[must_use]
    pub fn with_histogram_update_rate(mut self, rate: HistogramUpdateRate) -> Self {
        self.histogram_update_rate = rate;
        self
    }

    #[must_use]
    pub fn with_log_histogram(mut self, enabled: bool) -> Self {
        self.log_histogram = enabled;
        self
    }

    #[must_use]
    pub fn with_custom_lut(mut self, lut: Option<Vec<Rgb>>) -> Self {
        self.custom_lut = lut;
        self
    }

    #[must_use]
    pub fn with_version(mut self, version: u64) -> Self {
        self.version = version;
        self
    }

    /// Channel record, if one exists.
    #[must_use]
    pub fn channel(&self, index: usize) -> Option<&ChannelSettings> {
        self.channels.get(index)
    }

    /// Channel record, or the defaults for a channel not yet recorded.
    #[must_use]
    pub fn channel_or_default(&self, index: usize) -> ChannelSettings {
        self.channel(index)
            .cloned()
            .unwrap_or_else(|| ChannelSettings::default_for(index))
    }

    /// Returns settings with channel `index` edited by `edit`, filling any
    /// missing lower channels with defaults.
    #[must_use]
    pub fn with_channel(mut self, index: usize, edit: impl FnOnce(&mut ChannelSettings)) -> Self {
        while self.channels.len() <= index {
            let next = self.channels.len();
            self.channels.push(ChannelSettings::default_for(next));
        }
        edit(&mut self.channels[index]);
        self
    }

    /// Whether two snapshots differ in a way that invalidates histograms.
    #[must_use]
    pub fn statistics_differ(&self, other: &Self) -> bool {
        self.autostretch != other.autostretch
            || self.roi_autoscale != other.roi_autoscale
            || (self.extrema_percentage - other.extrema_percentage).abs() > f64::EPSILON
    }
}
