//! 256-entry color lookup tables.
//!
//! A [`Lut`] maps a display index (0..=255) to an RGB color. Tables are
//! built from a channel color ramp or a palette, then resampled for gamma.
//! [`apply`] turns raw intensities into display indices and blends the
//! results into an RGB frame.

pub mod apply;
mod palette;

pub use palette::Palette;

use scopeview_core::{ChannelSettings, ColorMode, Error, Result, Rgb};

use crate::util::{f64_to_u8, usize_to_f64};

/// Number of entries in every lookup table.
pub const LUT_SIZE: usize = 256;

/// Entry color marking intensities at or below the range minimum.
pub const LOW_LIMIT_COLOR: Rgb = Rgb::BLUE;
/// Entry color marking intensities at or above the range maximum.
pub const HIGH_LIMIT_COLOR: Rgb = Rgb::RED;

/// Color lookup table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lut {
    entries: [[u8; 3]; LUT_SIZE],
}

impl Lut {
    /// Linear ramp from black to `color`.
    #[must_use]
    pub fn ramp(color: Rgb) -> Self {
        let mut entries = [[0u8; 3]; LUT_SIZE];
        for (level, entry) in (0..=u8::MAX).zip(entries.iter_mut()) {
            *entry = color.scaled(level);
        }
        Self { entries }
    }

    /// Black to white ramp.
    #[must_use]
    pub fn grayscale() -> Self {
        Self::ramp(Rgb::WHITE)
    }

    /// Piecewise-linear interpolation between evenly spaced control points.
    ///
    /// A single point yields a constant table; no points yields black.
    #[must_use]
    pub fn from_control_points(points: &[[u8; 3]]) -> Self {
        let mut entries = [[0u8; 3]; LUT_SIZE];
        match points.len() {
            0 => {}
            1 => entries.fill(points[0]),
            n => {
                let last = usize_to_f64(n - 1);
                for (i, entry) in entries.iter_mut().enumerate() {
                    let lo = (i * (n - 1)) / (LUT_SIZE - 1);
                    let frac = usize_to_f64(i) * last / 255.0 - usize_to_f64(lo);
                    let hi = (lo + 1).min(n - 1);
                    for c in 0..3 {
                        let a = f64::from(points[lo][c]);
                        let b = f64::from(points[hi][c]);
                        entry[c] = f64_to_u8(a + (b - a) * frac);
                    }
                }
            }
        }
        Self { entries }
    }

    /// Built-in palette.
    #[must_use]
    pub fn palette(palette: Palette) -> Self {
        Self::from_control_points(palette.control_points())
    }

    /// User-supplied table.
    ///
    /// # Errors
    /// Returns [`Error::LutLength`] unless exactly [`LUT_SIZE`] colors are given.
    pub fn from_colors(colors: &[Rgb]) -> Result<Self> {
        if colors.len() != LUT_SIZE {
            return Err(Error::LutLength {
                expected: LUT_SIZE,
                actual: colors.len(),
            });
        }
        let mut entries = [[0u8; 3]; LUT_SIZE];
        for (entry, color) in entries.iter_mut().zip(colors) {
            *entry = color.to_array();
        }
        Ok(Self { entries })
    }

    /// Grayscale ramp, resampled for `gamma`, with the end entries marking
    /// out-of-range intensities.
    #[must_use]
    pub fn highlight_limits(gamma: f64) -> Self {
        let mut lut = Self::grayscale().with_gamma(gamma);
        lut.entries[0] = LOW_LIMIT_COLOR.to_array();
        lut.entries[LUT_SIZE - 1] = HIGH_LIMIT_COLOR.to_array();
        lut
    }

    /// Resamples the table so entry `i` takes the color at
    /// `round((i / 255)^gamma * 255)`.
    ///
    /// Gamma 1.0 and invalid gammas return the table unchanged.
    #[must_use]
    pub fn with_gamma(&self, gamma: f64) -> Self {
        if !gamma.is_finite() || gamma <= 0.0 || (gamma - 1.0).abs() < f64::EPSILON {
            return self.clone();
        }
        let mut entries = [[0u8; 3]; LUT_SIZE];
        for (i, entry) in entries.iter_mut().enumerate() {
            let source = (usize_to_f64(i) / 255.0).powf(gamma) * 255.0;
            *entry = self.entries[usize::from(f64_to_u8(source))];
        }
        Self { entries }
    }

    /// Table for drawing `channel` under `mode`.
    ///
    /// Ramps and palettes honor the channel gamma. A custom table is used
    /// as given; without one, custom mode falls back to grayscale.
    #[must_use]
    pub fn for_channel(mode: ColorMode, channel: &ChannelSettings, custom: Option<&[Rgb]>) -> Self {
        let gamma = channel.gamma;
        match mode {
            ColorMode::Grayscale => Self::grayscale().with_gamma(gamma),
            ColorMode::Color | ColorMode::Composite => Self::ramp(channel.color).with_gamma(gamma),
            ColorMode::HighlightLimits => Self::highlight_limits(gamma),
            ColorMode::Fire => Self::palette(Palette::Fire).with_gamma(gamma),
            ColorMode::RedHot => Self::palette(Palette::RedHot).with_gamma(gamma),
            ColorMode::Spectrum => Self::palette(Palette::Spectrum).with_gamma(gamma),
            ColorMode::Custom => custom
                .and_then(|colors| Self::from_colors(colors).ok())
                .unwrap_or_else(|| Self::grayscale().with_gamma(gamma)),
        }
    }

    /// Color at display index `index`.
    #[inline]
    #[must_use]
    pub fn entry(&self, index: u8) -> [u8; 3] {
        self.entries[usize::from(index)]
    }

    /// All entries.
    #[must_use]
    pub fn entries(&self) -> &[[u8; 3]; LUT_SIZE] {
        &self.entries
    }
}

impl Default for Lut {
    fn default() -> Self {
        Self::grayscale()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ramp_endpoints() {
        let lut = Lut::ramp(Rgb::new(0, 114, 178));
        assert_eq!(lut.entry(0), [0, 0, 0]);
        assert_eq!(lut.entry(255), [0, 114, 178]);
        assert_eq!(Lut::grayscale().entry(100), [100, 100, 100]);
    }

    #[test]
    fn test_gamma_resampling() {
        let gray = Lut::grayscale();
        assert_eq!(gray.with_gamma(1.0), gray);
        let dark = gray.with_gamma(2.0);
        // (128 / 255)^2 * 255 = 64.25
        assert_eq!(dark.entry(128), [64, 64, 64]);
        assert_eq!(dark.entry(0), [0, 0, 0]);
        assert_eq!(dark.entry(255), [255, 255, 255]);
        let bright = gray.with_gamma(0.5);
        assert!(bright.entry(64)[0] > 64);
    }

    #[test]
    fn test_control_point_interpolation() {
        let lut = Lut::from_control_points(&[[0, 0, 0], [255, 255, 255]]);
        assert_eq!(lut, Lut::grayscale());

        let fire = Lut::palette(Palette::Fire);
        assert_eq!(fire.entry(0), [0, 0, 0]);
        assert_eq!(fire.entry(255), [255, 255, 255]);

        let spectrum = Lut::palette(Palette::Spectrum);
        assert_eq!(spectrum.entry(0), [255, 0, 0]);
        assert_eq!(spectrum.entry(255), [255, 0, 0]);
    }

    #[test]
    fn test_highlight_limits() {
        let lut = Lut::highlight_limits(1.0);
        assert_eq!(lut.entry(0), [0, 0, 255]);
        assert_eq!(lut.entry(255), [255, 0, 0]);
        assert_eq!(lut.entry(1), [1, 1, 1]);
    }

    #[test]
    fn test_custom_table_ignores_gamma() {
        let colors = vec![Rgb::new(9, 8, 7); LUT_SIZE];
        let mut channel = ChannelSettings::default_for(0);
        channel.gamma = 3.0;
        let lut = Lut::for_channel(ColorMode::Custom, &channel, Some(&colors));
        assert_eq!(lut.entry(200), [9, 8, 7]);

        let fallback = Lut::for_channel(ColorMode::Custom, &channel, None);
        assert_eq!(fallback, Lut::grayscale().with_gamma(3.0));

        assert!(matches!(
            Lut::from_colors(&colors[..10]),
            Err(Error::LutLength { actual: 10, .. })
        ));
    }

    #[test]
    fn test_channel_color_modes() {
        let channel = ChannelSettings::default_for(3);
        let color = Lut::for_channel(ColorMode::Color, &channel, None);
        assert_eq!(color.entry(255), [255, 0, 0]);
        let gray = Lut::for_channel(ColorMode::Grayscale, &channel, None);
        assert_eq!(gray.entry(255), [255, 255, 255]);
    }
}
