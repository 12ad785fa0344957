//! Per-component intensity histograms and summary statistics.
//!
//! A histogram has `2^bin_power` bins over the image's declared bit depth,
//! so each bin covers `max(1, 2^bit_depth / 2^bin_power)` intensities.
//! Samples above the declared depth (a 12-bit camera writing into 16-bit
//! storage can produce them) are still counted in overflow bins that are
//! sized from the sample width, so no pixel is ever dropped. Only the first
//! `2^bin_power` bins are reported.
//!
//! Besides the exact minimum and maximum, a histogram reports trimmed
//! extrema that ignore a percentage of pixels at each end. Trimmed values
//! are interpolated linearly inside the bin where the cut falls.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use scopeview_core::{Error, Image, Result};

use crate::util::{f64_to_u32_floor, f64_to_u64_floor, u64_to_f64, u32_to_usize};

/// Default number of bins is `2^DEFAULT_BIN_POWER`.
pub const DEFAULT_BIN_POWER: u8 = 8;

/// Rectangular region of interest with an optional per-pixel mask.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Roi {
    /// Left edge in pixels.
    pub x: usize,
    /// Top edge in pixels.
    pub y: usize,
    /// Width in pixels.
    pub width: usize,
    /// Height in pixels.
    pub height: usize,
    /// Row-major mask over the rectangle; `false` excludes a pixel.
    pub mask: Option<Vec<bool>>,
}

impl Roi {
    /// Creates a rectangular region without a mask.
    #[must_use]
    pub fn rect(x: usize, y: usize, width: usize, height: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
            mask: None,
        }
    }

    /// Attaches a mask covering the rectangle.
    #[must_use]
    pub fn with_mask(mut self, mask: Vec<bool>) -> Self {
        self.mask = Some(mask);
        self
    }

    fn validate(&self, image: &Image) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::InvalidRoi(format!(
                "empty rectangle {}x{}",
                self.width, self.height
            )));
        }
        let right = self.x.checked_add(self.width);
        let bottom = self.y.checked_add(self.height);
        let inside = matches!(
            (right, bottom),
            (Some(right), Some(bottom)) if right <= image.width() && bottom <= image.height()
        );
        if !inside {
            return Err(Error::InvalidRoi(format!(
                "rectangle ({}, {}) {}x{} exceeds {}x{} image",
                self.x,
                self.y,
                self.width,
                self.height,
                image.width(),
                image.height()
            )));
        }
        if let Some(mask) = &self.mask {
            let pixels = self.width.checked_mul(self.height);
            if pixels != Some(mask.len()) {
                return Err(Error::InvalidRoi(format!(
                    "mask has {} entries for a {}x{} rectangle",
                    mask.len(),
                    self.width,
                    self.height
                )));
            }
        }
        Ok(())
    }

    #[inline]
    fn includes(&self, dx: usize, dy: usize) -> bool {
        self.mask
            .as_ref()
            .map_or(true, |mask| mask[dy * self.width + dx])
    }
}

/// Configuration for histogram computation.
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HistogramConfig {
    /// Log2 of the number of reported bins.
    pub bin_power: u8,
    /// Percentage of pixels ignored at each end for trimmed extrema.
    pub trim_percent: f64,
    /// Also compute the standard deviation.
    pub compute_std_dev: bool,
    /// Restrict statistics to this region.
    pub roi: Option<Roi>,
}

impl Default for HistogramConfig {
    fn default() -> Self {
        Self {
            bin_power: DEFAULT_BIN_POWER,
            trim_percent: 0.0,
            compute_std_dev: false,
            roi: None,
        }
    }
}

impl HistogramConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the bin power.
    #[must_use]
    pub fn with_bin_power(mut self, bin_power: u8) -> Self {
        self.bin_power = bin_power;
        self
    }

    /// Sets the trim percentage.
    #[must_use]
    pub fn with_trim_percent(mut self, trim_percent: f64) -> Self {
        self.trim_percent = trim_percent;
        self
    }

    /// Enables or disables the standard deviation.
    #[must_use]
    pub fn with_std_dev(mut self, enabled: bool) -> Self {
        self.compute_std_dev = enabled;
        self
    }

    /// Sets the region of interest.
    #[must_use]
    pub fn with_roi(mut self, roi: Option<Roi>) -> Self {
        self.roi = roi;
        self
    }

    fn validate(&self) -> Result<()> {
        if !(1..=16).contains(&self.bin_power) {
            return Err(Error::InvalidBinPower(self.bin_power));
        }
        if !self.trim_percent.is_finite() || !(0.0..50.0).contains(&self.trim_percent) {
            return Err(Error::InvalidTrimPercentage(self.trim_percent));
        }
        Ok(())
    }
}

/// Histogram and statistics of one image component.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct HistogramResult {
    /// Pixel counts per bin.
    pub bins: Vec<u64>,
    /// Number of pixels measured.
    pub pixel_count: u64,
    /// Smallest sample value.
    pub min: u32,
    /// Largest sample value.
    pub max: u32,
    /// Minimum after ignoring the trim percentage of darkest pixels.
    pub min_trimmed: u32,
    /// Maximum after ignoring the trim percentage of brightest pixels.
    pub max_trimmed: u32,
    /// Mean sample value.
    pub mean: f64,
    /// Population standard deviation, when requested.
    pub std_dev: Option<f64>,
    /// Bit depth the bins span.
    pub bit_depth: u8,
    /// Intensities covered by each bin.
    pub bin_size: u32,
}

impl HistogramResult {
    /// Number of reported bins.
    #[must_use]
    pub fn num_bins(&self) -> usize {
        self.bins.len()
    }

    /// Whether every measured pixel is zero.
    ///
    /// A blank image carries no contrast information and must not drive
    /// autostretch.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.pixel_count == 0 || (self.max == 0 && self.bins.first() == Some(&self.pixel_count))
    }

    /// Bins as shown to observers: raw counts, or `1000 * ln(count)` when
    /// `log_scale` is set (empty bins stay zero).
    #[must_use]
    pub fn display_bins(&self, log_scale: bool) -> Vec<u64> {
        if !log_scale {
            return self.bins.clone();
        }
        self.bins
            .iter()
            .map(|&count| {
                if count > 0 {
                    f64_to_u64_floor(1000.0 * u64_to_f64(count).ln())
                } else {
                    0
                }
            })
            .collect()
    }
}

/// Computes the histogram of one component of `image`.
///
/// # Errors
/// Returns an error if the component does not exist, the configuration is
/// out of range, the region of interest does not fit the image, or the
/// region selects no pixels.
pub fn compute_histogram(
    image: &Image,
    component: usize,
    config: &HistogramConfig,
) -> Result<HistogramResult> {
    image.check_component(component)?;
    config.validate()?;
    if let Some(roi) = &config.roi {
        roi.validate(image)?;
    }

    let bit_depth = image.bit_depth();
    let num_bins = 1usize << config.bin_power;
    let bin_size = ((1u32 << bit_depth) >> config.bin_power).max(1);
    let overflow_bins = u32_to_usize((1u32 << image.sample_bits()) / bin_size);
    let mut counts = vec![0u64; num_bins.max(overflow_bins)];

    let mut acc = Accumulator::default();
    let mut visit = |value: u32| {
        counts[u32_to_usize(value / bin_size)] += 1;
        acc.add(value);
    };

    let width = image.width();
    match &config.roi {
        None => {
            for pixel in 0..image.pixel_count() {
                visit(image.sample(pixel, component));
            }
        }
        Some(roi) => {
            for dy in 0..roi.height {
                let row = (roi.y + dy) * width;
                for dx in 0..roi.width {
                    if roi.includes(dx, dy) {
                        visit(image.sample(row + roi.x + dx, component));
                    }
                }
            }
        }
    }

    if acc.count == 0 {
        return Err(Error::NoPixels);
    }

    let (min_trimmed, max_trimmed) = if config.trim_percent > 0.0 {
        let cut = u64_to_f64(acc.count) * config.trim_percent / 100.0;
        let top = (1u32 << bit_depth) - 1;
        let low = trimmed_min(&counts, bin_size, acc.min, acc.max, cut).min(top);
        let high = trimmed_max(&counts, bin_size, acc.min, acc.max, cut).min(top);
        if low > high {
            let mid = low / 2 + high / 2;
            (mid, mid)
        } else {
            (low, high)
        }
    } else {
        (acc.min, acc.max)
    };

    let mean = acc.mean();
    let std_dev = config.compute_std_dev.then(|| acc.std_dev(mean));
    counts.truncate(num_bins);

    Ok(HistogramResult {
        bins: counts,
        pixel_count: acc.count,
        min: acc.min,
        max: acc.max,
        min_trimmed,
        max_trimmed,
        mean,
        std_dev,
        bit_depth,
        bin_size,
    })
}

#[derive(Debug)]
struct Accumulator {
    count: u64,
    min: u32,
    max: u32,
    sum: u64,
    sum_sq: u128,
}

impl Default for Accumulator {
    fn default() -> Self {
        Self {
            count: 0,
            min: u32::MAX,
            max: 0,
            sum: 0,
            sum_sq: 0,
        }
    }
}

impl Accumulator {
    #[inline]
    fn add(&mut self, value: u32) {
        self.count += 1;
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.sum += u64::from(value);
        self.sum_sq += u128::from(value) * u128::from(value);
    }

    fn mean(&self) -> f64 {
        u64_to_f64(self.sum) / u64_to_f64(self.count)
    }

    #[allow(clippy::cast_precision_loss)]
    fn std_dev(&self, mean: f64) -> f64 {
        let mean_sq = self.sum_sq as f64 / u64_to_f64(self.count);
        (mean_sq - mean * mean).max(0.0).sqrt()
    }
}

/// Intensity bounds of bin `index`, narrowed to the observed extrema.
fn bin_bounds(index: usize, bin_size: u32, min: u32, max: u32) -> (f64, f64) {
    let start = u32::try_from(index).unwrap_or(u32::MAX).saturating_mul(bin_size);
    let end = start.saturating_add(bin_size - 1);
    (f64::from(start.max(min)), f64::from(end.min(max)))
}

fn trimmed_min(counts: &[u64], bin_size: u32, min: u32, max: u32, cut: f64) -> u32 {
    let mut remaining = cut;
    for (i, &count) in counts.iter().enumerate() {
        if count == 0 {
            continue;
        }
        let count = u64_to_f64(count);
        if remaining >= count {
            remaining -= count;
            continue;
        }
        let (lo, hi) = bin_bounds(i, bin_size, min, max);
        return f64_to_u32_floor(lo + remaining / count * (hi - lo));
    }
    max
}

fn trimmed_max(counts: &[u64], bin_size: u32, min: u32, max: u32, cut: f64) -> u32 {
    let mut remaining = cut;
    for (i, &count) in counts.iter().enumerate().rev() {
        if count == 0 {
            continue;
        }
        let count = u64_to_f64(count);
        if remaining >= count {
            remaining -= count;
            continue;
        }
        let (lo, hi) = bin_bounds(i, bin_size, min, max);
        return f64_to_u32_floor(hi - remaining / count * (hi - lo));
    }
    min
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use scopeview_core::Coords;

    fn ramp8() -> Image {
        Image::gray8(Coords::new(), 16, 16, (0..=255).collect()).unwrap()
    }

    #[test]
    fn test_bin_size_follows_bit_depth() {
        let image = Image::gray16(Coords::new(), 2, 1, &[0, 4095], 12).unwrap();
        let result = compute_histogram(&image, 0, &HistogramConfig::default()).unwrap();
        assert_eq!(result.num_bins(), 256);
        assert_eq!(result.bin_size, 16);
        assert_eq!(result.bins[0], 1);
        assert_eq!(result.bins[255], 1);
    }

    #[test]
    fn test_samples_above_bit_depth_are_counted() {
        let image = Image::gray16(Coords::new(), 3, 1, &[10, 5000, 65535], 12).unwrap();
        let result = compute_histogram(&image, 0, &HistogramConfig::default()).unwrap();
        assert_eq!(result.pixel_count, 3);
        assert_eq!(result.max, 65535);
        assert_eq!(result.bins.iter().sum::<u64>(), 1);
    }

    #[test]
    fn test_ramp_statistics() {
        let result =
            compute_histogram(&ramp8(), 0, &HistogramConfig::new().with_std_dev(true)).unwrap();
        assert_eq!(result.min, 0);
        assert_eq!(result.max, 255);
        assert!(result.bins.iter().all(|&c| c == 1));
        assert_relative_eq!(result.mean, 127.5);
        // Population standard deviation of 0..=255.
        assert_relative_eq!(result.std_dev.unwrap(), 73.900_270_635_42, epsilon = 1e-6);
    }

    #[test]
    fn test_trim_ignores_tails() {
        let config = HistogramConfig::new().with_trim_percent(10.0);
        let result = compute_histogram(&ramp8(), 0, &config).unwrap();
        // 25.6 pixels are cut at each end.
        assert_eq!(result.min_trimmed, 25);
        assert_eq!(result.max_trimmed, 230);
    }

    #[test]
    fn test_roi_and_mask() {
        let roi = Roi::rect(0, 1, 2, 1);
        let config = HistogramConfig::new().with_roi(Some(roi.clone()));
        let result = compute_histogram(&ramp8(), 0, &config).unwrap();
        assert_eq!(result.pixel_count, 2);
        assert_eq!((result.min, result.max), (16, 17));

        let masked = HistogramConfig::new().with_roi(Some(roi.with_mask(vec![false, true])));
        let result = compute_histogram(&ramp8(), 0, &masked).unwrap();
        assert_eq!((result.min, result.max), (17, 17));

        let empty = HistogramConfig::new().with_roi(Some(Roi::rect(0, 0, 1, 1).with_mask(vec![false])));
        assert_eq!(compute_histogram(&ramp8(), 0, &empty), Err(Error::NoPixels));
    }

    #[test]
    fn test_invalid_arguments() {
        let image = ramp8();
        assert!(matches!(
            compute_histogram(&image, 1, &HistogramConfig::default()),
            Err(Error::ComponentOutOfRange { .. })
        ));
        assert!(matches!(
            compute_histogram(&image, 0, &HistogramConfig::new().with_trim_percent(50.0)),
            Err(Error::InvalidTrimPercentage(_))
        ));
        assert!(matches!(
            compute_histogram(&image, 0, &HistogramConfig::new().with_bin_power(0)),
            Err(Error::InvalidBinPower(0))
        ));
        assert!(matches!(
            compute_histogram(
                &image,
                0,
                &HistogramConfig::new().with_roi(Some(Roi::rect(10, 10, 8, 8)))
            ),
            Err(Error::InvalidRoi(_))
        ));
    }

    #[test]
    fn test_roi_near_usize_max_is_rejected() {
        let image = ramp8();
        for roi in [
            Roi::rect(usize::MAX, 0, 1, 1),
            Roi::rect(0, usize::MAX, 1, 1),
            Roi::rect(1, 0, usize::MAX, 1),
            Roi::rect(0, 0, 1, 1).with_mask(vec![true; 2]),
        ] {
            let config = HistogramConfig::new().with_roi(Some(roi));
            assert!(matches!(
                compute_histogram(&image, 0, &config),
                Err(Error::InvalidRoi(_))
            ));
        }
    }

    #[test]
    fn test_blank_and_log_bins() {
        let image = Image::gray8(Coords::new(), 2, 2, vec![0; 4]).unwrap();
        let result = compute_histogram(&image, 0, &HistogramConfig::default()).unwrap();
        assert!(result.is_blank());
        assert_eq!(result.display_bins(true)[0], 1386);
        assert!(!compute_histogram(&ramp8(), 0, &HistogramConfig::default())
            .unwrap()
            .is_blank());
    }
}
