//! Per-channel contrast state: scaling range, gamma and visibility.
//!
//! Every mutator clamps its input so that, for each component,
//! `0 <= min < max <= max_intensity` holds afterwards. Mutators report
//! whether anything changed and set a dirty flag; [`ContrastState::take_dirty`]
//! lets the caller publish one notification for a batch of edits.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use scopeview_core::{ChannelSettings, ComponentRange, GAMMA_SNAP_BAND};

use crate::histogram::HistogramResult;

/// Contrast settings for one channel.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContrastState {
    ranges: Vec<ComponentRange>,
    gamma: f64,
    visible: bool,
    max_intensity: u32,
    needs_stretch: bool,
    dirty: bool,
}

impl ContrastState {
    /// Full-scale state for a channel that has no remembered scaling yet.
    ///
    /// The state reports [`ContrastState::needs_initial_stretch`] until a
    /// histogram has been applied or a range has been set.
    #[must_use]
    pub fn new(num_components: usize, bit_depth: u8) -> Self {
        let max_intensity = max_intensity(bit_depth);
        Self {
            ranges: vec![ComponentRange::full(max_intensity); num_components.max(1)],
            gamma: 1.0,
            visible: true,
            max_intensity,
            needs_stretch: true,
            dirty: false,
        }
    }

    /// State seeded from a stored channel record.
    ///
    /// Stored ranges are used only when they cover every component; they
    /// are re-clamped to the current bit depth.
    #[must_use]
    pub fn from_channel_settings(
        settings: &ChannelSettings,
        num_components: usize,
        bit_depth: u8,
    ) -> Self {
        let mut state = Self::new(num_components, bit_depth);
        state.gamma = snap_gamma(settings.gamma).unwrap_or(1.0);
        state.visible = settings.visible;
        if settings.ranges.len() == state.ranges.len() {
            for (slot, stored) in state.ranges.iter_mut().zip(&settings.ranges) {
                *slot = clamp_range(
                    i64::from(stored.min),
                    i64::from(stored.max),
                    state.max_intensity,
                );
            }
            state.needs_stretch = false;
        }
        state
    }

    /// Number of components.
    #[must_use]
    pub fn num_components(&self) -> usize {
        self.ranges.len()
    }

    /// Scaling range of `component`.
    #[must_use]
    pub fn range(&self, component: usize) -> Option<ComponentRange> {
        self.ranges.get(component).copied()
    }

    /// All scaling ranges, by component.
    #[must_use]
    pub fn ranges(&self) -> &[ComponentRange] {
        &self.ranges
    }

    /// Display gamma.
    #[must_use]
    pub fn gamma(&self) -> f64 {
        self.gamma
    }

    /// Whether the channel contributes to composites.
    #[must_use]
    pub fn is_visible(&self) -> bool {
        self.visible
    }

    /// Largest intensity at the channel's bit depth.
    #[must_use]
    pub fn max_intensity(&self) -> u32 {
        self.max_intensity
    }

    /// Whether scaling still has to be derived from a first histogram.
    #[must_use]
    pub fn needs_initial_stretch(&self) -> bool {
        self.needs_stretch
    }

    /// Whether an edit happened since the last [`ContrastState::take_dirty`].
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Returns and clears the dirty flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    /// Sets the range of `component`, clamping into `[0, max_intensity]`
    /// and widening a collapsed range by one unit.
    ///
    /// Returns whether the stored range changed. Unknown components are
    /// ignored.
    pub fn set_range(&mut self, component: usize, min: i64, max: i64) -> bool {
        let clamped = clamp_range(min, max, self.max_intensity);
        let Some(slot) = self.ranges.get_mut(component) else {
            return false;
        };
        self.needs_stretch = false;
        if *slot == clamped {
            return false;
        }
        *slot = clamped;
        self.dirty = true;
        true
    }

    /// Sets the minimum of `component`, keeping the current maximum.
    pub fn set_min(&mut self, component: usize, min: i64) -> bool {
        match self.range(component) {
            Some(range) => self.set_range(component, min, i64::from(range.max)),
            None => false,
        }
    }

    /// Sets the maximum of `component`, keeping the current minimum.
    pub fn set_max(&mut self, component: usize, max: i64) -> bool {
        match self.range(component) {
            Some(range) => self.set_range(component, i64::from(range.min), max),
            None => false,
        }
    }

    /// Sets the display gamma.
    ///
    /// Non-positive or non-finite values are ignored; values within
    /// [`GAMMA_SNAP_BAND`] become exactly 1.0.
    pub fn set_gamma(&mut self, gamma: f64) -> bool {
        let Some(gamma) = snap_gamma(gamma) else {
            return false;
        };
        if (self.gamma - gamma).abs() < f64::EPSILON {
            return false;
        }
        self.gamma = gamma;
        self.dirty = true;
        true
    }

    /// Sets visibility.
    pub fn set_visible(&mut self, visible: bool) -> bool {
        if self.visible == visible {
            return false;
        }
        self.visible = visible;
        self.dirty = true;
        true
    }

    /// Sets every component to `[0, max_intensity]`.
    pub fn set_full_scale(&mut self) -> bool {
        let top = i64::from(self.max_intensity);
        (0..self.ranges.len()).fold(false, |changed, c| self.set_range(c, 0, top) | changed)
    }

    /// Derives the range of `component` from its histogram.
    ///
    /// The new range is the trimmed extrema, bounded by the exact extrema.
    /// Blank histograms leave the range untouched.
    pub fn autostretch(&mut self, component: usize, histogram: &HistogramResult) -> bool {
        if histogram.is_blank() {
            return false;
        }
        let min = histogram.min.max(histogram.min_trimmed);
        let max = histogram.max.min(histogram.max_trimmed);
        self.set_range(component, i64::from(min), i64::from(max))
    }

    /// Rescales stored ranges to a new bit depth.
    pub fn set_bit_depth(&mut self, bit_depth: u8) -> bool {
        let top = max_intensity(bit_depth);
        if top == self.max_intensity {
            return false;
        }
        self.max_intensity = top;
        for slot in &mut self.ranges {
            *slot = clamp_range(i64::from(slot.min), i64::from(slot.max), top);
        }
        self.dirty = true;
        true
    }

    /// Writes this state into a channel record.
    pub fn apply_to(&self, settings: &mut ChannelSettings) {
        settings.ranges.clone_from(&self.ranges);
        settings.gamma = self.gamma;
        settings.visible = self.visible;
    }
}

fn max_intensity(bit_depth: u8) -> u32 {
    (1u32 << bit_depth.clamp(1, 16)) - 1
}

/// Validates a gamma value: non-positive or non-finite values yield
/// `None`, values within [`GAMMA_SNAP_BAND`] yield exactly 1.0.
#[must_use]
pub fn snap_gamma(gamma: f64) -> Option<f64> {
    if !gamma.is_finite() || gamma <= 0.0 {
        return None;
    }
    let (low, high) = GAMMA_SNAP_BAND;
    if (low..=high).contains(&gamma) {
        Some(1.0)
    } else {
        Some(gamma)
    }
}

/// Clamps `max` into `[0, top]` and `min` into `[0, max]`, then widens a
/// collapsed range: a range stuck at zero grows upward, anything else
/// grows downward.
fn clamp_range(min: i64, max: i64, top: u32) -> ComponentRange {
    let top = i64::from(top);
    let max = max.clamp(0, top);
    let min = min.clamp(0, max);
    let (min, max) = if min < max {
        (min, max)
    } else if min == 0 {
        (0, 1.min(top))
    } else {
        (max - 1, max)
    };
    ComponentRange::new(
        u32::try_from(min).unwrap_or(0),
        u32::try_from(max).unwrap_or(0),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::histogram::{compute_histogram, HistogramConfig};
    use approx::assert_relative_eq;
    use scopeview_core::{Coords, Image};

    #[test]
    fn test_set_range_clamps() {
        let mut state = ContrastState::new(1, 8);
        assert!(!state.set_range(0, -20, 400));
        assert_eq!(state.range(0), Some(ComponentRange::new(0, 255)));
        assert!(!state.is_dirty());

        state.set_range(0, 300, 100);
        assert_eq!(state.range(0), Some(ComponentRange::new(99, 100)));

        state.set_range(0, 0, 0);
        assert_eq!(state.range(0), Some(ComponentRange::new(0, 1)));

        state.set_range(0, 255, 255);
        assert_eq!(state.range(0), Some(ComponentRange::new(254, 255)));
    }

    #[test]
    fn test_unchanged_edit_is_not_dirty() {
        let mut state = ContrastState::new(1, 8);
        assert!(!state.set_full_scale());
        assert!(!state.take_dirty());
        assert!(state.set_max(0, 128));
        assert!(!state.set_max(0, 128));
        assert!(state.take_dirty());
        assert!(!state.take_dirty());
    }

    #[test]
    fn test_gamma_snapping() {
        let mut state = ContrastState::new(1, 8);
        assert!(!state.set_gamma(0.95));
        assert_relative_eq!(state.gamma(), 1.0);
        assert!(state.set_gamma(0.5));
        assert!(state.set_gamma(1.08));
        assert_relative_eq!(state.gamma(), 1.0);
        assert!(!state.set_gamma(0.0));
        assert!(!state.set_gamma(-2.0));
        assert_relative_eq!(state.gamma(), 1.0);
    }

    #[test]
    fn test_autostretch_uses_trimmed_bounds() {
        let pixels: Vec<u8> = (0..=255).collect();
        let image = Image::gray8(Coords::new(), 16, 16, pixels).unwrap();
        let histogram =
            compute_histogram(&image, 0, &HistogramConfig::new().with_trim_percent(10.0)).unwrap();
        let mut state = ContrastState::new(1, 8);
        assert!(state.needs_initial_stretch());
        assert!(state.autostretch(0, &histogram));
        assert!(!state.needs_initial_stretch());
        assert_eq!(state.range(0), Some(ComponentRange::new(25, 230)));
    }

    #[test]
    fn test_autostretch_skips_blank() {
        let image = Image::gray8(Coords::new(), 2, 2, vec![0; 4]).unwrap();
        let histogram = compute_histogram(&image, 0, &HistogramConfig::default()).unwrap();
        let mut state = ContrastState::new(1, 8);
        assert!(!state.autostretch(0, &histogram));
        assert_eq!(state.range(0), Some(ComponentRange::new(0, 255)));
        assert!(state.needs_initial_stretch());
    }

    #[test]
    fn test_uniform_image_widens_range() {
        let image = Image::gray8(Coords::new(), 2, 2, vec![77; 4]).unwrap();
        let histogram = compute_histogram(&image, 0, &HistogramConfig::default()).unwrap();
        let mut state = ContrastState::new(1, 8);
        state.autostretch(0, &histogram);
        assert_eq!(state.range(0), Some(ComponentRange::new(76, 77)));
    }

    #[test]
    fn test_round_trip_through_channel_settings() {
        let mut state = ContrastState::new(3, 8);
        state.set_range(1, 10, 20);
        state.set_gamma(2.0);
        state.set_visible(false);

        let mut record = ChannelSettings::default_for(0);
        state.apply_to(&mut record);
        let restored = ContrastState::from_channel_settings(&record, 3, 8);
        assert_eq!(restored.range(1), Some(ComponentRange::new(10, 20)));
        assert_relative_eq!(restored.gamma(), 2.0);
        assert!(!restored.is_visible());
        assert!(!restored.needs_initial_stretch());

        let mismatched = ContrastState::from_channel_settings(&record, 1, 8);
        assert!(mismatched.needs_initial_stretch());
    }

    #[test]
    fn test_bit_depth_change_reclamps() {
        let mut state = ContrastState::new(1, 16);
        state.set_range(0, 1000, 60000);
        assert!(state.set_bit_depth(12));
        assert_eq!(state.range(0), Some(ComponentRange::new(1000, 4095)));
    }
}
