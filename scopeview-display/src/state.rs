//! Per-channel state owned by the render thread.

use std::sync::Arc;

use scopeview_algorithms::{ContrastState, HistogramResult, RgbPlanes};
use scopeview_core::{ChannelSettings, Image};

/// Contrast, statistics and cached RGB planes of one channel.
#[derive(Debug)]
pub(crate) struct ChannelModel {
    pub(crate) contrast: ContrastState,
    pub(crate) histograms: Option<Arc<Vec<HistogramResult>>>,
    pub(crate) rgb: Option<RgbPlanes>,
    /// Record loaded from the channel profile, written to the settings at
    /// the next commit.
    pub(crate) seed: Option<ChannelSettings>,
}

impl ChannelModel {
    pub(crate) fn new(contrast: ContrastState, seed: Option<ChannelSettings>) -> Self {
        Self {
            contrast,
            histograms: None,
            rgb: None,
            seed,
        }
    }

    /// Whether this model was built for images shaped like `image`.
    pub(crate) fn fits(&self, image: &Image) -> bool {
        self.contrast.num_components() == image.num_components()
            && self.contrast.max_intensity() == image.max_intensity()
    }

    /// Whether `record` disagrees with the live contrast state.
    pub(crate) fn differs_from(&self, record: &ChannelSettings) -> bool {
        (record.gamma - self.contrast.gamma()).abs() > f64::EPSILON
            || record.visible != self.contrast.is_visible()
            || (!record.ranges.is_empty() && record.ranges.as_slice() != self.contrast.ranges())
    }
}
