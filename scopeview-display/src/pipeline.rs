//! The render pass: resolve images, update statistics and contrast, map
//! through lookup tables and hand the frame to the sink.
//!
//! [`DisplayPipeline`] lives on the render thread of a
//! [`DrawQueue`](crate::DrawQueue) and is only touched from there: render
//! passes, timer callbacks and controller edits all arrive as queue work.
//! Contrast edits made during one pass or edit are committed to the
//! settings store together, so observers see one settings change per batch.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use log::{debug, trace, warn};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use scopeview_algorithms::{
    compute_all_components, composite_into, snap_gamma, ComponentRemap, ContrastState,
    HistogramConfig, HistogramResult, IntensityMapper, Lut, RgbFrame, RgbPlanes, Roi,
};
use scopeview_core::coords::CHANNEL;
use scopeview_core::{ChannelSettings, Coords, DisplaySettings, Image, Rgb};

use crate::draw_queue::{QueueHandle, Renderer};
use crate::error::Result;
use crate::events::{DisplayEvent, EventBus, Substitution};
use crate::scheduler::{HistogramScheduler, UpdateDecision};
use crate::source::{ImageSource, RenderSink};
use crate::state::ChannelModel;
use crate::store::{ChannelProfile, SettingsStore};

/// Tints for the components of multi-component images without 8-bit RGB
/// planes.
const COMPONENT_TINTS: [Rgb; 3] = [Rgb::RED, Rgb::GREEN, Rgb::BLUE];

/// Counters shared between the render thread and the controller.
#[derive(Debug, Default)]
pub struct PipelineStats {
    frames_painted: AtomicU64,
    histogram_updates: AtomicU64,
    substitutions: AtomicU64,
}

impl PipelineStats {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    /// Current counter values.
    #[must_use]
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_painted: self.frames_painted.load(Ordering::Relaxed),
            histogram_updates: self.histogram_updates.load(Ordering::Relaxed),
            substitutions: self.substitutions.load(Ordering::Relaxed),
            coalesced_requests: 0,
        }
    }
}

/// Point-in-time copy of the display counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StatsSnapshot {
    /// Frames handed to the render sink.
    pub frames_painted: u64,
    /// Histogram computations, one per channel per update.
    pub histogram_updates: u64,
    /// Missing images replaced by a stand-in.
    pub substitutions: u64,
    /// Draw requests dropped in favor of a newer one.
    pub coalesced_requests: u64,
}

/// Statistics settings of a pipeline.
#[derive(Debug, Clone, Copy)]
pub(crate) struct StatisticsConfig {
    pub(crate) bin_power: u8,
    pub(crate) compute_std_dev: bool,
}

/// Collaborators a pipeline is built from.
pub(crate) struct PipelineParts {
    pub(crate) name: String,
    pub(crate) source: Arc<dyn ImageSource>,
    pub(crate) store: Arc<dyn SettingsStore>,
    pub(crate) profile: Arc<dyn ChannelProfile>,
    pub(crate) events: Arc<EventBus>,
    pub(crate) sink: Box<dyn RenderSink>,
    pub(crate) stats: Arc<PipelineStats>,
    pub(crate) statistics: StatisticsConfig,
}

/// Render-thread state of one display.
pub struct DisplayPipeline {
    name: String,
    source: Arc<dyn ImageSource>,
    store: Arc<dyn SettingsStore>,
    profile: Arc<dyn ChannelProfile>,
    events: Arc<EventBus>,
    sink: Box<dyn RenderSink>,
    stats: Arc<PipelineStats>,
    statistics: StatisticsConfig,
    scheduler: HistogramScheduler,
    queue: QueueHandle<DisplayPipeline>,
    channels: BTreeMap<usize, ChannelModel>,
    last_images: BTreeMap<usize, Arc<Image>>,
    roi: Option<Roi>,
    frame: RgbFrame,
    pass: u64,
}

impl std::fmt::Debug for DisplayPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisplayPipeline")
            .field("name", &self.name)
            .field("channels", &self.channels.keys().collect::<Vec<_>>())
            .field("pass", &self.pass)
            .finish_non_exhaustive()
    }
}

/// Image picked for a channel, and whether it stands in for a missing one.
struct Resolved {
    channel: usize,
    image: Arc<Image>,
    substituted: bool,
}

impl DisplayPipeline {
    pub(crate) fn new(
        parts: PipelineParts,
        scheduler: HistogramScheduler,
        queue: QueueHandle<DisplayPipeline>,
    ) -> Self {
        Self {
            name: parts.name,
            source: parts.source,
            store: parts.store,
            profile: parts.profile,
            events: parts.events,
            sink: parts.sink,
            stats: parts.stats,
            statistics: parts.statistics,
            scheduler,
            queue,
            channels: BTreeMap::new(),
            last_images: BTreeMap::new(),
            roi: None,
            frame: RgbFrame::default(),
            pass: 0,
        }
    }

    /// Contrast state of `channel`, once an image of it has been drawn.
    #[must_use]
    pub fn contrast(&self, channel: usize) -> Option<&ContrastState> {
        self.channels.get(&channel).map(|m| &m.contrast)
    }

    /// Latest statistics of `channel`.
    #[must_use]
    pub fn histograms(&self, channel: usize) -> Option<Arc<Vec<HistogramResult>>> {
        self.channels.get(&channel).and_then(|m| m.histograms.clone())
    }

    /// Sets the range of one component and redraws. Disables autostretch.
    pub fn set_contrast(&mut self, channel: usize, component: usize, min: i64, max: i64) {
        let Some(model) = self.channels.get_mut(&channel) else {
            debug!("{}: contrast edit for unseen channel {channel} ignored", self.name);
            return;
        };
        if model.contrast.set_range(component, min, max) {
            self.commit(true);
            self.queue.redraw();
        }
    }

    /// Sets the gamma of `channel` and redraws.
    pub fn set_gamma(&mut self, channel: usize, gamma: f64) {
        match self.channels.get_mut(&channel) {
            Some(model) => {
                if model.contrast.set_gamma(gamma) {
                    self.commit(false);
                    self.queue.redraw();
                }
            }
            None => {
                if let Some(gamma) = snap_gamma(gamma) {
                    self.edit_record(channel, |record| record.gamma = gamma);
                }
            }
        }
    }

    /// Shows or hides `channel` in composites and redraws.
    pub fn set_visible(&mut self, channel: usize, visible: bool) {
        match self.channels.get_mut(&channel) {
            Some(model) => {
                if model.contrast.set_visible(visible) {
                    self.commit(false);
                    self.queue.redraw();
                }
            }
            None => self.edit_record(channel, |record| record.visible = visible),
        }
    }

    /// Scales every component of `channel` to its full bit depth. Disables
    /// autostretch.
    pub fn set_full_scale(&mut self, channel: usize) {
        if let Some(model) = self.channels.get_mut(&channel) {
            if model.contrast.set_full_scale() {
                self.commit(true);
                self.queue.redraw();
            }
        }
    }

    /// Recomputes statistics of every drawn channel from its last image and
    /// stretches contrast to them, regardless of the autostretch setting.
    pub fn autostretch_now(&mut self) {
        let settings = self.store.display_settings();
        let now = Instant::now();
        let images: Vec<(usize, Arc<Image>)> = self
            .last_images
            .iter()
            .map(|(&channel, image)| (channel, Arc::clone(image)))
            .collect();
        for (channel, image) in images {
            self.prepare_channel(channel, &image, &settings);
            self.update_histograms(channel, &image, &settings, now, true);
        }
        if self.commit(false).is_some() {
            self.queue.redraw();
        }
    }

    /// Forces statistics of every channel to be recomputed on the next pass.
    pub fn refresh_histograms(&mut self) {
        self.scheduler.force_all();
        self.queue.redraw();
    }

    /// Restricts statistics to `roi`, or lifts the restriction.
    pub fn set_roi(&mut self, roi: Option<Roi>) {
        if self.roi == roi {
            return;
        }
        self.roi = roi;
        self.scheduler.force_all();
        self.queue.redraw();
    }

    /// Reacts to settings installed from outside the render thread.
    pub fn on_settings_changed(
        &mut self,
        previous: &DisplaySettings,
        current: &DisplaySettings,
        redraw: bool,
    ) {
        self.scheduler.set_rate(current.histogram_update_rate);
        if previous.statistics_differ(current) || previous.log_histogram != current.log_histogram
        {
            self.scheduler.force_all();
        }
        for (&channel, model) in &mut self.channels {
            let Some(record) = current.channel(channel) else {
                continue;
            };
            if model.differs_from(record) {
                let rebuilt = ContrastState::from_channel_settings(
                    record,
                    model.contrast.num_components(),
                    bit_depth_of(model.contrast.max_intensity()),
                );
                if rebuilt.needs_initial_stretch() {
                    self.scheduler.force_next(channel);
                }
                model.contrast = rebuilt;
            }
        }
        if redraw {
            self.queue.redraw();
        }
    }

    /// Handles a deferred histogram update for `channel`.
    pub fn on_histogram_timer(&mut self, channel: usize, due: Instant) {
        if !self.scheduler.timer_fired(channel, due) {
            trace!("{}: stale histogram timer for channel {channel}", self.name);
            return;
        }
        let Some(image) = self.last_images.get(&channel).cloned() else {
            return;
        };
        let settings = self.store.display_settings();
        self.update_histograms(channel, &image, &settings, Instant::now(), false);
        if self.commit(false).is_some() {
            self.queue.redraw();
        }
    }

    /// Stops the histogram timer.
    pub fn shutdown(&mut self) {
        self.scheduler.shutdown();
    }

    fn channels_to_draw(&self, settings: &DisplaySettings, coords: &Coords) -> Vec<usize> {
        if settings.color_mode.is_composite() {
            let count = self
                .source
                .axis_length(CHANNEL)
                .max(coords.channel() + 1);
            (0..count).collect()
        } else {
            vec![coords.channel()]
        }
    }

    fn resolve_image(&mut self, channel: usize, coords: &Coords) -> Option<Resolved> {
        let target = if coords.has_axis(CHANNEL) || channel > 0 {
            coords.with_channel(channel)
        } else {
            coords.clone()
        };

        if let Some(image) = self.source.image(&target) {
            self.last_images.insert(channel, Arc::clone(&image));
            return Some(Resolved {
                channel,
                image,
                substituted: false,
            });
        }

        let (image, substitution) = if let Some(last) = self.last_images.get(&channel) {
            (Arc::clone(last), Substitution::LastKnown)
        } else if let Some(template) = self.last_images.values().next() {
            (
                Arc::new(template.zeroed_like(target.clone())),
                Substitution::Placeholder,
            )
        } else {
            debug!("{}: no image for channel {channel} at {target}", self.name);
            return None;
        };

        warn!(
            "{}: image at {target} unavailable, drawing {substitution:?} instead",
            self.name
        );
        PipelineStats::bump(&self.stats.substitutions);
        self.events.publish(&DisplayEvent::ImageSubstituted {
            requested: target,
            substitution,
        });
        Some(Resolved {
            channel,
            image,
            substituted: true,
        })
    }

    /// Creates the channel model on first sight of a channel, or when the
    /// image format changes under it.
    fn prepare_channel(&mut self, channel: usize, image: &Image, settings: &DisplaySettings) {
        if let Some(model) = self.channels.get_mut(&channel) {
            if model.fits(image) {
                return;
            }
            if model.contrast.num_components() == image.num_components() {
                debug!(
                    "{}: channel {channel} switched to {}-bit images",
                    self.name,
                    image.bit_depth()
                );
                model.contrast.set_bit_depth(image.bit_depth());
                model.rgb = None;
                return;
            }
        }
        let mut record = settings.channel_or_default(channel);
        let mut seed = None;
        if record.ranges.is_empty() {
            if let Some(remembered) = self.profile.load(&record.name) {
                debug!("{}: restoring remembered settings for {}", self.name, record.name);
                record = ChannelSettings {
                    name: record.name,
                    ..remembered
                };
                seed = Some(record.clone());
            }
        }
        let contrast =
            ContrastState::from_channel_settings(&record, image.num_components(), image.bit_depth());
        if contrast.needs_initial_stretch() {
            self.scheduler.force_next(channel);
        }
        self.channels
            .insert(channel, ChannelModel::new(contrast, seed));
    }

    fn update_histograms(
        &mut self,
        channel: usize,
        image: &Image,
        settings: &DisplaySettings,
        now: Instant,
        force_stretch: bool,
    ) {
        let roi = if settings.roi_autoscale {
            self.roi.clone()
        } else {
            None
        };
        let config = HistogramConfig::new()
            .with_bin_power(self.statistics.bin_power)
            .with_trim_percent(sanitize_trim(settings.extrema_percentage))
            .with_std_dev(self.statistics.compute_std_dev)
            .with_roi(roi);

        let histograms = match compute_all_components(image, &config) {
            Ok(histograms) => histograms,
            Err(e) => {
                warn!("{}: histogram for channel {channel} failed: {e}", self.name);
                self.scheduler.force_next(channel);
                return;
            }
        };
        self.scheduler.mark_updated(channel, now);
        PipelineStats::bump(&self.stats.histogram_updates);

        let Some(model) = self.channels.get_mut(&channel) else {
            return;
        };
        if force_stretch || settings.autostretch || model.contrast.needs_initial_stretch() {
            for (component, histogram) in histograms.iter().enumerate() {
                model.contrast.autostretch(component, histogram);
            }
        }
        let display_bins: Vec<Vec<u64>> = histograms
            .iter()
            .map(|h| h.display_bins(settings.log_histogram))
            .collect();
        let histograms = Arc::new(histograms);
        model.histograms = Some(Arc::clone(&histograms));
        self.events.publish(&DisplayEvent::HistogramsUpdated {
            channel,
            histograms,
            display_bins: Arc::new(display_bins),
        });
    }

    /// Writes every pending contrast change into one new settings snapshot
    /// and remembers the touched channels in the profile.
    ///
    /// The changes are replayed on top of whatever snapshot is current at
    /// install time, so settings installed from another thread survive.
    /// Returns the installed snapshot, or `None` if nothing changed.
    fn commit(&mut self, disable_autostretch: bool) -> Option<Arc<DisplaySettings>> {
        let mut touched: Vec<(usize, Option<ChannelSettings>)> = Vec::new();
        for (&channel, model) in &mut self.channels {
            let seed = model.seed.take();
            if model.contrast.take_dirty() || seed.is_some() {
                touched.push((channel, seed));
            }
        }

        let name = &self.name;
        let channels = &self.channels;
        let installed = self.store.update(&mut |current| {
            let mut next: Option<DisplaySettings> = None;
            if disable_autostretch && current.autostretch {
                debug!("{name}: manual contrast edit disables autostretch");
                next = Some(current.clone().with_autostretch(false));
            }
            for (channel, seed) in &touched {
                let Some(model) = channels.get(channel) else {
                    continue;
                };
                let base = next.take().unwrap_or_else(|| current.clone());
                next = Some(base.with_channel(*channel, |record| {
                    if let Some(seed) = seed {
                        *record = seed.clone();
                    }
                    model.contrast.apply_to(record);
                }));
            }
            next
        })?;

        for (channel, _) in &touched {
            if let Some(record) = installed.channel(*channel) {
                if let Err(e) = self.profile.save(record) {
                    warn!("{}: could not remember {}: {e}", self.name, record.name);
                }
            }
        }
        self.events
            .publish(&DisplayEvent::DisplaySettingsChanged(Arc::clone(&installed)));
        Some(installed)
    }

    fn edit_record(&mut self, channel: usize, edit: impl Fn(&mut ChannelSettings)) {
        let installed = self.store.update(&mut |current| {
            let updated = current.clone().with_channel(channel, &edit);
            (updated != *current).then_some(updated)
        });
        if let Some(installed) = installed {
            self.events
                .publish(&DisplayEvent::DisplaySettingsChanged(installed));
        }
    }

    fn draw(&mut self, settings: &DisplaySettings, resolved: &[Resolved]) -> Result<()> {
        let Some(first) = resolved.first() else {
            return Ok(());
        };
        self.frame.reset(first.image.width(), first.image.height());
        let composite = settings.color_mode.is_composite();

        for entry in resolved {
            let Some(model) = self.channels.get_mut(&entry.channel) else {
                continue;
            };
            if composite && !model.contrast.is_visible() {
                continue;
            }
            let image = entry.image.as_ref();
            let contrast = &model.contrast;

            if image.num_components() > 1 && image.bytes_per_sample() == 1 {
                if !model.rgb.as_ref().is_some_and(|p| p.is_snapshot_of(image)) {
                    model.rgb = Some(RgbPlanes::from_image(image)?);
                }
                let remaps: Vec<ComponentRemap> =
                    contrast.ranges().iter().map(|r| ComponentRemap::new(*r)).collect();
                if let Some(planes) = model.rgb.as_mut() {
                    planes.remap(&remaps);
                    planes.composite_into(&mut self.frame);
                }
            } else if image.num_components() > 1 {
                for (component, range) in contrast.ranges().iter().enumerate() {
                    let tint = COMPONENT_TINTS[component % COMPONENT_TINTS.len()];
                    let lut = Lut::ramp(tint).with_gamma(contrast.gamma());
                    let mapper = IntensityMapper::new(*range, lut);
                    composite_into(&mut self.frame, image, component, &mapper)?;
                }
            } else {
                let mut record = settings.channel_or_default(entry.channel);
                record.gamma = contrast.gamma();
                let lut =
                    Lut::for_channel(settings.color_mode, &record, settings.custom_lut.as_deref());
                let range = contrast
                    .range(0)
                    .unwrap_or_else(|| scopeview_core::ComponentRange::full(image.max_intensity()));
                composite_into(&mut self.frame, image, 0, &IntensityMapper::new(range, lut))?;
            }
        }
        Ok(())
    }
}

impl Renderer for DisplayPipeline {
    fn render(&mut self, coords: &Coords) -> Result<()> {
        let settings = self.store.display_settings();
        let now = Instant::now();

        let mut resolved = Vec::new();
        for channel in self.channels_to_draw(&settings, coords) {
            if let Some(entry) = self.resolve_image(channel, coords) {
                resolved.push(entry);
            }
        }
        if resolved.is_empty() {
            debug!("{}: nothing to draw at {coords}", self.name);
            return Ok(());
        }

        for entry in &resolved {
            self.prepare_channel(entry.channel, &entry.image, &settings);
            if entry.substituted {
                continue;
            }
            if self.scheduler.request(entry.channel, now) == UpdateDecision::Now {
                self.update_histograms(entry.channel, &entry.image, &settings, now, false);
            }
        }

        let settings = self.commit(false).unwrap_or(settings);
        self.draw(&settings, &resolved)?;
        self.sink.paint(&self.frame, coords)?;

        self.pass += 1;
        PipelineStats::bump(&self.stats.frames_painted);
        self.events.publish(&DisplayEvent::DrawComplete {
            coords: coords.clone(),
            pass: self.pass,
        });
        Ok(())
    }
}

fn sanitize_trim(percentage: f64) -> f64 {
    if percentage.is_finite() {
        percentage.clamp(0.0, 49.99)
    } else {
        0.0
    }
}

/// Bit depth whose largest intensity is `max_intensity`.
fn bit_depth_of(max_intensity: u32) -> u8 {
    u8::try_from(32 - max_intensity.leading_zeros()).unwrap_or(16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bit_depth_of() {
        assert_eq!(bit_depth_of(255), 8);
        assert_eq!(bit_depth_of(4095), 12);
        assert_eq!(bit_depth_of(65535), 16);
        assert_eq!(bit_depth_of(1), 1);
    }

    #[test]
    fn test_sanitize_trim() {
        assert!((sanitize_trim(75.0) - 49.99).abs() < 1e-9);
        assert!(sanitize_trim(f64::NAN).abs() < f64::EPSILON);
        assert!(sanitize_trim(-1.0).abs() < f64::EPSILON);
    }
}
