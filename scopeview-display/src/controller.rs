//! Public face of one display.
//!
//! A [`DisplayController`] owns the draw queue and its render thread, the
//! histogram timer, and handles to the shared settings store and event bus.
//! Every edit is forwarded to the render thread, so it is serialized with
//! render passes.

use std::sync::mpsc::channel;
use std::sync::{Arc, OnceLock};
use std::time::Duration;

use log::{debug, info};

use scopeview_algorithms::{ContrastState, HistogramResult, Roi, DEFAULT_BIN_POWER};
use scopeview_core::{Coords, DisplaySettings, Image};

use crate::draw_queue::{DrawQueue, QueueHandle, QueuePhase};
use crate::error::{Error, Result};
use crate::events::{DisplayEvent, EventBus, Subscription, SubscriptionId};
use crate::ids::NameAllocator;
use crate::pipeline::{DisplayPipeline, PipelineParts, PipelineStats, StatisticsConfig, StatsSnapshot};
use crate::scheduler::HistogramScheduler;
use crate::source::{ImageSource, RenderSink};
use crate::store::{ChannelProfile, MemoryProfile, SettingsCell, SettingsStore};
use crate::timer::DebounceTimer;

/// Configuration for a display.
#[derive(Debug, Clone)]
pub struct ControllerConfig {
    /// Base name; made unique by the [`NameAllocator`].
    pub name: String,
    /// Log2 of the number of histogram bins.
    pub bin_power: u8,
    /// Whether histograms include the standard deviation.
    pub compute_std_dev: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            name: "Preview".to_owned(),
            bin_power: DEFAULT_BIN_POWER,
            compute_std_dev: false,
        }
    }
}

impl ControllerConfig {
    /// Creates a configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base name.
    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Sets the histogram bin power.
    #[must_use]
    pub fn with_bin_power(mut self, bin_power: u8) -> Self {
        self.bin_power = bin_power;
        self
    }

    /// Enables or disables the standard deviation.
    #[must_use]
    pub fn with_std_dev(mut self, enabled: bool) -> Self {
        self.compute_std_dev = enabled;
        self
    }
}

/// Builder for [`DisplayController`].
pub struct DisplayControllerBuilder {
    config: ControllerConfig,
    source: Arc<dyn ImageSource>,
    sink: Box<dyn RenderSink>,
    store: Option<Arc<dyn SettingsStore>>,
    profile: Option<Arc<dyn ChannelProfile>>,
    events: Option<Arc<EventBus>>,
}

impl DisplayControllerBuilder {
    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    /// Shares an existing settings store.
    #[must_use]
    pub fn settings_store(mut self, store: Arc<dyn SettingsStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Starts from `settings` in a private store.
    #[must_use]
    pub fn settings(mut self, settings: DisplaySettings) -> Self {
        self.store = Some(Arc::new(SettingsCell::new(settings)));
        self
    }

    /// Shares a channel profile.
    #[must_use]
    pub fn profile(mut self, profile: Arc<dyn ChannelProfile>) -> Self {
        self.profile = Some(profile);
        self
    }

    /// Shares an event bus.
    #[must_use]
    pub fn events(mut self, events: Arc<EventBus>) -> Self {
        self.events = Some(events);
        self
    }

    /// Starts the display's worker threads.
    ///
    /// # Errors
    /// Returns [`Error::Spawn`] if a thread cannot be started.
    pub fn build(self, names: &NameAllocator) -> Result<DisplayController> {
        let name = names.allocate(&self.config.name);
        let store: Arc<dyn SettingsStore> = match self.store {
            Some(store) => store,
            None => Arc::new(SettingsCell::default()),
        };
        let profile: Arc<dyn ChannelProfile> = match self.profile {
            Some(profile) => profile,
            None => Arc::new(MemoryProfile::new()),
        };
        let events = self.events.unwrap_or_default();
        let stats = Arc::new(PipelineStats::default());

        // The timer needs the queue and the queue's renderer needs the timer.
        let queue_slot: Arc<OnceLock<QueueHandle<DisplayPipeline>>> = Arc::new(OnceLock::new());
        let timer_slot = Arc::clone(&queue_slot);
        let timer = DebounceTimer::spawn(&format!("{name} histogram timer"), move |channel, due| {
            if let Some(queue) = timer_slot.get() {
                queue.exec(move |pipeline| pipeline.on_histogram_timer(channel, due));
            }
        })?;
        let scheduler =
            HistogramScheduler::new(store.display_settings().histogram_update_rate, timer);

        let parts = PipelineParts {
            name: name.clone(),
            source: self.source,
            store: Arc::clone(&store),
            profile,
            events: Arc::clone(&events),
            sink: self.sink,
            stats: Arc::clone(&stats),
            statistics: StatisticsConfig {
                bin_power: self.config.bin_power,
                compute_std_dev: self.config.compute_std_dev,
            },
        };
        let queue = DrawQueue::spawn(&format!("{name} render"), move |handle| {
            DisplayPipeline::new(parts, scheduler, handle)
        })?;
        let _ = queue_slot.set(queue.handle().clone());

        info!("display '{name}' started");
        Ok(DisplayController {
            name,
            queue,
            store,
            events,
            stats,
            closed: false,
        })
    }
}

/// One display: accepts new images and navigation, applies contrast edits,
/// and publishes events as frames are drawn.
pub struct DisplayController {
    name: String,
    queue: DrawQueue<DisplayPipeline>,
    store: Arc<dyn SettingsStore>,
    events: Arc<EventBus>,
    stats: Arc<PipelineStats>,
    closed: bool,
}

impl std::fmt::Debug for DisplayController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisplayController")
            .field("name", &self.name)
            .field("phase", &self.queue.phase())
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

impl DisplayController {
    /// Starts building a display that reads from `source` and paints into `sink`.
    pub fn builder(
        source: Arc<dyn ImageSource>,
        sink: Box<dyn RenderSink>,
    ) -> DisplayControllerBuilder {
        DisplayControllerBuilder {
            config: ControllerConfig::default(),
            source,
            sink,
            store: None,
            profile: None,
            events: None,
        }
    }

    /// Unique display name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Shows a newly acquired image.
    pub fn on_new_image(&self, image: &Image) {
        self.queue.enqueue(image.coords().clone());
    }

    /// Navigates to `coords`.
    pub fn set_display_position(&self, coords: Coords) {
        self.queue.enqueue(coords);
    }

    /// Coordinates most recently requested for display.
    #[must_use]
    pub fn display_position(&self) -> Option<Coords> {
        self.queue.handle().last_requested()
    }

    /// Current settings snapshot.
    #[must_use]
    pub fn display_settings(&self) -> Arc<DisplaySettings> {
        self.store.display_settings()
    }

    /// Installs new settings; redraws if `redraw` is set.
    ///
    /// # Errors
    /// Returns [`Error::Closed`] after [`DisplayController::close`].
    pub fn set_display_settings(&self, settings: DisplaySettings, redraw: bool) -> Result<()> {
        self.ensure_open()?;
        let mut previous = None;
        let installed = self.store.update(&mut |current| {
            previous = Some(current.clone());
            Some(settings.clone())
        });
        let (Some(previous), Some(installed)) = (previous, installed) else {
            return Ok(());
        };
        self.events
            .publish(&DisplayEvent::DisplaySettingsChanged(Arc::clone(&installed)));
        self.submit(move |pipeline| pipeline.on_settings_changed(&previous, &installed, redraw))
    }

    /// Stretches every channel to its current statistics once.
    ///
    /// # Errors
    /// Returns [`Error::Closed`] after [`DisplayController::close`].
    pub fn autostretch(&self) -> Result<()> {
        self.submit(DisplayPipeline::autostretch_now)
    }

    /// Sets the scaling range of one component. Disables autostretch.
    ///
    /// # Errors
    /// Returns [`Error::Closed`] after [`DisplayController::close`].
    pub fn set_contrast(&self, channel: usize, component: usize, min: i64, max: i64) -> Result<()> {
        self.submit(move |pipeline| pipeline.set_contrast(channel, component, min, max))
    }

    /// Sets a channel's gamma.
    ///
    /// # Errors
    /// Returns [`Error::Closed`] after [`DisplayController::close`].
    pub fn set_gamma(&self, channel: usize, gamma: f64) -> Result<()> {
        self.submit(move |pipeline| pipeline.set_gamma(channel, gamma))
    }

    /// Scales a channel to its full bit depth. Disables autostretch.
    ///
    /// # Errors
    /// Returns [`Error::Closed`] after [`DisplayController::close`].
    pub fn set_full_scale(&self, channel: usize) -> Result<()> {
        self.submit(move |pipeline| pipeline.set_full_scale(channel))
    }

    /// Shows or hides a channel in composites.
    ///
    /// # Errors
    /// Returns [`Error::Closed`] after [`DisplayController::close`].
    pub fn set_channel_visible(&self, channel: usize, visible: bool) -> Result<()> {
        self.submit(move |pipeline| pipeline.set_visible(channel, visible))
    }

    /// Restricts statistics to a region of interest.
    ///
    /// # Errors
    /// Returns [`Error::Closed`] after [`DisplayController::close`].
    pub fn set_roi(&self, roi: Option<Roi>) -> Result<()> {
        self.submit(move |pipeline| pipeline.set_roi(roi))
    }

    /// Recomputes statistics on the next pass regardless of the update rate.
    ///
    /// # Errors
    /// Returns [`Error::Closed`] after [`DisplayController::close`].
    pub fn refresh_histograms(&self) -> Result<()> {
        self.submit(DisplayPipeline::refresh_histograms)
    }

    /// Redraws the current position.
    pub fn redraw(&self) {
        self.queue.handle().redraw();
    }

    /// Suspends drawing; blocks until an in-flight pass finishes.
    pub fn halt(&self) {
        self.queue.halt();
    }

    /// Resumes drawing and redraws the current position once.
    pub fn resume(&self) {
        self.queue.resume();
    }

    /// Current draw queue phase.
    #[must_use]
    pub fn phase(&self) -> QueuePhase {
        self.queue.phase()
    }

    /// Waits until no pass is pending or running, and all submitted edits
    /// have run. Returns `false` on timeout.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        // A no-op job flushes edits queued ahead of it.
        if self.query(|_| (), timeout).is_err() {
            return self.closed;
        }
        self.queue.wait_idle(timeout)
    }

    /// Contrast state of `channel`, once it has been drawn.
    ///
    /// # Errors
    /// Returns [`Error::Closed`] if the render thread is gone.
    pub fn contrast(&self, channel: usize) -> Result<Option<ContrastState>> {
        self.query(move |p| p.contrast(channel).cloned(), Duration::from_secs(5))
    }

    /// Latest statistics of `channel`.
    ///
    /// # Errors
    /// Returns [`Error::Closed`] if the render thread is gone.
    pub fn histograms(&self, channel: usize) -> Result<Option<Arc<Vec<HistogramResult>>>> {
        self.query(move |p| p.histograms(channel), Duration::from_secs(5))
    }

    /// Registers an event observer.
    pub fn subscribe(&self) -> Subscription {
        self.events.subscribe()
    }

    /// Removes an event observer.
    pub fn unsubscribe(&self, id: SubscriptionId) -> bool {
        self.events.unsubscribe(id)
    }

    /// Counters since the display started.
    #[must_use]
    pub fn stats(&self) -> StatsSnapshot {
        StatsSnapshot {
            coalesced_requests: self.queue.handle().coalesced(),
            ..self.stats.snapshot()
        }
    }

    /// Stops drawing and joins the worker threads. Idempotent.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.queue.halt();
        self.queue.exec(DisplayPipeline::shutdown);
        self.queue.shutdown();
        debug!("display '{}' closed", self.name);
    }

    /// Whether [`DisplayController::close`] has run.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> Result<()> {
        if self.closed {
            Err(Error::Closed(self.name.clone()))
        } else {
            Ok(())
        }
    }

    fn submit<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce(&mut DisplayPipeline) + Send + 'static,
    {
        self.ensure_open()?;
        if self.queue.exec(job) {
            Ok(())
        } else {
            Err(Error::Closed(self.name.clone()))
        }
    }

    fn query<T, F>(&self, job: F, timeout: Duration) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut DisplayPipeline) -> T + Send + 'static,
    {
        let (tx, rx) = channel();
        self.submit(move |pipeline| {
            let _ = tx.send(job(pipeline));
        })?;
        rx.recv_timeout(timeout)
            .map_err(|_| Error::Closed(self.name.clone()))
    }
}

impl Drop for DisplayController {
    fn drop(&mut self) {
        self.close();
    }
}
