#![allow(clippy::uninlined_format_args, clippy::cast_possible_truncation)]
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use approx::assert_relative_eq;
use scopeview_algorithms::RgbFrame;
use scopeview_core::coords::TIME;
use scopeview_core::{
    default_channel_color, ChannelSettings, ColorMode, ComponentRange, Coords, DisplaySettings,
    HistogramUpdateRate, Image,
};
use scopeview_display::{
    ChannelProfile, DisplayController, DisplayEvent, Error, MemoryImageSource, MemoryProfile,
    NameAllocator, QueuePhase, RenderSink, Result, SettingsCell, SettingsStore, Substitution,
};

const WAIT: Duration = Duration::from_secs(10);

type Frames = Arc<Mutex<Vec<(Coords, RgbFrame)>>>;

struct RecordingSink {
    frames: Frames,
}

impl RenderSink for RecordingSink {
    fn paint(&mut self, frame: &RgbFrame, coords: &Coords) -> Result<()> {
        self.frames.lock().unwrap().push((coords.clone(), frame.clone()));
        Ok(())
    }
}

/// Profile that cannot store anything.
struct ReadOnlyProfile;

impl ChannelProfile for ReadOnlyProfile {
    fn load(&self, _name: &str) -> Option<ChannelSettings> {
        None
    }

    fn save(&self, settings: &ChannelSettings) -> Result<()> {
        Err(Error::Profile(format!("{} is read-only", settings.name)))
    }
}

/// Store that lets another writer in right after every read made on a
/// render thread, so every snapshot the render thread holds is already stale.
struct InterleavingStore {
    inner: SettingsCell,
    outside_edits: AtomicUsize,
}

impl SettingsStore for InterleavingStore {
    fn display_settings(&self) -> Arc<DisplaySettings> {
        let snapshot = self.inner.display_settings();
        let on_render_thread = thread::current()
            .name()
            .is_some_and(|name| name.ends_with(" render"));
        if on_render_thread {
            let toggled = (*snapshot)
                .clone()
                .with_roi_autoscale(!snapshot.roi_autoscale);
            self.inner.set_display_settings(toggled);
            self.outside_edits.fetch_add(1, Ordering::SeqCst);
        }
        snapshot
    }

    fn set_display_settings(&self, settings: DisplaySettings) -> Arc<DisplaySettings> {
        self.inner.set_display_settings(settings)
    }

    fn compare_and_set(
        &self,
        expected: u64,
        settings: DisplaySettings,
    ) -> std::result::Result<Arc<DisplaySettings>, Arc<DisplaySettings>> {
        self.inner.compare_and_set(expected, settings)
    }
}

fn at(channel: usize, t: usize) -> Coords {
    Coords::new().with(TIME, t).with_channel(channel)
}

fn gray(channel: usize, t: usize, pixels: Vec<u8>) -> Image {
    let width = pixels.len();
    Image::gray8(at(channel, t), width, 1, pixels).unwrap()
}

struct Harness {
    source: Arc<MemoryImageSource>,
    frames: Frames,
    display: DisplayController,
}

fn harness(settings: DisplaySettings, profile: Option<Arc<dyn ChannelProfile>>) -> Harness {
    let source = Arc::new(MemoryImageSource::new());
    let frames: Frames = Arc::new(Mutex::new(Vec::new()));
    let sink = RecordingSink {
        frames: Arc::clone(&frames),
    };
    let mut builder = DisplayController::builder(source.clone(), Box::new(sink)).settings(settings);
    if let Some(profile) = profile {
        builder = builder.profile(profile);
    }
    let display = builder.build(&NameAllocator::new()).unwrap();
    Harness {
        source,
        frames,
        display,
    }
}

impl Harness {
    fn show(&self, image: Image) {
        let image = self.source.insert(image);
        self.display.on_new_image(&image);
        assert!(self.display.wait_idle(WAIT));
    }

    fn last_frame(&self) -> RgbFrame {
        self.frames.lock().unwrap().last().unwrap().1.clone()
    }
}

#[test]
fn test_first_image_is_autostretched() {
    let h = harness(DisplaySettings::new(), None);
    h.show(gray(0, 0, vec![10, 20, 30, 40]));

    let contrast = h.display.contrast(0).unwrap().unwrap();
    assert_eq!(contrast.range(0), Some(ComponentRange::new(10, 40)));

    let frame = h.last_frame();
    assert_eq!(frame.pixel(0, 0), Some([0, 0, 0]));
    assert_eq!(frame.pixel(1, 0), Some([85, 85, 85]));
    assert_eq!(frame.pixel(3, 0), Some([255, 255, 255]));

    let settings = h.display.display_settings();
    assert_eq!(
        settings.channel(0).unwrap().ranges,
        vec![ComponentRange::new(10, 40)]
    );
    assert_eq!(h.display.stats().frames_painted, 1);
    assert_eq!(h.display.phase(), QueuePhase::Idle);
}

#[test]
fn test_manual_contrast_disables_autostretch_in_one_change() {
    let h = harness(DisplaySettings::new(), None);
    h.show(gray(0, 0, vec![10, 20, 30, 40]));

    let events = h.display.subscribe();
    h.display.set_contrast(0, 0, 0, 20).unwrap();
    assert!(h.display.wait_idle(WAIT));

    let changes: Vec<_> = events
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            DisplayEvent::DisplaySettingsChanged(s) => Some(s),
            _ => None,
        })
        .collect();
    assert_eq!(changes.len(), 1, "{:?}", changes);
    assert!(!changes[0].autostretch);
    assert_eq!(
        changes[0].channel(0).unwrap().ranges,
        vec![ComponentRange::new(0, 20)]
    );

    // A brighter image keeps the manual range.
    h.show(gray(0, 1, vec![100, 150, 200, 250]));
    let contrast = h.display.contrast(0).unwrap().unwrap();
    assert_eq!(contrast.range(0), Some(ComponentRange::new(0, 20)));
    assert_eq!(h.last_frame().pixel(0, 0), Some([255, 255, 255]));
}

#[test]
fn test_composite_respects_visibility() {
    let h = harness(
        DisplaySettings::new().with_color_mode(ColorMode::Composite),
        None,
    );
    h.source.insert(gray(1, 0, vec![100; 4]));
    h.show(gray(0, 0, vec![200; 4]));

    let c0 = default_channel_color(0).to_array();
    let c1 = default_channel_color(1).to_array();
    let both = [
        c0[0].saturating_add(c1[0]),
        c0[1].saturating_add(c1[1]),
        c0[2].saturating_add(c1[2]),
    ];
    assert_eq!(h.last_frame().pixel(2, 0), Some(both));

    h.display.set_channel_visible(1, false).unwrap();
    assert!(h.display.wait_idle(WAIT));
    assert_eq!(h.last_frame().pixel(2, 0), Some(c0));
    assert!(!h.display.display_settings().channel(1).unwrap().visible);

    h.display.set_channel_visible(0, false).unwrap();
    assert!(h.display.wait_idle(WAIT));
    assert!(h.last_frame().is_black());
}

#[test]
fn test_missing_image_uses_last_known() {
    let h = harness(DisplaySettings::new(), None);
    h.show(gray(0, 0, vec![10, 20, 30, 40]));
    let events = h.display.subscribe();

    h.display.set_display_position(at(0, 1));
    assert!(h.display.wait_idle(WAIT));

    let substituted: Vec<_> = events
        .drain()
        .into_iter()
        .filter_map(|e| match e {
            DisplayEvent::ImageSubstituted {
                requested,
                substitution,
            } => Some((requested, substitution)),
            _ => None,
        })
        .collect();
    assert_eq!(substituted, vec![(at(0, 1), Substitution::LastKnown)]);

    let stats = h.display.stats();
    assert_eq!(stats.substitutions, 1);
    assert_eq!(stats.frames_painted, 2);
    assert_eq!(stats.histogram_updates, 1);
    assert_eq!(h.frames.lock().unwrap()[1].0, at(0, 1));
}

#[test]
fn test_missing_channel_gets_placeholder() {
    let h = harness(
        DisplaySettings::new().with_color_mode(ColorMode::Composite),
        None,
    );
    h.source.insert(gray(1, 3, vec![100; 4]));
    let events = h.display.subscribe();
    h.show(gray(0, 0, vec![200; 4]));

    let placeholder = events.drain().into_iter().any(|e| {
        matches!(
            e,
            DisplayEvent::ImageSubstituted {
                substitution: Substitution::Placeholder,
                ..
            }
        )
    });
    assert!(placeholder);
    assert_eq!(
        h.last_frame().pixel(0, 0),
        Some(default_channel_color(0).to_array())
    );
}

#[test]
fn test_nothing_to_draw_skips_paint() {
    let h = harness(DisplaySettings::new(), None);
    h.display.set_display_position(at(0, 0));
    assert!(h.display.wait_idle(WAIT));
    assert!(h.frames.lock().unwrap().is_empty());
    assert_eq!(h.display.contrast(0).unwrap(), None);
}

#[test]
fn test_profile_failure_only_warns() {
    let h = harness(DisplaySettings::new(), Some(Arc::new(ReadOnlyProfile)));
    h.show(gray(0, 0, vec![10, 20, 30, 40]));
    assert_eq!(h.display.stats().frames_painted, 1);
    assert_eq!(
        h.display.display_settings().channel(0).unwrap().ranges,
        vec![ComponentRange::new(10, 40)]
    );
}

#[test]
fn test_remembered_channel_settings_seed_new_display() {
    let profile = Arc::new(MemoryProfile::new());
    {
        let first = harness(DisplaySettings::new(), Some(profile.clone()));
        first.show(gray(0, 0, vec![10, 20, 30, 40]));
    }
    assert!(profile.load("Channel 0").is_some());

    let second = harness(
        DisplaySettings::new().with_autostretch(false),
        Some(profile.clone()),
    );
    second.show(gray(0, 0, vec![0, 100, 200, 250]));
    let contrast = second.display.contrast(0).unwrap().unwrap();
    assert_eq!(contrast.range(0), Some(ComponentRange::new(10, 40)));
    assert_eq!(
        second.display.display_settings().channel(0).unwrap().ranges,
        vec![ComponentRange::new(10, 40)]
    );
}

#[test]
fn test_gamma_near_one_snaps() {
    let h = harness(DisplaySettings::new(), None);
    h.show(gray(0, 0, vec![10, 20, 30, 40]));

    h.display.set_gamma(0, 1.05).unwrap();
    assert!(h.display.wait_idle(WAIT));
    let contrast = h.display.contrast(0).unwrap().unwrap();
    assert_relative_eq!(contrast.gamma(), 1.0);

    h.display.set_gamma(0, 2.0).unwrap();
    assert!(h.display.wait_idle(WAIT));
    let frame = h.last_frame();
    // (85 / 255)^2 * 255 = 28.3
    assert_eq!(frame.pixel(1, 0), Some([28, 28, 28]));
    assert_relative_eq!(h.display.display_settings().channel(0).unwrap().gamma, 2.0);
}

#[test]
fn test_histogram_updates_are_rate_limited() {
    let settings = DisplaySettings::new()
        .with_histogram_update_rate(HistogramUpdateRate::Every(Duration::from_secs(1)));
    let h = harness(settings, None);
    let start = Instant::now();

    for t in 0..4 {
        h.show(gray(0, t, vec![10, 20, 30, 40]));
    }
    assert_eq!(h.display.stats().frames_painted, 4);
    assert_eq!(h.display.stats().histogram_updates, 1);

    // The deferred update fires once, one period after the first.
    let settle = Duration::from_millis(1600).saturating_sub(start.elapsed());
    thread::sleep(settle);
    assert!(h.display.wait_idle(WAIT));
    assert_eq!(h.display.stats().histogram_updates, 2);
}

#[test]
fn test_manual_rate_still_measures_first_image() {
    let settings = DisplaySettings::new().with_histogram_update_rate(HistogramUpdateRate::Manual);
    let h = harness(settings, None);
    h.show(gray(0, 0, vec![10, 20, 30, 40]));
    h.show(gray(0, 1, vec![50, 60, 70, 80]));
    assert_eq!(h.display.stats().histogram_updates, 1);
    assert_eq!(
        h.display.contrast(0).unwrap().unwrap().range(0),
        Some(ComponentRange::new(10, 40))
    );

    h.display.refresh_histograms().unwrap();
    assert!(h.display.wait_idle(WAIT));
    assert_eq!(h.display.stats().histogram_updates, 2);
    assert_eq!(
        h.display.contrast(0).unwrap().unwrap().range(0),
        Some(ComponentRange::new(50, 80))
    );
}

#[test]
fn test_unsubscribe_stops_events() {
    let h = harness(DisplaySettings::new(), None);
    let events = h.display.subscribe();
    assert!(h.display.unsubscribe(events.id()));
    assert!(!h.display.unsubscribe(events.id()));
    h.show(gray(0, 0, vec![1, 2, 3, 4]));
    assert!(events.drain().is_empty());
}

#[test]
fn test_close_is_idempotent() {
    let mut h = harness(DisplaySettings::new(), None);
    h.show(gray(0, 0, vec![1, 2, 3, 4]));
    h.display.close();
    h.display.close();
    assert!(h.display.is_closed());
    assert!(matches!(h.display.set_gamma(0, 2.0), Err(Error::Closed(_))));
    assert!(h.display.contrast(0).is_err());
}

#[test]
fn test_display_names_are_unique() {
    let names = NameAllocator::new();
    let source = Arc::new(MemoryImageSource::new());
    let build = || {
        DisplayController::builder(
            source.clone(),
            Box::new(RecordingSink {
                frames: Arc::default(),
            }),
        )
        .build(&names)
        .unwrap()
    };
    let first = build();
    let second = build();
    assert_eq!(first.name(), "Preview");
    assert_eq!(second.name(), "Preview #2");
}

#[test]
fn test_commit_keeps_settings_installed_concurrently() {
    let store = Arc::new(InterleavingStore {
        inner: SettingsCell::new(DisplaySettings::new()),
        outside_edits: AtomicUsize::new(0),
    });
    let shared: Arc<dyn SettingsStore> = store.clone();
    let source = Arc::new(MemoryImageSource::new());
    let frames: Frames = Arc::new(Mutex::new(Vec::new()));
    let sink = RecordingSink {
        frames: Arc::clone(&frames),
    };
    let display = DisplayController::builder(source.clone(), Box::new(sink))
        .settings_store(shared)
        .build(&NameAllocator::new())
        .unwrap();

    let image = source.insert(gray(0, 0, vec![10, 20, 30, 40]));
    display.on_new_image(&image);
    assert!(display.wait_idle(WAIT));

    let settings = display.display_settings();
    let edits = store.outside_edits.load(Ordering::SeqCst);
    assert!(edits > 0);
    // Every outside toggle survived the render thread's own installs.
    assert_eq!(settings.roi_autoscale, edits % 2 == 0);
    assert_eq!(
        settings.channel(0).unwrap().ranges,
        vec![ComponentRange::new(10, 40)]
    );
    assert_eq!(frames.lock().unwrap().len(), 1);
}

#[test]
fn test_bit_depth_change_keeps_manual_range_clamped() {
    let h = harness(DisplaySettings::new().with_autostretch(false), None);
    let deep = Image::gray16(at(0, 0), 4, 1, &[1000, 2000, 3000, 4000], 12).unwrap();
    h.show(deep);
    let contrast = h.display.contrast(0).unwrap().unwrap();
    assert_eq!(contrast.range(0), Some(ComponentRange::new(1000, 4000)));
    assert_eq!(contrast.max_intensity(), 4095);

    h.show(gray(0, 1, vec![1, 2, 3, 4]));
    let contrast = h.display.contrast(0).unwrap().unwrap();
    assert_eq!(contrast.max_intensity(), 255);
    assert_eq!(contrast.range(0), Some(ComponentRange::new(254, 255)));
    assert_eq!(h.last_frame().pixel(3, 0), Some([0, 0, 0]));
}
