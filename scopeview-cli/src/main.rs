//! scopeview command-line interface.
//!
//! Streams synthetic acquisitions through a display and dumps lookup tables
//! and image statistics for inspection.
#![allow(
    clippy::uninlined_format_args,
    clippy::cast_possible_truncation,
    clippy::cast_sign_loss,
    clippy::cast_precision_loss,
    clippy::cast_lossless,
    clippy::too_many_arguments,
    clippy::too_many_lines
)]

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand, ValueEnum};
use log::{info, warn};
use serde::Serialize;
use thiserror::Error;

use scopeview_algorithms::{compute_all_components, ContrastState, HistogramConfig, Lut, RgbFrame};
use scopeview_core::coords::TIME;
use scopeview_core::{
    ChannelSettings, ColorMode, Coords, DisplaySettings, HistogramUpdateRate, Image,
    ImageMetadata, Rgb,
};
use scopeview_display::{
    ControllerConfig, DisplayController, MemoryImageSource, NameAllocator, RenderSink, StatsSnapshot,
};

/// Result type for CLI operations.
type Result<T> = std::result::Result<T, CliError>;

/// CLI error types.
#[derive(Error, Debug)]
enum CliError {
    #[error("Core error: {0}")]
    Core(#[from] scopeview_core::Error),

    #[error("Display error: {0}")]
    Display(#[from] scopeview_display::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Producer thread panicked")]
    Producer,

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

/// Display color mode.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Mode {
    /// Black to white
    Grayscale,
    /// Black to the channel color
    Color,
    /// Channels blended additively in their colors
    Composite,
    /// Grayscale with clipped pixels marked blue and red
    HighlightLimits,
    /// ImageJ "Fire" palette
    Fire,
    /// Black-red-yellow-white palette
    RedHot,
    /// Hue wheel
    Spectrum,
}

impl From<Mode> for ColorMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Grayscale => ColorMode::Grayscale,
            Mode::Color => ColorMode::Color,
            Mode::Composite => ColorMode::Composite,
            Mode::HighlightLimits => ColorMode::HighlightLimits,
            Mode::Fire => ColorMode::Fire,
            Mode::RedHot => ColorMode::RedHot,
            Mode::Spectrum => ColorMode::Spectrum,
        }
    }
}

/// Synthetic image content.
#[derive(Debug, Clone, Copy, ValueEnum)]
enum Pattern {
    /// Horizontal ramp over the full bit depth
    Ramp,
    /// Every pixel at half scale
    Uniform,
    /// Dim background with a bright spot that drifts between frames
    Spots,
}

/// Display pipeline simulator and inspection tools.
#[derive(Parser)]
#[command(name = "scopeview")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stream synthetic frames into a display and report what was drawn
    Simulate {
        /// Number of channels per frame
        #[arg(short, long, default_value = "2")]
        channels: usize,

        /// Number of frames (time points) to produce
        #[arg(short, long, default_value = "100")]
        frames: usize,

        /// Image width in pixels
        #[arg(long, default_value = "256")]
        width: usize,

        /// Image height in pixels
        #[arg(long, default_value = "256")]
        height: usize,

        /// Significant bits per sample (1-16)
        #[arg(long, default_value = "12")]
        bit_depth: u8,

        /// Image content
        #[arg(long, value_enum, default_value = "spots")]
        pattern: Pattern,

        /// Delay between frames (milliseconds)
        #[arg(long, default_value = "2")]
        interval_ms: u64,

        /// Time the sink spends painting each frame (milliseconds)
        #[arg(long, default_value = "15")]
        paint_ms: u64,

        /// Histogram update interval in seconds; 0 updates every frame,
        /// negative values update only on request
        #[arg(long, default_value = "0.0", allow_hyphen_values = true)]
        update_rate: f64,

        /// Percentage of pixels ignored at each end when autostretching
        #[arg(long, default_value = "0.0")]
        trim: f64,

        /// Display color mode
        #[arg(short, long, value_enum, default_value = "composite")]
        mode: Mode,

        /// Pretty-print the JSON summary
        #[arg(long)]
        pretty: bool,
    },

    /// Print the lookup table for a color mode
    Lut {
        /// Display color mode
        #[arg(short, long, value_enum, default_value = "grayscale")]
        mode: Mode,

        /// Display gamma
        #[arg(short, long, default_value = "1.0")]
        gamma: f64,

        /// Channel color for color and composite modes
        #[arg(short, long, default_value = "#ffffff")]
        color: Rgb,

        /// Print every n-th entry
        #[arg(long, default_value = "16")]
        step: usize,

        /// Print all entries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print histogram statistics of a synthetic image
    Stats {
        /// Image content
        #[arg(long, value_enum, default_value = "ramp")]
        pattern: Pattern,

        /// Image width in pixels
        #[arg(long, default_value = "512")]
        width: usize,

        /// Image height in pixels
        #[arg(long, default_value = "512")]
        height: usize,

        /// Significant bits per sample (1-16)
        #[arg(long, default_value = "8")]
        bit_depth: u8,

        /// Log2 of the number of bins
        #[arg(long, default_value = "8")]
        bin_power: u8,

        /// Percentage of pixels ignored at each end for the trimmed range
        #[arg(long, default_value = "0.0")]
        trim: f64,

        /// Also compute the standard deviation
        #[arg(long)]
        std_dev: bool,

        /// Include the bin counts in the output
        #[arg(long)]
        bins: bool,
    },
}

/// Sink that only counts frames, taking a fixed time per paint.
struct CountingSink {
    painted: Arc<AtomicU64>,
    delay: Duration,
}

impl RenderSink for CountingSink {
    fn paint(&mut self, _frame: &RgbFrame, _coords: &Coords) -> scopeview_display::Result<()> {
        if !self.delay.is_zero() {
            thread::sleep(self.delay);
        }
        self.painted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }
}

#[derive(Serialize)]
struct SimulationSummary {
    display: String,
    frames_produced: usize,
    images_produced: usize,
    passes_rendered: u64,
    elapsed_ms: f64,
    stats: StatsSnapshot,
    contrast: Vec<Option<ContrastState>>,
    settings: DisplaySettings,
}

#[derive(Serialize)]
struct LutEntry {
    index: usize,
    color: Rgb,
}

/// Builds a single-component synthetic image at `coords`.
fn synthesize(
    coords: Coords,
    pattern: Pattern,
    width: usize,
    height: usize,
    bit_depth: u8,
    frame: usize,
    channel: usize,
) -> Result<Image> {
    if bit_depth == 0 || bit_depth > 16 {
        return Err(CliError::InvalidArgument(format!(
            "bit depth must be in 1..=16, got {}",
            bit_depth
        )));
    }
    let max = (1u32 << bit_depth) - 1;
    let radius = (width.min(height) / 8).max(1);
    let spot_x = (frame * 7 + channel * width / 3) % width.max(1);
    let spot_y = height / 2;

    let value = |x: usize, y: usize| -> u32 {
        match pattern {
            Pattern::Ramp => (x as u64 * u64::from(max) / (width.max(2) - 1) as u64) as u32,
            Pattern::Uniform => max / 2,
            Pattern::Spots => {
                let dx = x.abs_diff(spot_x);
                let dy = y.abs_diff(spot_y);
                if dx * dx + dy * dy <= radius * radius {
                    max
                } else {
                    max / 16 + (channel as u32 * max / 64)
                }
            }
        }
    };

    let samples: Vec<u32> = (0..height)
        .flat_map(|y| (0..width).map(move |x| (x, y)))
        .map(|(x, y)| value(x, y).min(max))
        .collect();

    let metadata = ImageMetadata::default()
        .with_bit_depth(bit_depth)
        .with_sequence(frame as u64);
    let image = if bit_depth <= 8 {
        let bytes: Vec<u8> = samples.iter().map(|&v| v as u8).collect();
        Image::new(coords, width, height, 1, 1, bytes, metadata)?
    } else {
        let bytes: Vec<u8> = samples
            .iter()
            .flat_map(|&v| (v as u16).to_le_bytes())
            .collect();
        Image::new(coords, width, height, 2, 1, bytes, metadata)?
    };
    Ok(image)
}

fn print_json<T: Serialize>(value: &T, pretty: bool) -> Result<()> {
    let text = if pretty {
        serde_json::to_string_pretty(value)?
    } else {
        serde_json::to_string(value)?
    };
    println!("{}", text);
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Simulate {
            channels,
            frames,
            width,
            height,
            bit_depth,
            pattern,
            interval_ms,
            paint_ms,
            update_rate,
            trim,
            mode,
            pretty,
        } => {
            if channels == 0 {
                return Err(CliError::InvalidArgument(
                    "at least one channel is required".to_string(),
                ));
            }

            let settings = DisplaySettings::new()
                .with_color_mode(mode.into())
                .with_histogram_update_rate(HistogramUpdateRate::from_seconds(update_rate))
                .with_extrema_percentage(trim);
            let source = Arc::new(MemoryImageSource::new());
            let painted = Arc::new(AtomicU64::new(0));
            let sink = CountingSink {
                painted: Arc::clone(&painted),
                delay: Duration::from_millis(paint_ms),
            };
            let names = NameAllocator::new();
            let mut display = DisplayController::builder(source.clone(), Box::new(sink))
                .config(ControllerConfig::new().with_name("Simulator"))
                .settings(settings)
                .build(&names)?;

            info!(
                "simulating {} frames x {} channels ({}x{}, {}-bit) into '{}'",
                frames,
                channels,
                width,
                height,
                bit_depth,
                display.name()
            );

            let start = Instant::now();
            let interval = Duration::from_millis(interval_ms);
            let images_produced = thread::scope(|scope| {
                let display = &display;
                let source = &source;
                let producer = scope.spawn(move || -> Result<usize> {
                    let mut produced = 0usize;
                    for frame in 0..frames {
                        for channel in 0..channels {
                            let coords = Coords::new().with(TIME, frame).with_channel(channel);
                            let image = synthesize(
                                coords, pattern, width, height, bit_depth, frame, channel,
                            )?;
                            let image = source.insert(image);
                            display.on_new_image(&image);
                            produced += 1;
                        }
                        if !interval.is_zero() {
                            thread::sleep(interval);
                        }
                    }
                    Ok(produced)
                });
                producer.join().map_err(|_| CliError::Producer)?
            })?;

            if !display.wait_idle(Duration::from_secs(60)) {
                warn!("display did not settle within 60 s");
            }
            let elapsed_ms = start.elapsed().as_secs_f64() * 1000.0;

            let contrast = (0..channels)
                .map(|channel| display.contrast(channel))
                .collect::<std::result::Result<Vec<_>, _>>()?;
            let summary = SimulationSummary {
                display: display.name().to_string(),
                frames_produced: frames,
                images_produced,
                passes_rendered: painted.load(Ordering::Relaxed),
                elapsed_ms,
                stats: display.stats(),
                contrast,
                settings: (*display.display_settings()).clone(),
            };
            display.close();

            info!(
                "{} images drawn in {} passes ({:.1} ms)",
                summary.images_produced, summary.passes_rendered, summary.elapsed_ms
            );
            print_json(&summary, pretty)?;
        }

        Commands::Lut {
            mode,
            gamma,
            color,
            step,
            json,
        } => {
            let channel = ChannelSettings {
                gamma,
                ..ChannelSettings::default_for(0).with_color(color)
            };
            let lut = Lut::for_channel(mode.into(), &channel, None);
            let entries: Vec<LutEntry> = lut
                .entries()
                .iter()
                .enumerate()
                .map(|(index, &entry)| LutEntry {
                    index,
                    color: Rgb::from(entry),
                })
                .collect();

            if json {
                print_json(&entries, true)?;
            } else {
                println!("Mode: {:?}, gamma {}, color {}", mode, gamma, color);
                for entry in entries.iter().step_by(step.max(1)) {
                    println!("{:>3}  {}", entry.index, entry.color);
                }
                if let Some(last) = entries.last() {
                    if last.index % step.max(1) != 0 {
                        println!("{:>3}  {}", last.index, last.color);
                    }
                }
            }
        }

        Commands::Stats {
            pattern,
            width,
            height,
            bit_depth,
            bin_power,
            trim,
            std_dev,
            bins,
        } => {
            let image = synthesize(Coords::new(), pattern, width, height, bit_depth, 0, 0)?;
            let config = HistogramConfig::new()
                .with_bin_power(bin_power)
                .with_trim_percent(trim)
                .with_std_dev(std_dev);

            let start = Instant::now();
            let mut histograms = compute_all_components(&image, &config)?;
            info!(
                "computed {} histogram(s) over {} pixels in {:.2?}",
                histograms.len(),
                image.pixel_count(),
                start.elapsed()
            );
            if !bins {
                for histogram in &mut histograms {
                    histogram.bins.clear();
                }
            }
            print_json(&histograms, true)?;
        }
    }

    Ok(())
}
