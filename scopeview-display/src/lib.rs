//! scopeview-display: Display runtime for multi-dimensional image datasets.
//!
//! This crate turns a stream of images into drawn frames:
//! - **Draw queue** - one render thread, coalescing bursts of requests
//! - **Histogram scheduling** - per-channel rate limiting with a debounce timer
//! - **Pipeline** - statistics, autostretch, lookup tables and composites
//! - **Controller** - the public handle for a display, plus event delivery
//!

mod controller;
mod draw_queue;
mod error;
pub mod events;
mod ids;
mod pipeline;
mod scheduler;
mod source;
mod state;
mod store;
mod sync;
mod timer;

pub use controller::{ControllerConfig, DisplayController, DisplayControllerBuilder};
pub use draw_queue::{DrawQueue, QueueHandle, QueuePhase, Renderer};
pub use error::{Error, Result};
pub use events::{DisplayEvent, EventBus, Subscription, SubscriptionId, Substitution};
pub use ids::NameAllocator;
pub use pipeline::{DisplayPipeline, PipelineStats, StatsSnapshot};
pub use scheduler::{HistogramScheduler, UpdateDecision};
pub use source::{ImageSource, MemoryImageSource, RenderSink};
pub use store::{ChannelProfile, MemoryProfile, SettingsCell, SettingsStore};
pub use timer::DebounceTimer;
