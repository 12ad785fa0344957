//! Error types for scopeview-display.

use thiserror::Error;

/// Result type alias for display operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Display runtime errors.
#[derive(Error, Debug)]
pub enum Error {
    /// Core data model error.
    #[error("core error: {0}")]
    Core(#[from] scopeview_core::Error),

    /// A worker thread could not be started.
    #[error("failed to spawn {name} thread: {source}")]
    Spawn {
        name: String,
        #[source]
        source: std::io::Error,
    },

    /// The display has been closed.
    #[error("display '{0}' is closed")]
    Closed(String),

    /// The render sink rejected a frame.
    #[error("render sink failed: {0}")]
    Sink(String),

    /// Remembered channel settings could not be stored.
    #[error("channel profile error: {0}")]
    Profile(String),
}
