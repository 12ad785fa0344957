//! Collaborators that feed images in and take frames out.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use scopeview_algorithms::RgbFrame;
use scopeview_core::{Coords, Image};

use crate::error::Result;

/// Read access to a dataset of images.
///
/// Producers may add images concurrently, so `has_image` followed by
/// `image` can still miss; callers must handle `None`.
pub trait ImageSource: Send + Sync {
    /// Whether an image is stored at `coords`.
    fn has_image(&self, coords: &Coords) -> bool;

    /// Image at `coords`, if stored.
    fn image(&self, coords: &Coords) -> Option<Arc<Image>>;

    /// Number of indices seen along `axis`.
    fn axis_length(&self, axis: &str) -> usize;
}

/// Destination of rendered frames.
pub trait RenderSink: Send {
    /// Shows `frame`, which was drawn for `coords`.
    ///
    /// # Errors
    /// Implementations report failures as [`crate::Error::Sink`].
    fn paint(&mut self, frame: &RgbFrame, coords: &Coords) -> Result<()>;
}

/// In-memory dataset keyed by coordinates.
#[derive(Debug, Default)]
pub struct MemoryImageSource {
    images: RwLock<HashMap<Coords, Arc<Image>>>,
    extents: RwLock<HashMap<String, usize>>,
}

impl MemoryImageSource {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `image` under its own coordinates, replacing any previous one.
    pub fn insert(&self, image: Image) -> Arc<Image> {
        let image = Arc::new(image);
        {
            let mut extents = self.extents.write().unwrap_or_else(|e| e.into_inner());
            for (axis, index) in image.coords().axes() {
                let extent = extents.entry(axis.to_owned()).or_insert(0);
                *extent = (*extent).max(index + 1);
            }
        }
        self.images
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .insert(image.coords().clone(), Arc::clone(&image));
        image
    }

    /// Removes the image at `coords`.
    pub fn remove(&self, coords: &Coords) -> Option<Arc<Image>> {
        self.images
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .remove(coords)
    }

    /// Number of stored images.
    #[must_use]
    pub fn len(&self) -> usize {
        self.images.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl ImageSource for MemoryImageSource {
    fn has_image(&self, coords: &Coords) -> bool {
        self.images
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .contains_key(coords)
    }

    fn image(&self, coords: &Coords) -> Option<Arc<Image>> {
        self.images
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(coords)
            .cloned()
    }

    fn axis_length(&self, axis: &str) -> usize {
        self.extents
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .get(axis)
            .copied()
            .unwrap_or(0)
    }
}
