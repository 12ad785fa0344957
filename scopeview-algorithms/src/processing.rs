//! Whole-image processing helpers built on the per-component algorithms.

use rayon::prelude::*;

use scopeview_core::{Image, Result};

use crate::histogram::{compute_histogram, HistogramConfig, HistogramResult};

/// Computes histograms for every component of `image`, in parallel.
///
/// Results are ordered by component index.
///
/// # Errors
/// Returns the first error any component produced.
pub fn compute_all_components(
    image: &Image,
    config: &HistogramConfig,
) -> Result<Vec<HistogramResult>> {
    if image.num_components() == 1 {
        return Ok(vec![compute_histogram(image, 0, config)?]);
    }
    (0..image.num_components())
        .into_par_iter()
        .map(|component| compute_histogram(image, component, config))
        .collect()
}
