//! Sparse N-dimensional coordinates addressing one image in a dataset.

use std::collections::BTreeMap;
use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Channel axis name.
pub const CHANNEL: &str = "channel";
/// Focal plane axis name.
pub const Z: &str = "z";
/// Time point axis name.
pub const TIME: &str = "time";
/// Stage position axis name.
pub const STAGE_POSITION: &str = "position";

/// Mapping from axis name to non-negative index.
///
/// Axes that are absent are treated as unspecified. Equality and hashing
/// ignore the order in which axes were added.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct Coords {
    axes: BTreeMap<String, usize>,
}

impl Coords {
    /// Creates empty coordinates.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns these coordinates with `axis` set to `index`.
    #[must_use]
    pub fn with(mut self, axis: impl Into<String>, index: usize) -> Self {
        self.axes.insert(axis.into(), index);
        self
    }

    /// Returns these coordinates with `axis` removed.
    #[must_use]
    pub fn without(mut self, axis: &str) -> Self {
        self.axes.remove(axis);
        self
    }

    /// Index along `axis`, if present.
    #[inline]
    #[must_use]
    pub fn index(&self, axis: &str) -> Option<usize> {
        self.axes.get(axis).copied()
    }

    /// Whether `axis` is present.
    #[inline]
    #[must_use]
    pub fn has_axis(&self, axis: &str) -> bool {
        self.axes.contains_key(axis)
    }

    /// Channel index; an absent channel axis means channel 0.
    #[inline]
    #[must_use]
    pub fn channel(&self) -> usize {
        self.index(CHANNEL).unwrap_or(0)
    }

    /// Returns these coordinates with the channel axis set.
    #[must_use]
    pub fn with_channel(&self, channel: usize) -> Self {
        self.clone().with(CHANNEL, channel)
    }

    /// Iterates axes in name order.
    pub fn axes(&self) -> impl Iterator<Item = (&str, usize)> {
        self.axes.iter().map(|(k, v)| (k.as_str(), *v))
    }

    /// Number of specified axes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.axes.len()
    }

    /// Whether no axis is specified.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.axes.is_empty()
    }
}

impl<S: Into<String>> FromIterator<(S, usize)> for Coords {
    fn from_iter<T: IntoIterator<Item = (S, usize)>>(iter: T) -> Self {
        Self {
            axes: iter.into_iter().map(|(k, v)| (k.into(), v)).collect(),
        }
    }
}

impl fmt::Display for Coords {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.axes.is_empty() {
            return write!(f, "<origin>");
        }
        for (i, (axis, index)) in self.axes().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{axis}={index}")?;
        }
        Ok(())
    }
}
