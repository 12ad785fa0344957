//! Unique display names.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::sync::lock;

/// Hands out display names that are unique within one allocator.
///
/// The first request for a base name returns it unchanged; later requests
/// append ` #2`, ` #3`, and so on.
#[derive(Debug, Default)]
pub struct NameAllocator {
    counts: Mutex<HashMap<String, usize>>,
}

impl NameAllocator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a fresh name derived from `base`.
    pub fn allocate(&self, base: &str) -> String {
        let mut counts = lock(&self.counts);
        let count = counts.entry(base.to_owned()).or_insert(0);
        *count += 1;
        if *count == 1 {
            base.to_owned()
        } else {
            format!("{base} #{count}")
        }
    }
}
