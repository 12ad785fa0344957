//! Settings storage: the live display settings and remembered channel
//! settings that outlive a display.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use log::debug;

use scopeview_core::{ChannelSettings, DisplaySettings};

use crate::error::Result;
use crate::sync::lock;

/// Holder of the current display settings snapshot.
pub trait SettingsStore: Send + Sync {
    /// Current snapshot.
    fn display_settings(&self) -> Arc<DisplaySettings>;

    /// Installs `settings` under a new version and returns the installed
    /// snapshot.
    fn set_display_settings(&self, settings: DisplaySettings) -> Arc<DisplaySettings>;

    /// Installs `settings` only if the current snapshot still carries
    /// version `expected`.
    ///
    /// # Errors
    /// Returns the newer current snapshot if another install came first.
    fn compare_and_set(
        &self,
        expected: u64,
        settings: DisplaySettings,
    ) -> std::result::Result<Arc<DisplaySettings>, Arc<DisplaySettings>>;

    /// Derives new settings from the current snapshot with `edit` and
    /// installs them. `edit` runs again on the newer snapshot whenever
    /// another install wins the race. Returns `None` if `edit` does.
    fn update(
        &self,
        edit: &mut dyn FnMut(&DisplaySettings) -> Option<DisplaySettings>,
    ) -> Option<Arc<DisplaySettings>> {
        let mut current = self.display_settings();
        loop {
            let next = edit(&current)?;
            match self.compare_and_set(current.version, next) {
                Ok(installed) => return Some(installed),
                Err(newer) => {
                    debug!(
                        "settings v{} replaced while editing, retrying on v{}",
                        current.version, newer.version
                    );
                    current = newer;
                }
            }
        }
    }
}

/// In-memory [`SettingsStore`].
#[derive(Debug)]
pub struct SettingsCell {
    current: Mutex<Arc<DisplaySettings>>,
}

impl SettingsCell {
    #[must_use]
    pub fn new(initial: DisplaySettings) -> Self {
        Self {
            current: Mutex::new(Arc::new(initial)),
        }
    }
}

impl Default for SettingsCell {
    fn default() -> Self {
        Self::new(DisplaySettings::default())
    }
}

impl SettingsStore for SettingsCell {
    fn display_settings(&self) -> Arc<DisplaySettings> {
        Arc::clone(&lock(&self.current))
    }

    fn set_display_settings(&self, settings: DisplaySettings) -> Arc<DisplaySettings> {
        let mut current = lock(&self.current);
        let version = current.version + 1;
        let installed = Arc::new(settings.with_version(version));
        *current = Arc::clone(&installed);
        installed
    }

    fn compare_and_set(
        &self,
        expected: u64,
        settings: DisplaySettings,
    ) -> std::result::Result<Arc<DisplaySettings>, Arc<DisplaySettings>> {
        let mut current = lock(&self.current);
        if current.version != expected {
            return Err(Arc::clone(&current));
        }
        let installed = Arc::new(settings.with_version(expected + 1));
        *current = Arc::clone(&installed);
        Ok(installed)
    }
}

/// Per-user memory of channel settings, keyed by channel name.
pub trait ChannelProfile: Send + Sync {
    /// Remembered settings for the channel called `name`.
    fn load(&self, name: &str) -> Option<ChannelSettings>;

    /// Remembers `settings` under its name.
    ///
    /// # Errors
    /// Returns [`crate::Error::Profile`] if the settings cannot be stored.
    fn save(&self, settings: &ChannelSettings) -> Result<()>;
}

/// In-memory [`ChannelProfile`].
#[derive(Debug, Default)]
pub struct MemoryProfile {
    channels: Mutex<HashMap<String, ChannelSettings>>,
}

impl MemoryProfile {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ChannelProfile for MemoryProfile {
    fn load(&self, name: &str) -> Option<ChannelSettings> {
        lock(&self.channels).get(name).cloned()
    }

    fn save(&self, settings: &ChannelSettings) -> Result<()> {
        lock(&self.channels).insert(settings.name.clone(), settings.clone());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_versions_increase() {
        let store = SettingsCell::default();
        assert_eq!(store.display_settings().version, 0);
        let first = store.set_display_settings(DisplaySettings::new());
        let second = store.set_display_settings(DisplaySettings::new().with_version(0));
        assert_eq!(first.version, 1);
        assert_eq!(second.version, 2);
        assert!(Arc::ptr_eq(&second, &store.display_settings()));
    }

    #[test]
    fn test_compare_and_set_rejects_stale_version() {
        let store = SettingsCell::default();
        let stale = store.display_settings();
        store.set_display_settings(DisplaySettings::new().with_autostretch(false));

        let rejected = store
            .compare_and_set(stale.version, (*stale).clone().with_log_histogram(true))
            .unwrap_err();
        assert_eq!(rejected.version, 1);
        assert!(!store.display_settings().log_histogram);

        let installed = store
            .compare_and_set(1, (*rejected).clone().with_log_histogram(true))
            .unwrap();
        assert_eq!(installed.version, 2);
        assert!(installed.log_histogram);
        assert!(!installed.autostretch);
    }

    #[test]
    fn test_update_retries_on_newer_snapshot() {
        let store = SettingsCell::default();
        let mut attempts = 0;
        let installed = store
            .update(&mut |current| {
                attempts += 1;
                if attempts == 1 {
                    // Another writer gets in between the read and the install.
                    store.set_display_settings(current.clone().with_autostretch(false));
                }
                Some(current.clone().with_log_histogram(true))
            })
            .unwrap();
        assert_eq!(attempts, 2);
        assert_eq!(installed.version, 2);
        assert!(installed.log_histogram);
        assert!(!installed.autostretch);

        assert!(store.update(&mut |_| None).is_none());
        assert_eq!(store.display_settings().version, 2);
    }

    #[test]
    fn test_profile_round_trip() {
        let profile = MemoryProfile::new();
        let settings = ChannelSettings::default_for(1).with_name("DAPI");
        profile.save(&settings).unwrap();
        assert_eq!(profile.load("DAPI"), Some(settings));
        assert!(profile.load("GFP").is_none());
    }
}
