//! Display preferences that outlive any session.

use std::path::Path;
use std::sync::{PoisonError, RwLock};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use cartsync_core::ThemeMode;

use crate::services::persist::{JsonFile, PersistError};

/// File name of the preferences document inside the data directory.
pub const PREFERENCES_FILE: &str = "preferences.json";

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
struct Preferences {
    #[serde(rename = "themeMode", default)]
    theme_mode: ThemeMode,
}

/// Preference store.
#[derive(Debug)]
pub struct PreferenceStore {
    file: Option<JsonFile>,
    current: RwLock<Preferences>,
}

impl PreferenceStore {
    /// Open the store backed by `data_dir/preferences.json`.
    #[must_use]
    pub fn open(data_dir: &Path) -> Self {
        let file = JsonFile::new(data_dir.join(PREFERENCES_FILE));
        let current = file.load::<Preferences>().unwrap_or_else(|e| {
            warn!(error = %e, "Discarding unreadable preferences");
            None
        });
        Self {
            file: Some(file),
            current: RwLock::new(current.unwrap_or_default()),
        }
    }

    #[must_use]
    pub fn ephemeral() -> Self {
        Self {
            file: None,
            current: RwLock::new(Preferences::default()),
        }
    }

    #[must_use]
    pub fn theme(&self) -> ThemeMode {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .theme_mode
    }

    /// # Errors
    ///
    /// Returns an error if the preferences document cannot be written.
    pub fn set_theme(&self, mode: ThemeMode) -> Result<(), PersistError> {
        let mut guard = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let updated = Preferences { theme_mode: mode };
        if let Some(file) = &self.file {
            file.store(&updated)?;
        }
        *guard = updated;
        debug!(theme = %mode, "Theme updated");
        Ok(())
    }

    /// Flip between light and dark, returning the new mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the preferences document cannot be written.
    pub fn toggle_theme(&self) -> Result<ThemeMode, PersistError> {
        let next = self.theme().toggled();
        self.set_theme(next)?;
        Ok(next)
    }
}
