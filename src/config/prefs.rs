//! Preference surface.
//!
//! Preferences are the small key/value settings that live outside the
//! entity store (display name, grading system, active period). Imports
//! stage them in [`PendingPreferences`] and apply them only after the store
//! transaction has committed.

use std::path::{Path, PathBuf};

use serde_json::{Map, Value};
use tracing::debug;

use crate::portability::file::atomic_write_bytes;
use crate::portability::{PortResult, PortabilityError};

/// Preference keys carried in a package's `user_defaults`.
pub const USER_DEFAULT_KEYS: [&str; 8] = [
    "username",
    "profileSubtitle",
    "profileGradientStartHex",
    "profileGradientEndHex",
    "enableHaptics",
    "darkModeEnabled",
    "GradingSystem",
    ACTIVE_PERIOD_KEY,
];

/// Preference naming the active period.
pub const ACTIVE_PERIOD_KEY: &str = "activePeriodID";

/// Values waiting for a commit.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PendingPreferences {
    values: Map<String, Value>,
}

impl PendingPreferences {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stage the known keys of a package's `user_defaults`.
    #[must_use]
    pub fn from_user_defaults(defaults: &Map<String, Value>) -> Self {
        let mut pending = Self::new();
        for (key, value) in defaults {
            if USER_DEFAULT_KEYS.contains(&key.as_str()) {
                pending.stage(key, value.clone());
            } else {
                debug!(key = %key, "Ignoring unknown preference");
            }
        }
        pending
    }

    /// Stage a value, replacing any earlier one for the same key.
    pub fn stage(&mut self, key: &str, value: Value) {
        self.values.insert(key.to_string(), value);
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.values.iter()
    }
}

/// Key/value preference storage.
pub trait PreferenceStore: Send {
    fn get(&self, key: &str) -> Option<Value>;

    /// Every stored preference.
    fn snapshot(&self) -> Map<String, Value>;

    /// Write all staged values, or none of them.
    ///
    /// # Errors
    ///
    /// Returns `Preferences` if the values cannot be persisted.
    fn apply(&mut self, pending: &PendingPreferences) -> PortResult<()>;

    /// The package `user_defaults` for an export: the known keys only.
    fn user_defaults(&self) -> Map<String, Value> {
        self.snapshot()
            .into_iter()
            .filter(|(k, _)| USER_DEFAULT_KEYS.contains(&k.as_str()))
            .collect()
    }
}

/// Preferences persisted as a JSON object in one file.
#[derive(Debug)]
pub struct JsonPreferences {
    path: PathBuf,
    values: Map<String, Value>,
}

impl JsonPreferences {
    /// Load preferences from `path`. A missing file is an empty store.
    ///
    /// # Errors
    ///
    /// Returns `Preferences` if the file exists but is not a JSON object.
    pub fn open(path: &Path) -> PortResult<Self> {
        let values = match std::fs::read(path) {
            Ok(bytes) => serde_json::from_slice::<Map<String, Value>>(&bytes).map_err(|e| {
                PortabilityError::Preferences(format!("{}: {e}", path.display()))
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Map::new(),
            Err(e) => {
                return Err(PortabilityError::Preferences(format!(
                    "{}: {e}",
                    path.display()
                )));
            }
        };
        Ok(Self {
            path: path.to_path_buf(),
            values,
        })
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PreferenceStore for JsonPreferences {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn snapshot(&self) -> Map<String, Value> {
        self.values.clone()
    }

    fn apply(&mut self, pending: &PendingPreferences) -> PortResult<()> {
        if pending.is_empty() {
            return Ok(());
        }
        let mut next = self.values.clone();
        for (key, value) in pending.iter() {
            next.insert(key.clone(), value.clone());
        }
        let bytes = serde_json::to_vec_pretty(&next)
            .map_err(|e| PortabilityError::Preferences(e.to_string()))?;
        atomic_write_bytes(&self.path, &bytes)
            .map_err(|e| PortabilityError::Preferences(format!("{}: {e}", self.path.display())))?;
        self.values = next;
        Ok(())
    }
}

/// In-memory preferences.
#[derive(Debug, Default)]
pub struct MemoryPreferences {
    values: Map<String, Value>,
    fail_writes: bool,
}

impl MemoryPreferences {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose writes always fail.
    #[must_use]
    pub fn failing() -> Self {
        Self {
            values: Map::new(),
            fail_writes: true,
        }
    }
}

impl PreferenceStore for MemoryPreferences {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.get(key).cloned()
    }

    fn snapshot(&self) -> Map<String, Value> {
        self.values.clone()
    }

    fn apply(&mut self, pending: &PendingPreferences) -> PortResult<()> {
        if self.fail_writes {
            return Err(PortabilityError::Preferences("store is read-only".into()));
        }
        for (key, value) in pending.iter() {
            self.values.insert(key.clone(), value.clone());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn test_only_known_keys_are_staged() {
        let defaults = json!({
            "username": "Camille",
            "GradingSystem": "usa",
            "AppleLanguages": ["fr"]
        });
        let pending = PendingPreferences::from_user_defaults(defaults.as_object().unwrap());
        assert_eq!(pending.len(), 2);
    }

    #[test]
    fn test_json_preferences_persist() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("prefs/preferences.json");

        let mut prefs = JsonPreferences::open(&path).unwrap();
        assert!(prefs.snapshot().is_empty());

        let mut pending = PendingPreferences::new();
        pending.stage("username", json!("Camille"));
        pending.stage(ACTIVE_PERIOD_KEY, json!("p1"));
        prefs.apply(&pending).unwrap();

        let reopened = JsonPreferences::open(&path).unwrap();
        assert_eq!(reopened.get("username"), Some(json!("Camille")));
        assert_eq!(reopened.get(ACTIVE_PERIOD_KEY), Some(json!("p1")));
    }

    #[test]
    fn test_user_defaults_filters_unknown_keys() {
        let mut prefs = MemoryPreferences::new();
        let mut pending = PendingPreferences::new();
        pending.stage("darkModeEnabled", json!(true));
        pending.stage("lastSyncToken", json!("abc"));
        prefs.apply(&pending).unwrap();

        let defaults = prefs.user_defaults();
        assert_eq!(defaults.len(), 1);
        assert!(defaults.contains_key("darkModeEnabled"));
    }

    #[test]
    fn test_corrupt_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("preferences.json");
        std::fs::write(&path, "[1, 2]").unwrap();
        assert!(matches!(
            JsonPreferences::open(&path),
            Err(PortabilityError::Preferences(_))
        ));
    }

    #[test]
    fn test_failing_store_keeps_nothing() {
        let mut prefs = MemoryPreferences::failing();
        let mut pending = PendingPreferences::new();
        pending.stage("username", json!("x"));
        assert!(prefs.apply(&pending).is_err());
        assert!(prefs.get("username").is_none());
    }
}
