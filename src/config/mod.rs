//! Configuration management.
//!
//! Resolves where the store, the media directory and the preferences file
//! live, and carries the portability tunables.
//!
//! # Layout
//!
//! Everything lives under `~/.studyvault/` by default:
//! - **Database**: `~/.studyvault/data/studyvault.db`
//! - **Media**: `~/.studyvault/media/` (flat, one file per name)
//! - **Preferences**: `~/.studyvault/preferences.json`

pub mod prefs;

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::portability::preflight::{HEADROOM_FACTOR, MAX_PACKAGE_BYTES};

/// Get the global StudyVault directory location.
#[must_use]
pub fn global_studyvault_dir() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|b| b.home_dir().join(".studyvault"))
}

/// Check if test mode is enabled.
///
/// Test mode is enabled by setting `SV_TEST_DB=1` (or any non-empty value).
/// This redirects all database operations to an isolated test database.
#[must_use]
pub fn is_test_mode() -> bool {
    std::env::var("SV_TEST_DB").is_ok_and(|v| is_truthy(&v))
}

fn is_truthy(value: &str) -> bool {
    !value.is_empty() && value != "0" && !value.eq_ignore_ascii_case("false")
}

/// Get the test database path: `~/.studyvault/test/studyvault.db`.
#[must_use]
pub fn test_db_path() -> Option<PathBuf> {
    global_studyvault_dir().map(|dir| dir.join("test").join("studyvault.db"))
}

fn env_path(var: &str) -> Option<PathBuf> {
    std::env::var(var)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map(PathBuf::from)
}

/// Resolve the database path.
///
/// Priority:
/// 1. If `explicit_path` is provided, use it directly
/// 2. `SV_TEST_DB` environment variable → uses test database
/// 3. `STUDYVAULT_DB` environment variable
/// 4. Global location: `~/.studyvault/data/studyvault.db`
#[must_use]
pub fn resolve_db_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return Some(path.to_path_buf());
    }
    if is_test_mode() {
        return test_db_path();
    }
    if let Some(path) = env_path("STUDYVAULT_DB") {
        return Some(path);
    }
    global_studyvault_dir().map(|dir| dir.join("data").join("studyvault.db"))
}

/// Resolve the media directory.
///
/// Priority: explicit flag, `STUDYVAULT_MEDIA`, then `media/` next to the
/// database when a database path was given explicitly, then
/// `~/.studyvault/media`.
#[must_use]
pub fn resolve_media_dir(explicit: Option<&Path>, db_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(path) = env_path("STUDYVAULT_MEDIA") {
        return Some(path);
    }
    if let Some(parent) = db_path.and_then(Path::parent) {
        return Some(parent.join("media"));
    }
    global_studyvault_dir().map(|dir| dir.join("media"))
}

/// Resolve the preferences file.
///
/// Priority: explicit flag, `preferences.json` next to the database when a
/// database path was given, then `~/.studyvault/preferences.json`.
#[must_use]
pub fn resolve_prefs_path(explicit: Option<&Path>, db_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    if let Some(parent) = db_path.and_then(Path::parent) {
        return Some(parent.join("preferences.json"));
    }
    global_studyvault_dir().map(|dir| dir.join("preferences.json"))
}

/// Get the default actor name.
///
/// Priority:
/// 1. `SV_ACTOR` environment variable
/// 2. System username
/// 3. "unknown"
#[must_use]
pub fn default_actor() -> String {
    for var in ["SV_ACTOR", "USER", "USERNAME"] {
        if let Ok(actor) = std::env::var(var) {
            if !actor.is_empty() {
                return actor;
            }
        }
    }
    "unknown".to_string()
}

/// Tunables for export and import.
#[derive(Debug, Clone)]
pub struct PortOptions {
    /// Largest package accepted for import.
    pub max_package_bytes: u64,
    /// Free space required on the media volume, as a multiple of the package size.
    pub headroom_factor: u64,
    /// Media files copied per batch during import.
    pub media_batch_size: usize,
    /// Pause between media batches.
    pub media_batch_pause: Duration,
    /// JPEG quality for images bundled on export.
    pub jpeg_quality: u8,
    /// Version written into package metadata.
    pub app_version: String,
    /// Actor recorded in audit events.
    pub actor: String,
}

impl Default for PortOptions {
    fn default() -> Self {
        Self {
            max_package_bytes: MAX_PACKAGE_BYTES,
            headroom_factor: HEADROOM_FACTOR,
            media_batch_size: 10,
            media_batch_pause: Duration::from_millis(100),
            jpeg_quality: crate::portability::export::DEFAULT_JPEG_QUALITY,
            app_version: env!("CARGO_PKG_VERSION").to_string(),
            actor: default_actor(),
        }
    }
}

impl PortOptions {
    #[must_use]
    pub fn with_actor(mut self, actor: &str) -> Self {
        self.actor = actor.to_string();
        self
    }
}
