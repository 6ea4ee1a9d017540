//! Initialize the StudyVault store.
//!
//! Creates the SQLite database (schema is applied on open), the media
//! directory next to it, and leaves the preferences file to be created on
//! first write.

use crate::cli::GlobalArgs;
use crate::config::{resolve_db_path, resolve_media_dir, resolve_prefs_path};
use crate::error::{Error, Result};
use crate::storage::SqliteStorage;
use colored::Colorize;
use serde::Serialize;
use std::fs;
use std::path::PathBuf;

#[derive(Serialize)]
struct InitOutput {
    database: PathBuf,
    media_dir: PathBuf,
    preferences: PathBuf,
}

/// Execute the init command.
///
/// # Errors
///
/// Returns `AlreadyInitialized` if the database exists and `force` is not
/// set, or an error if the directories or database cannot be created.
pub fn execute(args: &GlobalArgs, force: bool, json: bool) -> Result<()> {
    let db_path = resolve_db_path(args.db.as_deref()).ok_or_else(|| {
        Error::Config("Could not determine StudyVault database path".to_string())
    })?;

    if db_path.exists() {
        if !force {
            return Err(Error::AlreadyInitialized { path: db_path });
        }
        fs::remove_file(&db_path)?;
        for suffix in ["-wal", "-shm"] {
            let sidecar = PathBuf::from(format!("{}{suffix}", db_path.display()));
            if sidecar.exists() {
                fs::remove_file(sidecar)?;
            }
        }
    }

    if let Some(parent) = db_path.parent() {
        fs::create_dir_all(parent)?;
    }
    SqliteStorage::open(&db_path)?;

    let media_dir = resolve_media_dir(args.media_dir.as_deref(), Some(&db_path))
        .ok_or_else(|| Error::Config("Could not determine media directory".to_string()))?;
    fs::create_dir_all(&media_dir)?;

    let preferences = resolve_prefs_path(args.prefs.as_deref(), Some(&db_path))
        .ok_or_else(|| Error::Config("Could not determine preferences path".to_string()))?;

    if json {
        let output = InitOutput {
            database: db_path,
            media_dir,
            preferences,
        };
        println!("{}", serde_json::to_string(&output)?);
    } else {
        println!("{}", "Initialized StudyVault database".green());
        println!("  Database:    {}", db_path.display());
        println!("  Media:       {}", media_dir.display());
        println!("  Preferences: {}", preferences.display());
    }

    Ok(())
}
