//! Command implementations.

pub mod export;
pub mod import;
pub mod init;
pub mod reconcile;
pub mod status;
pub mod validate;
pub mod version;

use std::future::Future;
use std::path::PathBuf;

use crate::cli::GlobalArgs;
use crate::config::prefs::JsonPreferences;
use crate::config::{PortOptions, resolve_db_path, resolve_media_dir, resolve_prefs_path};
use crate::error::{Error, Result};
use crate::portability::Porter;
use crate::storage::SqliteStorage;

/// Resolve the database path and require that it was initialized.
pub(crate) fn existing_db_path(args: &GlobalArgs) -> Result<PathBuf> {
    let db_path = resolve_db_path(args.db.as_deref()).ok_or(Error::NotInitialized)?;
    if !db_path.exists() {
        return Err(Error::NotInitialized);
    }
    Ok(db_path)
}

/// Open the preferences file that belongs to `db_path`.
pub(crate) fn open_prefs(args: &GlobalArgs, db_path: &std::path::Path) -> Result<JsonPreferences> {
    let path = resolve_prefs_path(args.prefs.as_deref(), Some(db_path))
        .ok_or_else(|| Error::Config("Could not determine preferences path".to_string()))?;
    Ok(JsonPreferences::open(&path)?)
}

/// Build an engine over the initialized store.
pub(crate) fn open_porter(args: &GlobalArgs) -> Result<Porter> {
    let db_path = existing_db_path(args)?;
    let media_dir = resolve_media_dir(args.media_dir.as_deref(), Some(&db_path))
        .ok_or_else(|| Error::Config("Could not determine media directory".to_string()))?;
    let prefs = open_prefs(args, &db_path)?;
    let storage = SqliteStorage::open(&db_path)?;

    let mut options = PortOptions::default();
    if let Some(actor) = &args.actor {
        options = options.with_actor(actor);
    }
    Ok(Porter::new(storage, Box::new(prefs), &media_dir).with_options(options))
}

/// Drive an async engine call to completion.
pub(crate) fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let rt = tokio::runtime::Runtime::new()
        .map_err(|e| Error::Other(format!("Failed to create async runtime: {e}")))?;
    Ok(rt.block_on(future))
}
