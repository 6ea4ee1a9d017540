//! Status command implementation.

use super::{existing_db_path, open_prefs};
use crate::cli::GlobalArgs;
use crate::config::prefs::{ACTIVE_PERIOD_KEY, PreferenceStore};
use crate::error::Result;
use crate::storage::EntityCounts;
use crate::storage::SqliteStorage;
use crate::storage::sqlite::fetch_user_configurations;
use colored::Colorize;
use serde::Serialize;
use std::path::PathBuf;

/// Output for status command.
#[derive(Serialize)]
struct StatusOutput {
    database: PathBuf,
    counts: EntityCounts,
    active_period: Option<ActivePeriod>,
    /// Active period named by the preferences file, if it disagrees with the store.
    #[serde(skip_serializing_if = "Option::is_none")]
    preference_pointer: Option<String>,
}

#[derive(Serialize)]
struct ActivePeriod {
    id: String,
    name: String,
}

/// Execute status command.
///
/// # Errors
///
/// Returns `NotInitialized` if there is no database, or an error if the
/// store or preferences cannot be read.
pub fn execute(args: &GlobalArgs, json: bool) -> Result<()> {
    let db_path = existing_db_path(args)?;
    let storage = SqliteStorage::open(&db_path)?;
    let counts = storage.counts()?;

    let stored = fetch_user_configurations(storage.conn())?
        .into_iter()
        .find_map(|config| config.active_period_id);
    let preference = open_prefs(args, &db_path)?
        .get(ACTIVE_PERIOD_KEY)
        .and_then(|v| v.as_str().map(str::to_string));

    // Profiles carry the pointer when present; the preference covers stores without one
    let pointer = stored.clone().or_else(|| preference.clone());
    let active_period = match &pointer {
        Some(id) => storage.get_period(id)?.map(|p| ActivePeriod {
            id: p.id,
            name: p.name,
        }),
        None => None,
    };
    let preference_pointer = preference.filter(|p| stored.as_ref().is_some_and(|s| s != p));

    if json {
        let output = StatusOutput {
            database: db_path,
            counts,
            active_period,
            preference_pointer,
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("{}", "StudyVault Status".bold());
    println!("=================");
    println!();
    println!("Database: {}", db_path.display());
    println!();
    println!("Periods:        {}", counts.periods);
    println!("Subjects:       {}", counts.subjects);
    println!("Evaluations:    {}", counts.evaluations);
    println!("Decks:          {}", counts.flashcard_decks);
    println!("Flashcards:     {}", counts.flashcards);
    println!("Profiles:       {}", counts.user_configurations);
    println!();

    match active_period {
        Some(period) => println!("Active period: {} ({})", period.name.cyan(), period.id),
        None => {
            println!("{}", "No active period.".yellow());
            println!("Import a package with: sv import <file>");
        }
    }
    if let Some(pointer) = preference_pointer {
        println!(
            "{} preferences name {pointer}; run `sv reconcile` to realign",
            "Warning:".yellow()
        );
    }

    Ok(())
}
