//! Import command implementation.

use super::{block_on, open_porter};
use crate::cli::GlobalArgs;
use crate::error::Result;
use crate::portability::ImportStats;
use colored::Colorize;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct ImportOutput<'a> {
    stats: &'a ImportStats,
    active_period_id: Option<&'a str>,
    active_period_name: Option<&'a str>,
}

/// Execute the import command.
///
/// With `dry_run`, the package is only decoded and validated.
///
/// # Errors
///
/// Pre-mutation errors leave the store untouched. A failed transaction is
/// rolled back before the error is returned.
pub fn execute(args: &GlobalArgs, path: &Path, dry_run: bool, json: bool) -> Result<()> {
    if dry_run {
        return super::validate::execute(args, path, json);
    }

    let porter = open_porter(args)?;
    let outcome = block_on(porter.import_file(path))??;
    let stats = &outcome.stats;

    if json {
        let output = ImportOutput {
            stats,
            active_period_id: outcome.active_period.as_ref().map(|p| p.id.as_str()),
            active_period_name: outcome.active_period.as_ref().map(|p| p.name.as_str()),
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("{} {}", "Imported".green(), path.display());
    println!(
        "  {} periods, {} subjects, {} evaluations, {} decks",
        stats.inserted.periods,
        stats.inserted.subjects,
        stats.inserted.evaluations,
        stats.inserted.flashcard_decks
    );
    println!(
        "  Flashcards: {} created, {} updated",
        stats.flashcards.created, stats.flashcards.updated
    );
    if stats.decks_auto_created + stats.decks_recovered > 0 {
        println!(
            "  Decks created for unresolved cards: {}",
            stats.decks_auto_created + stats.decks_recovered
        );
    }
    if stats.schedules_corrected > 0 {
        println!("  Schedules corrected: {}", stats.schedules_corrected);
    }
    println!("  Media files placed: {}", stats.media_placed);
    if let Some(period) = &outcome.active_period {
        println!("  Active period: {}", period.name.cyan());
    }
    Ok(())
}
