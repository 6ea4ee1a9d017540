//! Validate command implementation.
//!
//! Decodes a package and runs every integrity check without opening a
//! write transaction. Also backs `sv import --dry-run`.

use super::{block_on, open_porter};
use crate::cli::GlobalArgs;
use crate::error::Result;
use crate::portability::ValidationReport;
use colored::Colorize;
use std::path::Path;

/// Execute the validate command.
///
/// # Errors
///
/// Returns the first format, identity or referential problem found.
pub fn execute(args: &GlobalArgs, path: &Path, json: bool) -> Result<()> {
    let porter = open_porter(args)?;
    let report = block_on(porter.validate_file(path))??;

    print_report(path, &report, json)
}

fn print_report(path: &Path, report: &ValidationReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(report)?);
        return Ok(());
    }

    println!("{} {}", "Valid package:".green(), path.display());
    let counts = &report.counts;
    println!(
        "  {} periods, {} subjects, {} evaluations",
        counts.periods, counts.subjects, counts.evaluations
    );
    println!(
        "  {} decks, {} flashcards, {} profiles",
        counts.flashcard_decks, counts.flashcards, counts.user_configurations
    );
    if !report.decks_to_create.is_empty() {
        println!(
            "  {} missing decks will be created",
            report.decks_to_create.len()
        );
    }
    if report.deckless_cards > 0 {
        println!(
            "  {} cards without a deck will share a new deck",
            report.deckless_cards
        );
    }
    Ok(())
}
