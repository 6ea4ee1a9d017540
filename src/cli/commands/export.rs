//! Export command implementation.

use super::{block_on, open_porter};
use crate::cli::GlobalArgs;
use crate::error::Result;
use crate::portability::ExportStats;
use colored::Colorize;
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct ExportOutput {
    path: PathBuf,
    #[serde(flatten)]
    stats: ExportStats,
}

/// Execute the export command.
///
/// # Errors
///
/// Returns an error if the store cannot be read or the package cannot be
/// written. Media files that no longer exist are skipped.
pub fn execute(args: &GlobalArgs, output: &Path, json: bool) -> Result<()> {
    let porter = open_porter(args)?;
    let stats = block_on(porter.export_to(output))??;

    if json {
        let payload = ExportOutput {
            path: output.to_path_buf(),
            stats,
        };
        println!("{}", serde_json::to_string(&payload)?);
        return Ok(());
    }

    println!(
        "{} {}",
        "Exported".green(),
        output.display().to_string().bold()
    );
    println!(
        "  {} periods, {} subjects, {} evaluations",
        stats.entities.periods, stats.entities.subjects, stats.entities.evaluations
    );
    println!(
        "  {} decks, {} flashcards",
        stats.entities.flashcard_decks, stats.entities.flashcards
    );
    println!("  {} media files ({} bytes total)", stats.media_files, stats.bytes);
    if stats.media_missing > 0 {
        println!(
            "  {}",
            format!("{} referenced media files were missing", stats.media_missing).yellow()
        );
    }
    Ok(())
}
