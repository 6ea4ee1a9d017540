//! CLI definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub mod commands;

/// StudyVault CLI - portable export and transactional import of study data
#[derive(Parser, Debug)]
#[command(name = "sv", author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Database path (default: ~/.studyvault/data/studyvault.db)
    #[arg(long, global = true, env = "STUDYVAULT_DB")]
    pub db: Option<PathBuf>,

    /// Media directory (default: media/ next to the database)
    #[arg(long, global = true, env = "STUDYVAULT_MEDIA")]
    pub media_dir: Option<PathBuf>,

    /// Preferences file (default: preferences.json next to the database)
    #[arg(long, global = true)]
    pub prefs: Option<PathBuf>,

    /// Actor name for audit trail
    #[arg(long, global = true, env = "SV_ACTOR")]
    pub actor: Option<String>,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// Validate a package without writing to the database
    #[arg(long, global = true)]
    pub dry_run: bool,

    /// Increase logging verbosity (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Quiet mode (no output except errors)
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the StudyVault database
    Init {
        /// Overwrite existing database
        #[arg(long)]
        force: bool,
    },

    /// Print version information
    Version,

    /// Show entity counts and the active period
    Status,

    /// Write a package containing every entity and referenced media file
    Export {
        /// Destination file
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Replace the store's data with a package
    Import {
        /// Package file (archive or legacy JSON)
        path: PathBuf,
    },

    /// Check a package without importing it
    Validate {
        /// Package file (archive or legacy JSON)
        path: PathBuf,
    },

    /// Repair flashcard schedules and re-select the active period
    Reconcile,
}

/// Paths and actor shared by every command.
#[derive(Debug, Clone, Default)]
pub struct GlobalArgs {
    pub db: Option<PathBuf>,
    pub media_dir: Option<PathBuf>,
    pub prefs: Option<PathBuf>,
    pub actor: Option<String>,
}

impl From<&Cli> for GlobalArgs {
    fn from(cli: &Cli) -> Self {
        Self {
            db: cli.db.clone(),
            media_dir: cli.media_dir.clone(),
            prefs: cli.prefs.clone(),
            actor: cli.actor.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_flags_follow_subcommand() {
        let cli = Cli::try_parse_from([
            "sv",
            "import",
            "backup.svpkg",
            "--db",
            "/tmp/sv.db",
            "--dry-run",
            "-vv",
        ])
        .unwrap();

        assert!(cli.dry_run);
        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.db, Some(PathBuf::from("/tmp/sv.db")));
        assert!(matches!(cli.command, Commands::Import { ref path } if path.ends_with("backup.svpkg")));
    }

    #[test]
    fn test_export_requires_output() {
        assert!(Cli::try_parse_from(["sv", "export"]).is_err());
    }
}
