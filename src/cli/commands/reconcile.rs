//! Reconcile command implementation.

use super::{block_on, open_porter};
use crate::cli::GlobalArgs;
use crate::error::Result;
use colored::Colorize;
use serde::Serialize;

#[derive(Serialize)]
struct ReconcileOutput {
    schedules_corrected: usize,
    configurations_updated: usize,
    active_period_id: Option<String>,
}

/// Execute the reconcile command.
///
/// # Errors
///
/// Returns an error if the transaction fails or the preference pointer
/// cannot be written.
pub fn execute(args: &GlobalArgs, json: bool) -> Result<()> {
    let porter = open_porter(args)?;
    let outcome = block_on(porter.reconcile())??;

    if json {
        let output = ReconcileOutput {
            schedules_corrected: outcome.schedules_corrected,
            configurations_updated: outcome.configurations_updated,
            active_period_id: outcome.active_period.map(|p| p.id),
        };
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("{}", "Reconciled".green());
    println!("  Schedules corrected: {}", outcome.schedules_corrected);
    match outcome.active_period {
        Some(period) => println!("  Active period: {} ({})", period.name.cyan(), period.id),
        None => println!("  {}", "No period to activate".yellow()),
    }
    Ok(())
}
