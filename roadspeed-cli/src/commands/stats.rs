//! Summarize the stored grid.

use super::common::CommandContext;
use crate::error::CliError;

/// Open the cache and describe its contents.
pub fn execute(ctx: &CommandContext) -> Result<String, CliError> {
    let (cache, outcome) = ctx.open_cache();
    let stats = cache.stats();

    let mut report = String::new();
    report.push_str(&format!("Store:    {}\n", ctx.store_dir.display()));
    report.push_str(&format!("Key:      {}\n", ctx.config.storage_key));
    report.push_str(&format!("Load:     {}\n", outcome));
    report.push_str(&format!("Cells:    {}\n", stats.cells));
    report.push_str(&format!(
        "Slots:    {} ({} cruise, {} decel)",
        stats.populated_slots, stats.positive_slots, stats.negative_slots
    ));
    Ok(report)
}

/// Run the `stats` command.
pub fn run(ctx: &CommandContext) -> Result<(), CliError> {
    println!("{}", execute(ctx)?);
    Ok(())
}
