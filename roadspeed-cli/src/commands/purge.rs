//! Delete the stored snapshot.

use roadspeed::SnapshotStore;

use super::common::CommandContext;
use crate::error::CliError;

/// Delete the snapshot key from the store.
///
/// Does not open the cache, so an unreadable snapshot can still be removed.
pub fn execute(ctx: &CommandContext) -> Result<String, CliError> {
    let key = &ctx.config.storage_key;
    let existed = ctx.store().delete(key)?;
    Ok(if existed {
        format!("Deleted snapshot '{}' from {}", key, ctx.store_dir.display())
    } else {
        format!("No snapshot '{}' in {}", key, ctx.store_dir.display())
    })
}

/// Run the `purge` command.
pub fn run(ctx: &CommandContext) -> Result<(), CliError> {
    println!("{}", execute(ctx)?);
    Ok(())
}
