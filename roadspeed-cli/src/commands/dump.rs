//! Print the stored snapshot.

use chrono::{DateTime, Local};
use clap::Args;
use roadspeed::codec::{self, Decoded};
use roadspeed::geo::Bucket;
use roadspeed::SnapshotStore;

use super::common::CommandContext;
use crate::error::CliError;

/// Arguments for the `dump` command.
#[derive(Debug, Args)]
pub struct DumpArgs {
    /// Print the decompressed JSON payload instead of a table
    #[arg(long)]
    pub json: bool,
}

/// Format epoch seconds as local time.
pub fn format_timestamp(secs: i64) -> String {
    match DateTime::from_timestamp(secs, 0) {
        Some(utc) => utc
            .with_timezone(&Local)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => format!("@{}", secs),
    }
}

/// Read the snapshot without opening the cache, so nothing is purged.
pub fn execute(ctx: &CommandContext, args: &DumpArgs) -> Result<String, CliError> {
    let key = &ctx.config.storage_key;
    let Some(raw) = ctx.store().get(key)? else {
        return Ok(format!("No snapshot '{}' in {}", key, ctx.store_dir.display()));
    };

    if args.json {
        let json = codec::decompress(&raw)?;
        let value: serde_json::Value = serde_json::from_slice(&json)
            .map_err(|e| CliError::Output(e.to_string()))?;
        return serde_json::to_string_pretty(&value)
            .map_err(|e| CliError::Output(e.to_string()));
    }

    let grid = match codec::decode(&raw)? {
        Decoded::Restored { grid, .. } => grid,
        Decoded::Incompatible(why) => {
            return Ok(format!("Snapshot '{}' is incompatible: {}", key, why));
        }
    };

    let mut cells: Vec<_> = grid.iter().collect();
    cells.sort_by_key(|(cell, _)| **cell);

    let mut lines = Vec::new();
    for (cell, record) in cells {
        let (min_lat, min_lon, _, _) = cell.bounds();
        lines.push(format!("cell {} ({:.4}, {:.4})", cell, min_lat, min_lon));
        for bucket in Bucket::all() {
            if let Some(entry) = record.get(bucket) {
                lines.push(format!(
                    "  bucket {} {:>7.1} m/s  since {}",
                    bucket,
                    entry.value,
                    format_timestamp(entry.timestamp)
                ));
            }
        }
    }
    lines.push(format!("{} cells", grid.len()));
    Ok(lines.join("\n"))
}

/// Run the `dump` command.
pub fn run(ctx: &CommandContext, args: DumpArgs) -> Result<(), CliError> {
    println!("{}", execute(ctx, &args)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::add::{self, AddArgs};

    fn seeded_context(temp: &tempfile::TempDir) -> CommandContext {
        let ctx = CommandContext::with_store_dir(temp.path());
        let sample = AddArgs {
            lat: 37.5,
            lon: 127.0,
            heading: 90.0,
            speed: -4.0,
        };
        add::execute(&ctx, &sample).unwrap();
        ctx
    }

    #[test]
    fn test_dump_table() {
        let temp = tempfile::tempdir().unwrap();
        let ctx = seeded_context(&temp);

        let report = execute(&ctx, &DumpArgs { json: false }).unwrap();
        assert!(report.contains("cell 375000,1270000"));
        assert!(report.contains("-4.0 m/s"));
        assert!(report.ends_with("1 cells"));
    }

    #[test]
    fn test_dump_json() {
        let temp = tempfile::tempdir().unwrap();
        let ctx = seeded_context(&temp);

        let report = execute(&ctx, &DumpArgs { json: true }).unwrap();
        let value: serde_json::Value = serde_json::from_str(&report).unwrap();
        assert_eq!(value["format"], "v4");
        assert_eq!(value["dir_buckets"], 8);
        assert_eq!(value["cells"]["375000,1270000"][2][0], -4.0);
    }

    #[test]
    fn test_dump_missing_snapshot() {
        let temp = tempfile::tempdir().unwrap();
        let ctx = CommandContext::with_store_dir(temp.path());

        let report = execute(&ctx, &DumpArgs { json: false }).unwrap();
        assert!(report.starts_with("No snapshot"));
    }

    #[test]
    fn test_format_timestamp_out_of_range() {
        assert_eq!(format_timestamp(i64::MAX), format!("@{}", i64::MAX));
        assert_eq!(format_timestamp(0).len(), "1970-01-01 00:00:00".len());
    }
}
