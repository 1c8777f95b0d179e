//! Record a single speed sample.

use clap::Args;
use roadspeed::geo::{bucket_of, quantize};

use super::common::CommandContext;
use crate::error::CliError;

/// Arguments for the `add` command.
#[derive(Debug, Args)]
pub struct AddArgs {
    /// Latitude in decimal degrees
    #[arg(long, allow_negative_numbers = true)]
    pub lat: f64,

    /// Longitude in decimal degrees
    #[arg(long, allow_negative_numbers = true)]
    pub lon: f64,

    /// Heading in degrees clockwise from north
    #[arg(long, allow_negative_numbers = true)]
    pub heading: f64,

    /// Signed speed in m/s (negative marks a deceleration point)
    #[arg(long, allow_negative_numbers = true)]
    pub speed: f64,
}

/// Ingest the sample and save the snapshot.
pub fn execute(ctx: &CommandContext, args: &AddArgs) -> Result<String, CliError> {
    let (cache, _) = ctx.open_cache();
    let cell = quantize(args.lat, args.lon);
    let bucket = bucket_of(args.heading);

    cache.add_sample(args.lat, args.lon, args.heading, args.speed);
    let slot = cache.slot(&cell, bucket);
    if cache.is_dirty() {
        cache.save()?;
    }
    cache.close();

    Ok(match slot {
        Some(entry) => format!(
            "Cell {} bucket {}: {:.1} m/s",
            cell, bucket, entry.value
        ),
        None => format!("Ignored zero speed sample at cell {}", cell),
    })
}

/// Run the `add` command.
pub fn run(ctx: &CommandContext, args: AddArgs) -> Result<(), CliError> {
    println!("{}", execute(ctx, &args)?);
    Ok(())
}
