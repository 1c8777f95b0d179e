//! Ask for the advisory speed ahead of a position.

use clap::Args;

use super::common::CommandContext;
use crate::error::CliError;

/// Arguments for the `query` command.
#[derive(Debug, Args)]
pub struct QueryArgs {
    /// Latitude in decimal degrees
    #[arg(long, allow_negative_numbers = true)]
    pub lat: f64,

    /// Longitude in decimal degrees
    #[arg(long, allow_negative_numbers = true)]
    pub lon: f64,

    /// Heading in degrees clockwise from north
    #[arg(long, allow_negative_numbers = true)]
    pub heading: f64,

    /// Look this many meters ahead
    #[arg(long, conflicts_with = "v_ego", required_unless_present = "v_ego")]
    pub distance: Option<f64>,

    /// Current speed in m/s; looks ahead by speed times look-ahead seconds
    #[arg(long)]
    pub v_ego: Option<f64>,

    /// Look-ahead horizon in seconds (defaults to the configured value)
    #[arg(long, requires = "v_ego")]
    pub lookahead: Option<f64>,

    /// Only search the projected cell, not its neighbors
    #[arg(long)]
    pub no_neighbors: bool,
}

/// Run the query and describe the result.
pub fn execute(ctx: &CommandContext, args: &QueryArgs) -> Result<String, CliError> {
    let (cache, _) = ctx.open_cache();
    let neighbors = !args.no_neighbors;

    let value = match (args.distance, args.v_ego) {
        (Some(distance), _) => {
            cache.query_target_by_distance(args.lat, args.lon, args.heading, distance, neighbors)
        }
        (None, v_ego) => cache.query_target(
            args.lat,
            args.lon,
            args.heading,
            v_ego.unwrap_or(0.0),
            args.lookahead.unwrap_or(ctx.config.lookahead_secs),
            neighbors,
        ),
    };

    let report = match cache.last_hit() {
        Some(hit) => format!(
            "{:.1} m/s (cell {}, bucket {})",
            value, hit.cell, hit.bucket
        ),
        None => "No remembered speed ahead".to_string(),
    };
    cache.close();
    Ok(report)
}

/// Run the `query` command.
pub fn run(ctx: &CommandContext, args: QueryArgs) -> Result<(), CliError> {
    println!("{}", execute(ctx, &args)?);
    Ok(())
}
