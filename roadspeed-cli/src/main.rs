//! Roadspeed CLI - inspect and drive a road speed snapshot.

mod commands;
mod error;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use roadspeed::logging::{default_log_dir, default_log_file, init_logging};
use tracing::debug;

use commands::add::AddArgs;
use commands::common::CommandContext;
use commands::dump::DumpArgs;
use commands::query::QueryArgs;
use error::CliError;

#[derive(Debug, Parser)]
#[command(name = "roadspeed")]
#[command(version)]
#[command(about = "Location and heading keyed memory of driving speeds", long_about = None)]
struct Cli {
    /// Directory holding the snapshot (default: <data dir>/roadspeed)
    #[arg(long, global = true)]
    store_dir: Option<PathBuf>,

    /// Config file (default: <config dir>/roadspeed/config.ini)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Summarize the stored grid
    Stats,
    /// Record one speed sample and save
    Add(AddArgs),
    /// Print the advisory speed ahead of a position
    Query(QueryArgs),
    /// Print every stored slot
    Dump(DumpArgs),
    /// Delete the stored snapshot
    Purge,
}

fn run(cli: Cli) -> Result<(), CliError> {
    let ctx = CommandContext::resolve(cli.store_dir, cli.config)?;
    debug!(
        store_dir = %ctx.store_dir.display(),
        key = %ctx.config.storage_key,
        "Resolved command context"
    );

    match cli.command {
        Commands::Stats => commands::stats::run(&ctx),
        Commands::Add(args) => commands::add::run(&ctx, args),
        Commands::Query(args) => commands::query::run(&ctx, args),
        Commands::Dump(args) => commands::dump::run(&ctx, args),
        Commands::Purge => commands::purge::run(&ctx),
    }
}

fn main() {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    let _logging_guard = match init_logging(&default_log_dir(), default_log_file(), filter) {
        Ok(guard) => guard,
        Err(e) => CliError::LoggingInit(e.to_string()).exit(),
    };

    if let Err(e) = run(cli) {
        e.exit();
    }
}
