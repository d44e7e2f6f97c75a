//! schoolsync — operator CLI for the offline cache.
//!
//! # Usage
//!
//! ```text
//! schoolsync status [--prefix <key prefix>] [--json]
//! schoolsync invalidate --prefix <key prefix>
//! schoolsync invalidate --all
//! schoolsync config [--json] [--interval-minutes N] [--notifications true|false]
//!                   [--verification-rate R] [--max-concurrent-works N]
//! ```

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{config::ConfigArgs, invalidate::InvalidateArgs, status::StatusArgs};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "schoolsync",
    version,
    about = "Inspect and reset the school register's offline cache",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show when every cache key was last refreshed and whether it is stale.
    Status(StatusArgs),

    /// Forget refresh timestamps so the next access fetches again.
    Invalidate(InvalidateArgs),

    /// Show (and optionally change) the sync configuration.
    Config(ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Status(args) => args.run(),
        Commands::Invalidate(args) => args.run(),
        Commands::Config(args) => args.run(),
    }
}
