use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

/// Ingestion pipeline and partitioned data lake.
///
/// Runs file and API ingestion on demand or on a schedule, and manages the
/// tiered storage layout.
#[derive(Parser, Debug)]
#[command(name = "lakeshore", about = "Resilient ingestion into a partitioned data lake")]
pub struct CliArgs {
    /// Path to the pipeline config file (missing file = defaults)
    #[arg(long, short, global = true, env = "LAKESHORE_CONFIG", default_value = "config/pipeline.toml")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run ingestion once
    Run {
        #[arg(value_enum, default_value_t = RunTarget::Full)]
        target: RunTarget,
    },
    /// Run the job scheduler until Ctrl-C
    Schedule,
    /// Print component, scheduler and data directory status as JSON
    Status,
    /// Storage layout management
    Storage {
        #[command(subcommand)]
        action: StorageCommand,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunTarget {
    File,
    Api,
    Full,
}

#[derive(Subcommand, Debug)]
pub enum StorageCommand {
    /// Create tier roots and per-source directories
    Init,
    /// Move legacy files into the partitioned layout
    Migrate,
    /// Apply the retention policy (defaults to the configured dry-run flag)
    Cleanup {
        /// Only report what would be deleted
        #[arg(long, conflicts_with = "execute")]
        dry_run: bool,
        /// Delete expired partitions
        #[arg(long)]
        execute: bool,
    },
    /// Per-tier size, file and partition counts
    Stats,
    /// Check the layout for missing tiers, orphans and bad partitions
    Validate,
    /// Markdown storage report
    Report {
        /// Write the report here instead of stdout
        #[arg(long)]
        output: Option<PathBuf>,
    },
}
