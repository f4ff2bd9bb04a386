//! ionvue CLI - headless atom-probe dataset inspection.
//!
//! Small command set for working with reconstructed datasets and range
//! files without the GUI: summarise, convert between range dialects, and
//! uniformly sample POS files.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

/// ionvue - atom probe tomography dataset tools
#[derive(Parser, Debug)]
#[command(name = "ionvue")]
#[command(about = "Inspect and convert atom-probe datasets and range files", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging (-v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Summarise a POS dataset: record count, bounds, mass statistics
    Info {
        /// Dataset path (.pos)
        #[arg(short, long)]
        file: PathBuf,

        /// Emit the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Summarise a range file (any supported dialect)
    RangeInfo {
        /// Range file path (.rng, .rrng, .env)
        #[arg(short, long)]
        file: PathBuf,

        /// Emit the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Convert a range file between dialects
    RangeConvert {
        /// Input range file
        #[arg(short, long)]
        input: PathBuf,

        /// Output path; the extension picks the dialect
        #[arg(short, long)]
        output: PathBuf,
    },

    /// Summarise a saved analysis state file
    StateInfo {
        /// State file path (.xml)
        #[arg(short, long)]
        file: PathBuf,
    },

    /// Uniformly sample a POS file down to a record count
    Sample {
        /// Input dataset (.pos)
        #[arg(short, long)]
        input: PathBuf,

        /// Output dataset (.pos)
        #[arg(short, long)]
        output: PathBuf,

        /// Records to keep
        #[arg(short = 'n', long)]
        count: usize,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match cli.command {
        Commands::Info { file, json } => commands::info::run(&file, json),
        Commands::RangeInfo { file, json } => commands::rangeinfo::run(&file, json),
        Commands::RangeConvert { input, output } => commands::rangeconvert::run(&input, &output),
        Commands::StateInfo { file } => commands::stateinfo::run(&file),
        Commands::Sample {
            input,
            output,
            count,
        } => commands::sample::run(&input, &output, count),
    }
}
