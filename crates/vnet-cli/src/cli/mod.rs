//! CLI for the Vnet slice downloader.

mod commands;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use clap_complete::Shell;
use vnet_core::config;

use commands::{
    run_checksum, run_completions, run_config, run_fetch, run_man, run_plan, FetchArgs,
};

/// Top-level CLI for the Vnet slice downloader.
#[derive(Debug, Parser)]
#[command(name = "vnet")]
#[command(about = "Vnet: deadline-driven slice downloads from peer nodes", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Download one slice from a simulated network of nodes.
    Fetch(FetchArgs),

    /// Print how a slice of the given size is split into chunk requests.
    Plan {
        /// Slice size in bytes.
        size: u32,
        /// Largest chunk in bytes (default: max_chunk_size from config).
        #[arg(long, value_name = "BYTES")]
        max_chunk: Option<u32>,
    },

    /// Show the config file path and the effective configuration.
    Config,

    /// Compute SHA-256 of a file (e.g. a slice written with `fetch --out`).
    Checksum {
        /// Path to the file.
        path: PathBuf,
    },

    /// Generate shell completions on stdout.
    Completions { shell: Shell },

    /// Generate the man page on stdout.
    Man,
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Fetch(args) => {
                let cfg = config::load_or_init()?;
                tracing::debug!("loaded config: {:?}", cfg);
                run_fetch(&cfg, &args).await?;
            }
            CliCommand::Plan { size, max_chunk } => {
                let cfg = config::load_or_init()?;
                run_plan(size, max_chunk.unwrap_or(cfg.max_chunk_size))?;
            }
            CliCommand::Config => run_config()?,
            CliCommand::Checksum { path } => run_checksum(&path)?,
            CliCommand::Completions { shell } => run_completions(shell),
            CliCommand::Man => run_man()?,
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests;
