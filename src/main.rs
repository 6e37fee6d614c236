#![deny(clippy::mod_module_files)]
use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod archive;
mod commands;
mod config;
mod digest;
mod error;
mod manifest;
mod repository;

use config::RegistryConfig;

#[derive(Parser)]
#[command(name = "cpm", version, about = "Client for the ColonyOS package repository")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Initialize a new package manifest in the current directory
    Init,
    /// Pack the current directory and upload it to the repository
    Upload {
        /// Bearer token authorizing the upload
        token: String,
    },
    /// Download a package archive and extract it locally
    Download {
        /// Name of the package to download
        package: String,
        /// Directory to extract into
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Registry base URL override
        #[arg(long)]
        registry: Option<String>,
        /// Verify the archive against this SHA-256 digest before extracting
        #[arg(long)]
        checksum: Option<String>,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = RegistryConfig::load()?;

    match cli.command {
        Command::Init => commands::init::run(),
        Command::Upload { token } => commands::upload::run(&config, &token),
        Command::Download {
            package,
            output,
            registry,
            checksum,
        } => commands::download::run(
            &config,
            &commands::download::DownloadArgs {
                package,
                output,
                registry,
                checksum,
            },
        ),
    }
}
