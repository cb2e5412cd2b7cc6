//! James - operator CLI
//!
//! This is the main CLI entry point for James.

use anyhow::Context;
use clap::{Parser, Subcommand};
use james::servicespec;
use james::Settings;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// James - swarm cluster operator tooling
#[derive(Parser)]
#[command(name = "james")]
#[command(version)]
#[command(about = "Operator CLI for a small swarm cluster", long_about = None)]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Compile a service spec into a stack file
    #[command(name = "spec-to-compose")]
    SpecToCompose {
        /// Spec file path
        path: PathBuf,
        /// Overlay network for services without host networking
        #[arg(long)]
        network: Option<String>,
        /// Write the stack file here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    // stdout carries the stack file
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::SpecToCompose {
            path,
            network,
            output,
        } => {
            let settings = Settings::load()
                .context("Failed to load settings")?
                .with_network(network)?;

            let yaml = servicespec::spec_to_compose_by_path(&path, &settings.defaults())
                .with_context(|| format!("Failed to compile {}", path.display()))?;

            match output {
                Some(output) => {
                    std::fs::write(&output, &yaml)
                        .with_context(|| format!("Failed to write {}", output.display()))?;
                    tracing::info!("Wrote {}", output.display());
                }
                None => println!("{}", yaml),
            }
        }
    }

    Ok(())
}
