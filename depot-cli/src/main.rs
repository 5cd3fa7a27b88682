//! Depot CLI - download, verify and stage packages from a release catalog.
//!
//! This binary drives the `depot` library the way a host application would:
//! it enqueues download requests, subscribes to the state stream, renders
//! progress, and receives the "ready to install" handle.

mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "depot", version, about = "Package download and verification pipeline")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Download and verify packages listed in a catalog file.
    Fetch(commands::fetch::FetchArgs),

    /// Validate a local artifact against its catalog entry.
    Verify(commands::verify::VerifyArgs),
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Command::Fetch(args) => commands::fetch::run(args),
        Command::Verify(args) => commands::verify::run(args),
    };

    if let Err(err) = result {
        eprintln!("error: {}", err);
        std::process::exit(1);
    }
}
