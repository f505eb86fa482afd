//! Team Sync CLI
//!
//! Inspect captured server transcripts and evaluate workspace snapshots.

mod cli;
mod commands;
mod error;

use clap::Parser;
use colored::Colorize;

use cli::{Cli, Commands};
use error::Result;

fn main() {
    if let Err(e) = run() {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

fn run() -> Result<()> {
    let cli = Cli::parse();

    if cli.verbose {
        // Another subscriber being installed first is not fatal
        let _ = sync_core::logging::init_with_default("debug");
        tracing::debug!("Verbose mode enabled");
    }

    match cli.command {
        Commands::Parse {
            transcript,
            root,
            program,
            json,
        } => commands::run_parse(&transcript, &root, &program, json),
        Commands::Status {
            snapshot,
            transcript,
            config,
            json,
        } => commands::run_status(&snapshot, transcript.as_deref(), config.as_deref(), json),
    }
}
