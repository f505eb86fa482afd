//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Team Sync - Track which resources differ from the repository
#[derive(Parser, Debug)]
#[command(name = "teamsync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// The command to run
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Parse a captured server transcript
    ///
    /// Each line is classified into a notification, a status, or both, and
    /// translated into the change event the collector would receive.
    ///
    /// Examples:
    ///   teamsync parse update.log
    ///   teamsync parse update.log --root project --json
    Parse {
        /// Transcript file (`M <text>` / `E <text>` lines)
        transcript: PathBuf,

        /// Workspace directory the command ran in
        #[arg(long, default_value = "")]
        root: String,

        /// Server program name used in diagnostic prefixes
        #[arg(long, default_value = "cvs", env = "TEAMSYNC_PROGRAM")]
        program: String,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Show the out-of-sync resources of a workspace snapshot
    ///
    /// Examples:
    ///   teamsync status snapshot.toml
    ///   teamsync status snapshot.toml --transcript update.log
    Status {
        /// Snapshot file describing local, base and remote revisions
        snapshot: PathBuf,

        /// Replay this transcript into the collector after initializing
        #[arg(long)]
        transcript: Option<PathBuf>,

        /// Engine configuration file
        #[arg(long, env = "TEAMSYNC_CONFIG")]
        config: Option<PathBuf>,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },
}
