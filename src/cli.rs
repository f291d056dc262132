//! Command-line interface definitions for snaptrack.
//!
//! The CLI definitions are shared between the main binary and build tools
//! (like xtask) for man page generation.

use clap::{ArgGroup, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

/// Main CLI structure for snaptrack.
#[derive(Parser)]
#[command(
    name = "snaptrack",
    version = crate::VERSION,
    about = "Track changes in a working directory and keep full-copy snapshots",
    long_about = "Fingerprints every file under a working directory, reports what was added, \
                  modified or deleted, and saves point-in-time snapshots that can be restored"
)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Working tree to track (defaults to the current directory)
    #[arg(long, global = true, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Configuration file (defaults to $SNAPTRACK_CONFIG_PATH, then the user config directory)
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Show verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress informational messages
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// All available commands.
#[derive(Subcommand)]
pub enum Commands {
    /// Start tracking the working tree and take the initial snapshot
    Init,

    /// Show files changed since the newest snapshot
    Status {
        /// One `A|M|D path` line per change, without colors
        #[arg(short, long)]
        short: bool,
    },

    /// Save a snapshot of the working tree
    Save {
        /// Comment stored with the snapshot
        #[arg(short, long, default_value = "")]
        message: String,
    },

    /// List snapshots, oldest first
    List,

    /// Show a snapshot's metadata and files
    Show {
        /// Snapshot id (YYYYMMDD_HHMMSS)
        id: String,
    },

    /// Restore a snapshot into the working tree
    Restore {
        /// Snapshot id (YYYYMMDD_HHMMSS)
        id: String,

        /// Also delete tracked files the snapshot does not contain
        #[arg(long)]
        reconcile: bool,
    },

    /// Check stored copies of a snapshot against its metadata
    Verify {
        /// Snapshot id (YYYYMMDD_HHMMSS)
        id: String,
    },

    /// Show or change autosave settings
    #[command(group(ArgGroup::new("toggle").args(["enable", "disable"])))]
    Autosave {
        /// Turn autosave on
        #[arg(long)]
        enable: bool,

        /// Turn autosave off
        #[arg(long)]
        disable: bool,

        /// Minutes between autosaves (1-60)
        #[arg(long, value_name = "MINUTES")]
        interval: Option<u64>,
    },

    /// Run a tracking session, reading commands from stdin
    Watch,

    /// Generate shell completion scripts
    Completion {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}
