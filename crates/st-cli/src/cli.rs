//! Command-line argument definitions.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Sticky auto-pause timer.
///
/// Pauses media playback after a bounded session, re-arming when playback
/// resumes, and turns itself off after a maximum active window.
#[derive(Debug, Parser)]
#[command(name = "st", version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to config file.
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Run the timer, reading playback states line by line.
    ///
    /// Each input line is a playback state (`playing`, `paused`, `stopped`,
    /// `buffering`, `unknown`) or one of `enable`, `disable`, `status`.
    ///
    /// A snapshot is printed whenever it changes. `status` waits for earlier
    /// lines to be handled and prints only if the result differs from the
    /// last snapshot printed.
    Run {
        /// Read lines from this shell command's stdout instead of stdin
        /// (e.g. a player's status follower).
        #[arg(long)]
        source: Option<String>,

        /// Print snapshots as JSON lines.
        #[arg(long)]
        json: bool,
    },

    /// Print the effective configuration.
    Config,
}
