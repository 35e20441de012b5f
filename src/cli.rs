//! # Command-Line Interface Module
//!
//! Defines Herald's command-line interface using Clap derive macros.
//!
//! ## Commands
//!
//! - `run`: Execute a single reconciliation pass
//! - `watch`: Manage the periodic background reconciler
//! - `serve`: Run the local config/log web service
//! - `status`: Show player state and cached status history
//! - `completion`: Generate shell completions
//!
//! ## Examples
//!
//! ```bash
//! herald run --verbose
//! herald watch start
//! herald serve
//! ```

use clap::{Parser, Subcommand};
use clap_complete::Shell;

/// Main application arguments structure.
///
/// Uses Clap derive macros to automatically generate argument parsing,
/// help text, and validation. All functionality is accessed through
/// subcommands.
#[derive(Parser)]
#[command(name = "herald")]
#[command(about = "Herald: broadcast your now-playing track to your team-chat status")]
#[command(version)]
pub struct Args {
    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Enumeration of all available subcommands.
#[derive(Subcommand)]
pub enum Command {
    /// Execute one reconciliation pass
    ///
    /// Reads the player and the remote status once, decides whether an
    /// update is polite, and optionally sets the status. Intended to be
    /// triggered by an external scheduler (launchd, cron); use `watch`
    /// for a self-contained loop.
    Run {
        /// Log to stderr instead of the log file
        #[arg(short, long)]
        verbose: bool,
    },

    /// Manage the periodic reconciler
    ///
    /// Runs the reconciliation pass every `poll_interval_seconds` in a
    /// background process tracked by a PID file.
    Watch {
        #[command(subcommand)]
        action: WatchAction,
    },

    /// Run the local config/log web service
    ///
    /// Serves a small browser UI plus a JSON API for editing the
    /// configuration and viewing or clearing the log file. Protected by
    /// Basic Auth when server_username is configured.
    Serve,

    /// Show player state and cached status history
    Status,

    /// Generate shell completions
    ///
    /// Usage: herald completion bash > ~/.local/share/bash-completion/completions/herald
    Completion {
        /// Shell to generate completions for
        shell: Shell,
    },
}

/// Watch management actions
#[derive(Subcommand, Debug)]
pub enum WatchAction {
    /// Start the periodic reconciler
    Start {
        /// Stay in the foreground instead of forking to the background
        #[arg(long)]
        foreground: bool,
    },

    /// Stop the running reconciler
    Stop,

    /// Check whether the reconciler is running
    Status,
}
