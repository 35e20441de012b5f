//! # Periodic Reconciliation Watcher
//!
//! Runs the reconciliation pass on a fixed interval as a background
//! process that can be started/stopped via CLI commands. The watcher is
//! the in-process alternative to wiring `herald run` into launchd or
//! cron: one pass at a time, strictly sequential, with a sleep between
//! passes.
//!
//! Non-overlap is guaranteed by construction — the next pass only starts
//! after the previous one (including its retries) has returned. A PID
//! file in the data directory prevents a second watcher from starting and
//! lets `watch stop`/`watch status` manage the process.

use anyhow::{bail, Context, Result};
use log::{error, info};
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::Duration;

use crate::config::{self, RuntimeConfig};
use crate::logging;
use crate::reconciler;

/// Periodic reconciler driven by a sleep loop.
#[derive(Debug)]
pub struct Watcher {
    /// Path to PID file for process management
    pid_file: PathBuf,
}

impl Watcher {
    /// Create a new watcher rooted in the data directory.
    pub fn new() -> Result<Self> {
        Ok(Self {
            pid_file: config::get_pid_path()?,
        })
    }

    /// Run reconciliation passes until the process is terminated.
    ///
    /// Writes the PID file on entry; `watch stop` removes it along with
    /// the process. A failing pass is logged and the loop continues; the
    /// next interval gets a fresh chance.
    pub fn run_loop(&self, run_config: &RuntimeConfig) -> Result<()> {
        let pid = std::process::id();
        fs::write(&self.pid_file, pid.to_string())
            .with_context(|| format!("Failed to write PID file {}", self.pid_file.display()))?;
        info!("Watcher started with PID {pid}");

        let interval = Duration::from_secs(run_config.poll_interval_seconds);
        let log_path = config::get_log_path()?;

        loop {
            match reconciler::run_once(run_config) {
                Ok(outcome) => info!("Pass finished: {outcome:?}"),
                Err(e) => error!("Pass failed: {e:#}"),
            }

            // Keep the log file within its line budget between passes.
            if let Err(e) = logging::trim_log(&log_path, run_config.log_max_lines) {
                error!("Log trim failed: {e:#}");
            }

            std::thread::sleep(interval);
        }
    }
}

/// Check if the watcher is running.
pub fn is_watcher_running() -> Result<bool> {
    let pid_file = config::get_pid_path()?;

    if !pid_file.exists() {
        return Ok(false);
    }

    // Read PID and check if the process exists
    let pid_str = fs::read_to_string(&pid_file)?;
    let pid: u32 = pid_str.trim().parse().context("Invalid PID in watcher file")?;

    // Signal 0 probes for existence without touching the process
    match Command::new("kill").args(["-0", &pid.to_string()]).status() {
        Ok(status) => Ok(status.success()),
        Err(_) => Ok(false),
    }
}

/// Stop the running watcher.
pub fn stop_watcher() -> Result<()> {
    let pid_file = config::get_pid_path()?;

    if !pid_file.exists() {
        bail!("Watcher is not running");
    }

    let pid_str = fs::read_to_string(&pid_file)?;
    let pid: u32 = pid_str.trim().parse().context("Invalid PID in watcher file")?;

    Command::new("kill")
        .args(["-TERM", &pid.to_string()])
        .status()
        .context("Failed to stop watcher")?;

    fs::remove_file(&pid_file)?;

    info!("Watcher stopped (PID: {pid})");
    Ok(())
}
