//! # Herald - Now-Playing Status Announcer
//!
//! Herald watches a local media player and mirrors the currently playing
//! track into your team-chat status, politely: statuses set by a human
//! are left alone, and everything Herald sets expires on its own TTL.
//!
//! ## Architecture
//!
//! - `cli`: Command-line interface definitions
//! - `reconciler`: The decision engine, one linear pass per invocation
//! - `classifier`: Pure classification of remote status snapshots
//! - `cache`: Single JSON record persisted between passes
//! - `slack_client`: Chat-service Web API integration
//! - `player`: AppleScript media-player queries
//! - `server`: Local config/log web service
//! - `watch`: Periodic background reconciliation
//!
//! ## Usage
//!
//! ```bash
//! # One reconciliation pass (for launchd/cron scheduling)
//! herald run
//!
//! # Self-contained periodic loop
//! herald watch start
//!
//! # Config editor + log viewer on localhost
//! herald serve
//! ```

use anyhow::Result;
use clap::{CommandFactory, Parser};
use log::info;

use herald::{cache, cli, config, logging, player, reconciler, server, watch};
use herald::player::Player;

/// Main entry point for Herald.
///
/// Initializes logging, loads the configuration (the only fatal failure
/// point — everything after exits 0 and logs), and routes the parsed
/// command. `run` and `watch` log into the data-directory log file so the
/// web service can display them; interactive commands log to stderr.
fn main() -> Result<()> {
    let args = cli::Args::parse();

    // Pick the log sink before anything can log.
    match &args.command {
        cli::Command::Run { verbose: false } | cli::Command::Watch { .. } => {
            logging::init_file_logger(&config::get_log_path()?)?;
        }
        _ => logging::init_stderr_logger(),
    }

    // Config load is fatal on failure, before any remote or player I/O.
    let run_config = config::RuntimeConfig::load()?;
    logging::register_secret(&run_config.slack_token);
    logging::register_secret(&run_config.server_password);

    match args.command {
        cli::Command::Run { .. } => {
            let outcome = match reconciler::run_once(&run_config) {
                Ok(outcome) => outcome,
                Err(e) => {
                    // Non-fatal by design: log, exit clean, let the next
                    // scheduled invocation try again.
                    log::error!("Reconciliation pass failed: {e:#}");
                    return Ok(());
                }
            };
            info!("Pass finished: {outcome:?}");
            if let Err(e) = logging::trim_log(&config::get_log_path()?, run_config.log_max_lines) {
                log::warn!("Log trim failed: {e:#}");
            }
        }
        cli::Command::Watch { action } => match action {
            cli::WatchAction::Start { foreground } => {
                if watch::is_watcher_running()? {
                    eprintln!("Watcher is already running");
                    return Ok(());
                }

                if foreground {
                    let watcher = watch::Watcher::new()?;
                    watcher.run_loop(&run_config)?;
                    return Ok(());
                }

                // Fork and continue watching in the background
                match unsafe { libc::fork() } {
                    0 => {
                        // Child process - become the watcher
                        let watcher = watch::Watcher::new()?;
                        watcher.run_loop(&run_config)?;
                        std::process::exit(0);
                    }
                    pid if pid > 0 => {
                        // Parent process
                        println!("Starting watcher...");
                        std::thread::sleep(std::time::Duration::from_millis(500));

                        if watch::is_watcher_running()? {
                            println!("Watcher started successfully");
                        } else {
                            eprintln!("Failed to start watcher");
                        }
                    }
                    _ => {
                        eprintln!("Failed to fork process");
                    }
                }
            }
            cli::WatchAction::Stop => {
                watch::stop_watcher()?;
                println!("Watcher stopped");
            }
            cli::WatchAction::Status => {
                if watch::is_watcher_running()? {
                    println!("Watcher is running");
                } else {
                    println!("Watcher is not running");
                }
            }
        },
        cli::Command::Serve => {
            server::serve(&run_config)?;
        }
        cli::Command::Status => {
            show_status(&run_config)?;
        }
        cli::Command::Completion { shell } => {
            let mut cmd = cli::Args::command();
            clap_complete::generate(shell, &mut cmd, "herald", &mut std::io::stdout());
        }
    }

    Ok(())
}

/// Print a human-readable view of the player and the cached history.
fn show_status(run_config: &config::RuntimeConfig) -> Result<()> {
    let player = player::AppleScriptPlayer::new(&run_config.player_app);

    if player.is_running() {
        let state = player.state();
        println!("Player {}: {state:?}", run_config.player_app);
        if state == player::PlayerState::Playing {
            match player.current_track() {
                Ok(track) => println!("Now playing: {track}"),
                Err(_) => println!("Now playing: (unavailable)"),
            }
        }
    } else {
        println!("Player {}: not running", run_config.player_app);
    }

    let cache_record = cache::CacheRecord::load(&config::get_cache_path()?);
    match &cache_record.last_set_by_script {
        Some(set) => println!(
            "Last status set by herald: \"{}\" {} (at {})",
            set.text, set.emoji, set.set_at
        ),
        None => println!("Last status set by herald: never"),
    }
    match &cache_record.last_non_empty_non_owned {
        Some(foreign) => println!(
            "Last foreign status seen: \"{}\" {} (at {})",
            foreign.text, foreign.emoji, foreign.observed_at
        ),
        None => println!("Last foreign status seen: never"),
    }

    Ok(())
}
