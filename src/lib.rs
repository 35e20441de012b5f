//! Polite now-playing announcer for team-chat statuses.
//!
//! Core modules:
//! - [`reconciler`] - The status-reconciliation decision engine
//! - [`classifier`] - Pure classification of remote status snapshots
//! - [`cache`] - The persisted status cache record
//! - [`slack_client`] - Chat-service status API integration
//! - [`player`] - Media-player queries via AppleScript
//!
//! ### Supporting Modules
//!
//! - [`config`] - Configuration and data directory management
//! - [`logging`] - Log-file handling and secret redaction
//! - [`censor`] - Track-label filtering before publication
//! - [`server`] - Local config/log web service
//! - [`watch`] - Periodic background reconciliation
//! - [`cli`] - Command-line interface definitions with clap integration
//!
//! ## How a pass works
//!
//! Each invocation composes three facts — remote status snapshot, local
//! cache, player state — into one decision and at most one status-set
//! call:
//!
//! ```no_run
//! use herald::config::RuntimeConfig;
//! use herald::reconciler;
//!
//! let config = RuntimeConfig::load()?;
//! let outcome = reconciler::run_once(&config)?;
//! println!("{outcome:?}");
//! # Ok::<(), anyhow::Error>(())
//! ```
//!
//! The politeness rules: a fully-populated status someone else set is
//! never overwritten (unless `always_override` is on); a partially-set or
//! Herald-owned status is replaced while music plays; when playback
//! stops, the status TTL is left to expire the announcement on its own.
//!
//! ## Error Handling
//!
//! Public functions return `Result<T, anyhow::Error>`. Remote failures
//! never kill a run beyond logging it; only a broken configuration at
//! startup is fatal. The one typed error, `slack_client::StatusApiError`,
//! exists because the read-retry policy must distinguish transport-level
//! failures (retryable) from explicit API errors (final).

pub mod cache;
pub mod censor;
pub mod classifier;
pub mod cli;
pub mod config;
pub mod logging;
pub mod player;
pub mod reconciler;
pub mod server;
pub mod slack_client;
pub mod watch;
