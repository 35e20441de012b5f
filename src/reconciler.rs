//! # Status Reconciliation Engine
//!
//! One linear decision pipeline, invoked once per pass:
//!
//! ```text
//! Start → CheckPlayerRunning → ReadRemoteStatus → ClassifyAndCacheForeign
//!       → CheckPlaying → CheckOverrideSafety → SetRemoteStatus → Done
//! ```
//!
//! Every stage is a gate with an early exit, and each exit is named by an
//! [`Outcome`] variant so callers (and tests) can see exactly which gate
//! ended the pass. The politeness rules live in the gates:
//!
//! - A status someone else set, with both fields populated, is never
//!   overwritten unless `always_override` is on.
//! - A partially-set or Herald-owned status is fair game while music is
//!   actually playing.
//! - When playback stops, Herald does nothing and lets the status TTL
//!   expire the stale announcement on its own.
//!
//! The remote status is read exactly once per pass; classification and the
//! set decision act on that single snapshot, so there is no window for the
//! status to change between check and act within one pass. Only the read
//! is retried (bounded, transport/parse failures only). The set call is
//! never retried: a retry could publish a track label that is already
//! stale.

use anyhow::Result;
use log::{debug, error, info, warn};
use std::path::Path;
use std::time::Duration;

use crate::cache::{epoch_now, CacheRecord, ForeignStatus, ScriptStatus};
use crate::censor::TextFilter;
use crate::classifier;
use crate::config::RuntimeConfig;
use crate::player::{Player, PlayerState};
use crate::slack_client::{StatusApi, StatusApiError, StatusSnapshot};

/// Total attempts for the remote status read.
const MAX_READ_ATTEMPTS: u32 = 3;

/// Base backoff between read attempts; grows linearly per attempt.
const READ_BACKOFF: Duration = Duration::from_millis(250);

/// How a reconciliation pass ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// The player is not running; nothing to report.
    PlayerNotRunning,
    /// The remote read kept failing at the transport/parse level.
    ReadFailed,
    /// The service answered the read with an explicit error.
    RemoteError(String),
    /// The player is running but not playing; TTL expiry handles cleanup.
    NotPlaying(PlayerState),
    /// A fully-populated foreign status blocked the update.
    ForeignStatusProtected,
    /// The player claimed to be playing but gave no usable track label.
    TrackUnavailable,
    /// The set call was issued and the service rejected it.
    SetFailed(String),
    /// The status was updated.
    Updated {
        text: String,
        emoji: String,
        expiration: i64,
    },
}

/// The decision engine. Borrows its collaborators; owns no state between
/// passes — everything persistent lives in the [`CacheRecord`].
pub struct Reconciler<'a> {
    config: &'a RuntimeConfig,
    player: &'a dyn Player,
    api: &'a dyn StatusApi,
    filter: &'a dyn TextFilter,
}

impl<'a> Reconciler<'a> {
    pub fn new(
        config: &'a RuntimeConfig,
        player: &'a dyn Player,
        api: &'a dyn StatusApi,
        filter: &'a dyn TextFilter,
    ) -> Self {
        Self {
            config,
            player,
            api,
            filter,
        }
    }

    /// Execute one reconciliation pass.
    ///
    /// `cache` is mutated in memory and persisted to `cache_path` at two
    /// checkpoints only: right after the snapshot is classified (so a
    /// foreign-status observation survives any later exit), and right
    /// after a successful set. A pass that exits before classification
    /// leaves the file exactly as it found it.
    pub fn run(&self, cache: &mut CacheRecord, cache_path: &Path) -> Result<Outcome> {
        // Gate: player process
        if !self.player.is_running() {
            debug!("Player {} is not running, nothing to report", self.config.player_app);
            return Ok(Outcome::PlayerNotRunning);
        }

        // Gate: one remote read, bounded retry on transport/parse only
        let snapshot = match self.read_status_with_retry() {
            Ok(snapshot) => snapshot,
            Err(StatusApiError::Api(code)) => {
                // An explicit remote failure: assume nothing, touch nothing.
                error!("Status read rejected by service: {code}");
                return Ok(Outcome::RemoteError(code));
            }
            Err(e) => {
                error!("Status read failed after {MAX_READ_ATTEMPTS} attempts: {e}");
                return Ok(Outcome::ReadFailed);
            }
        };

        // Classify the single snapshot
        let owned = classifier::is_owned_by_script(&snapshot.text, &snapshot.emoji, self.config);
        let empty = classifier::is_empty(&snapshot.text, &snapshot.emoji);
        let safe =
            classifier::is_safe_to_override_when_playing(&snapshot.text, &snapshot.emoji) || owned;
        debug!("Remote status classified: owned={owned} empty={empty} safe={safe}");

        // First checkpoint: remember a fully-populated foreign status before
        // any later gate can end the run, so the fact is never lost.
        if !owned
            && !classifier::normalize(&snapshot.text).is_empty()
            && !classifier::normalize(&snapshot.emoji).is_empty()
        {
            info!(
                "Observed foreign status: \"{}\" {}",
                snapshot.text, snapshot.emoji
            );
            cache.last_non_empty_non_owned = Some(ForeignStatus {
                text: snapshot.text.clone(),
                emoji: snapshot.emoji.clone(),
                expiration: snapshot.expiration,
                observed_at: epoch_now(),
            });
        }
        cache.save(cache_path)?;

        // Gate: only an actively playing player gets announced. Paused,
        // stopped and unknown all end here; the TTL on anything Herald set
        // earlier clears it without an explicit call.
        let state = self.player.state();
        if state != PlayerState::Playing {
            debug!("Player state is {state:?}, not updating status");
            return Ok(Outcome::NotPlaying(state));
        }

        // Gate: protect foreign statuses
        if !safe && !self.config.always_override {
            info!("Foreign status present and always_override is off, leaving it alone");
            return Ok(Outcome::ForeignStatusProtected);
        }

        // Act: fetch, filter, set — exactly one set call, never retried.
        let label = match self.player.current_track() {
            Ok(label) => label,
            Err(e) => {
                warn!("Could not read current track: {e:#}");
                return Ok(Outcome::TrackUnavailable);
            }
        };
        let filtered = self.filter.filter(&label);
        let expiration = epoch_now() + self.config.status_ttl_seconds as i64;

        match self
            .api
            .set_status(&filtered, &self.config.status_emoji, expiration)
        {
            Err(e) => {
                error!("Status set failed: {e}");
                Ok(Outcome::SetFailed(e.to_string()))
            }
            Ok(()) => {
                info!("Status set to \"{filtered}\" (expires at {expiration})");
                cache.last_set_by_script = Some(ScriptStatus {
                    text: filtered.clone(),
                    emoji: self.config.status_emoji.clone(),
                    expiration,
                    set_at: epoch_now(),
                });
                // Second checkpoint
                cache.save(cache_path)?;
                Ok(Outcome::Updated {
                    text: filtered,
                    emoji: self.config.status_emoji.clone(),
                    expiration,
                })
            }
        }
    }

    /// Read the remote status, retrying transport/parse failures with
    /// linearly increasing backoff. An application-level error is returned
    /// immediately; the service gave an answer and retrying would not
    /// change it.
    fn read_status_with_retry(&self) -> Result<StatusSnapshot, StatusApiError> {
        let mut attempt = 1;
        loop {
            match self.api.get_status() {
                Ok(snapshot) => return Ok(snapshot),
                Err(e) if e.is_retryable() && attempt < MAX_READ_ATTEMPTS => {
                    let delay = READ_BACKOFF * attempt;
                    warn!(
                        "Status read attempt {attempt}/{MAX_READ_ATTEMPTS} failed ({e}), retrying in {}ms",
                        delay.as_millis()
                    );
                    std::thread::sleep(delay);
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Wire up the concrete collaborators and execute one pass against the
/// real cache file. This is the whole of what a scheduled invocation does.
pub fn run_once(config: &RuntimeConfig) -> Result<Outcome> {
    let player = crate::player::AppleScriptPlayer::new(&config.player_app);
    let api = crate::slack_client::SlackClient::new(config);
    let filter = crate::censor::WordlistFilter::new(&config.censored_words);

    let cache_path = crate::config::get_cache_path()?;
    let mut cache = CacheRecord::load(&cache_path);

    Reconciler::new(config, &player, &api, &filter).run(&mut cache, &cache_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::VecDeque;
    use tempfile::TempDir;

    struct FakePlayer {
        running: bool,
        state: PlayerState,
        track: Option<String>,
    }

    impl Player for FakePlayer {
        fn is_running(&self) -> bool {
            self.running
        }

        fn state(&self) -> PlayerState {
            self.state
        }

        fn current_track(&self) -> Result<String> {
            self.track
                .clone()
                .ok_or_else(|| anyhow::anyhow!("no current track"))
        }
    }

    /// Scripted status API: pops one canned get-result per call.
    struct FakeApi {
        get_results: RefCell<VecDeque<Result<StatusSnapshot, StatusApiError>>>,
        get_calls: Cell<u32>,
        set_calls: RefCell<Vec<(String, String, i64)>>,
        set_result: RefCell<Option<StatusApiError>>,
    }

    impl FakeApi {
        fn returning(snapshot: StatusSnapshot) -> Self {
            Self {
                get_results: RefCell::new(VecDeque::from([Ok(snapshot)])),
                get_calls: Cell::new(0),
                set_calls: RefCell::new(Vec::new()),
                set_result: RefCell::new(None),
            }
        }

        fn failing_with(errors: Vec<StatusApiError>) -> Self {
            Self {
                get_results: RefCell::new(errors.into_iter().map(Err).collect()),
                get_calls: Cell::new(0),
                set_calls: RefCell::new(Vec::new()),
                set_result: RefCell::new(None),
            }
        }
    }

    impl StatusApi for FakeApi {
        fn get_status(&self) -> Result<StatusSnapshot, StatusApiError> {
            self.get_calls.set(self.get_calls.get() + 1);
            self.get_results
                .borrow_mut()
                .pop_front()
                .unwrap_or_else(|| Ok(StatusSnapshot::default()))
        }

        fn set_status(&self, text: &str, emoji: &str, expiration: i64) -> Result<(), StatusApiError> {
            self.set_calls
                .borrow_mut()
                .push((text.to_string(), emoji.to_string(), expiration));
            match self.set_result.borrow_mut().take() {
                Some(e) => Err(e),
                None => Ok(()),
            }
        }
    }

    struct PassthroughFilter;

    impl TextFilter for PassthroughFilter {
        fn filter(&self, input: &str) -> String {
            input.to_string()
        }
    }

    fn test_config() -> RuntimeConfig {
        RuntimeConfig {
            status_emoji: ":headphones:".to_string(),
            status_emoji_unicode: "🎧".to_string(),
            ..RuntimeConfig::default()
        }
    }

    fn playing_player() -> FakePlayer {
        FakePlayer {
            running: true,
            state: PlayerState::Playing,
            track: Some("Miles Davis - So What".to_string()),
        }
    }

    #[test]
    fn test_player_not_running_skips_remote_read() {
        let config = test_config();
        let player = FakePlayer {
            running: false,
            state: PlayerState::Stopped,
            track: None,
        };
        let api = FakeApi::returning(StatusSnapshot::default());
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let cache_path = temp_dir.path().join("cache.json");
        let mut cache = CacheRecord::default();

        let reconciler = Reconciler::new(&config, &player, &api, &PassthroughFilter);
        let outcome = reconciler.run(&mut cache, &cache_path).expect("Run should succeed");

        assert_eq!(outcome, Outcome::PlayerNotRunning);
        assert_eq!(api.get_calls.get(), 0, "No remote read should be attempted");
        assert!(!cache_path.exists(), "Cache should not be persisted");
    }

    #[test]
    fn test_application_error_is_not_retried() {
        let config = test_config();
        let player = playing_player();
        let api = FakeApi::failing_with(vec![StatusApiError::Api("token_revoked".to_string())]);
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut cache = CacheRecord::default();

        let reconciler = Reconciler::new(&config, &player, &api, &PassthroughFilter);
        let outcome = reconciler
            .run(&mut cache, &temp_dir.path().join("cache.json"))
            .expect("Run should succeed");

        assert_eq!(outcome, Outcome::RemoteError("token_revoked".to_string()));
        assert_eq!(api.get_calls.get(), 1, "An explicit API error must not be retried");
        assert!(api.set_calls.borrow().is_empty());
    }

    #[test]
    fn test_transport_failure_retries_then_gives_up() {
        let config = test_config();
        let player = playing_player();
        let api = FakeApi::failing_with(vec![
            StatusApiError::Transport("refused".to_string()),
            StatusApiError::Parse("bad json".to_string()),
            StatusApiError::Transport("refused".to_string()),
        ]);
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut cache = CacheRecord::default();

        let start = std::time::Instant::now();
        let reconciler = Reconciler::new(&config, &player, &api, &PassthroughFilter);
        let outcome = reconciler
            .run(&mut cache, &temp_dir.path().join("cache.json"))
            .expect("Run should succeed");

        assert_eq!(outcome, Outcome::ReadFailed);
        assert_eq!(api.get_calls.get(), 3, "Exactly three attempts");
        // Backoff is 250ms after the first failure and 500ms after the second.
        assert!(start.elapsed() >= Duration::from_millis(750));
        assert!(api.set_calls.borrow().is_empty());
    }

    #[test]
    fn test_transient_failure_recovers_mid_retry() {
        let config = test_config();
        let player = playing_player();
        let api = FakeApi {
            get_results: RefCell::new(VecDeque::from([
                Err(StatusApiError::Transport("refused".to_string())),
                Ok(StatusSnapshot::default()),
            ])),
            get_calls: Cell::new(0),
            set_calls: RefCell::new(Vec::new()),
            set_result: RefCell::new(None),
        };
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut cache = CacheRecord::default();

        let reconciler = Reconciler::new(&config, &player, &api, &PassthroughFilter);
        let outcome = reconciler
            .run(&mut cache, &temp_dir.path().join("cache.json"))
            .expect("Run should succeed");

        assert_eq!(api.get_calls.get(), 2);
        assert!(matches!(outcome, Outcome::Updated { .. }));
    }

    #[test]
    fn test_foreign_status_blocks_and_is_cached() {
        let config = test_config();
        let player = playing_player();
        let api = FakeApi::returning(StatusSnapshot {
            text: "Lunch".to_string(),
            emoji: ":pizza:".to_string(),
            expiration: 0,
        });
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let cache_path = temp_dir.path().join("cache.json");
        let mut cache = CacheRecord::default();

        let reconciler = Reconciler::new(&config, &player, &api, &PassthroughFilter);
        let outcome = reconciler.run(&mut cache, &cache_path).expect("Run should succeed");

        assert_eq!(outcome, Outcome::ForeignStatusProtected);
        assert!(api.set_calls.borrow().is_empty());

        let foreign = cache
            .last_non_empty_non_owned
            .as_ref()
            .expect("Foreign status should be recorded");
        assert_eq!(foreign.text, "Lunch");
        assert_eq!(foreign.emoji, ":pizza:");
        assert!(cache_path.exists(), "Checkpoint 1 should persist the cache");
    }

    #[test]
    fn test_always_override_publishes_over_foreign_status() {
        let config = RuntimeConfig {
            always_override: true,
            ..test_config()
        };
        let player = playing_player();
        let api = FakeApi::returning(StatusSnapshot {
            text: "Lunch".to_string(),
            emoji: ":pizza:".to_string(),
            expiration: 0,
        });
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut cache = CacheRecord::default();

        let reconciler = Reconciler::new(&config, &player, &api, &PassthroughFilter);
        let outcome = reconciler
            .run(&mut cache, &temp_dir.path().join("cache.json"))
            .expect("Run should succeed");

        assert!(matches!(outcome, Outcome::Updated { .. }));
        assert_eq!(api.set_calls.borrow().len(), 1);
        // The foreign status is still recorded even though it got replaced.
        assert!(cache.last_non_empty_non_owned.is_some());
    }

    #[test]
    fn test_partially_set_status_is_safe_to_replace() {
        let config = test_config();
        let player = playing_player();
        let api = FakeApi::returning(StatusSnapshot {
            text: String::new(),
            emoji: ":pizza:".to_string(),
            expiration: 0,
        });
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut cache = CacheRecord::default();

        let reconciler = Reconciler::new(&config, &player, &api, &PassthroughFilter);
        let outcome = reconciler
            .run(&mut cache, &temp_dir.path().join("cache.json"))
            .expect("Run should succeed");

        match outcome {
            Outcome::Updated { text, emoji, .. } => {
                assert_eq!(text, "Miles Davis - So What");
                assert_eq!(emoji, ":headphones:");
            }
            other => panic!("Expected Updated, got {other:?}"),
        }
        let set = cache.last_set_by_script.expect("Set should be recorded");
        assert_eq!(set.text, "Miles Davis - So What");
        // Partially-set status is not fully populated, so it is not a
        // foreign-status observation.
        assert!(cache.last_non_empty_non_owned.is_none());
    }

    #[test]
    fn test_set_failure_leaves_last_set_untouched() {
        let config = test_config();
        let player = playing_player();
        let api = FakeApi::returning(StatusSnapshot::default());
        *api.set_result.borrow_mut() = Some(StatusApiError::Api("profile_set_failed".to_string()));
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut cache = CacheRecord::default();

        let reconciler = Reconciler::new(&config, &player, &api, &PassthroughFilter);
        let outcome = reconciler
            .run(&mut cache, &temp_dir.path().join("cache.json"))
            .expect("Run should succeed");

        assert!(matches!(outcome, Outcome::SetFailed(_)));
        assert_eq!(api.set_calls.borrow().len(), 1, "The set is never retried");
        assert!(cache.last_set_by_script.is_none());
    }

    #[test]
    fn test_expiration_is_now_plus_ttl() {
        let config = RuntimeConfig {
            status_ttl_seconds: 300,
            ..test_config()
        };
        let player = playing_player();
        let api = FakeApi::returning(StatusSnapshot::default());
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let mut cache = CacheRecord::default();

        let before = epoch_now();
        let reconciler = Reconciler::new(&config, &player, &api, &PassthroughFilter);
        reconciler
            .run(&mut cache, &temp_dir.path().join("cache.json"))
            .expect("Run should succeed");
        let after = epoch_now();

        let calls = api.set_calls.borrow();
        let expiration = calls[0].2;
        assert!(expiration >= before + 300 && expiration <= after + 300);
    }
}
