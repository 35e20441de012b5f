//! Media-player integration.
//!
//! Herald asks the player three questions: is it running, what state is it
//! in, and what is playing. The [`Player`] trait answers them; the
//! concrete [`AppleScriptPlayer`] shells out to `pgrep` and `osascript`
//! the same way Herald shells out for everything process-shaped.
//!
//! Player failures are absorbed here, not propagated: a player that can't
//! be queried reports "not running" or [`PlayerState::Unknown`], which
//! steers the reconciler onto its safe no-op path. The only operation
//! that surfaces an error is reading the track label, because by that
//! point the reconciler has already decided the player is playing and a
//! missing label means the run must stop rather than publish garbage.

use anyhow::{Context, Result};
use log::{debug, warn};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// How long any single player query may take before it is killed.
const QUERY_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll interval while waiting on an external process.
const WAIT_POLL: Duration = Duration::from_millis(25);

/// Playback state as reported by the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Playing,
    Paused,
    Stopped,
    /// The player answered something unrecognized, or not at all.
    Unknown,
}

impl PlayerState {
    /// Parse the state string `osascript` prints for `player state`.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "playing" => PlayerState::Playing,
            "paused" => PlayerState::Paused,
            "stopped" => PlayerState::Stopped,
            other => {
                if !other.is_empty() {
                    debug!("Unrecognized player state: {other}");
                }
                PlayerState::Unknown
            }
        }
    }
}

/// The media-player capability consumed by the reconciler.
pub trait Player {
    /// Whether the player application is running at all.
    fn is_running(&self) -> bool;

    /// Current playback state. Query failures come back as
    /// [`PlayerState::Unknown`].
    fn state(&self) -> PlayerState;

    /// Label of the currently playing track, formatted `Artist - Title`.
    fn current_track(&self) -> Result<String>;
}

/// Player integration for macOS media players scriptable via AppleScript
/// (Music, Spotify, and friends).
pub struct AppleScriptPlayer {
    app: String,
}

impl AppleScriptPlayer {
    pub fn new(app: &str) -> Self {
        Self { app: app.to_string() }
    }

    /// Run `osascript -e <script>` and return trimmed stdout.
    fn osascript(&self, script: &str) -> Result<String> {
        let output = run_with_timeout("osascript", &["-e", script], QUERY_TIMEOUT)?;
        Ok(output.trim().to_string())
    }
}

impl Player for AppleScriptPlayer {
    fn is_running(&self) -> bool {
        // pgrep -x matches the process name exactly; a dead or absent
        // player is simply "not running", never an error.
        match run_with_timeout("pgrep", &["-x", &self.app], QUERY_TIMEOUT) {
            Ok(_) => true,
            Err(e) => {
                debug!("Player {} not detected: {e}", self.app);
                false
            }
        }
    }

    fn state(&self) -> PlayerState {
        let script = format!("tell application \"{}\" to player state as string", self.app);
        match self.osascript(&script) {
            Ok(output) => PlayerState::parse(&output),
            Err(e) => {
                warn!("Could not query player state: {e}");
                PlayerState::Unknown
            }
        }
    }

    fn current_track(&self) -> Result<String> {
        let script = format!(
            "tell application \"{}\" to get artist of current track & \" - \" & name of current track",
            self.app
        );
        let label = self
            .osascript(&script)
            .with_context(|| format!("Failed to read current track from {}", self.app))?;

        if label.trim().is_empty() {
            anyhow::bail!("Player {} returned an empty track label", self.app);
        }
        Ok(label)
    }
}

/// Run an external command with a hard deadline.
///
/// The child is killed once the deadline passes; a non-zero exit is an
/// error carrying the command's stderr.
fn run_with_timeout(program: &str, args: &[&str], timeout: Duration) -> Result<String> {
    let mut child = Command::new(program)
        .args(args)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(Stdio::null())
        .spawn()
        .with_context(|| format!("Failed to execute {program}"))?;

    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(_)) => break,
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    anyhow::bail!("{program} timed out after {}s", timeout.as_secs());
                }
                std::thread::sleep(WAIT_POLL);
            }
            Err(e) => {
                let _ = child.kill();
                return Err(e).with_context(|| format!("Failed waiting on {program}"));
            }
        }
    }

    let output = child
        .wait_with_output()
        .with_context(|| format!("Failed to collect output of {program}"))?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        anyhow::bail!("{program} exited with {}: {}", output.status, stderr.trim());
    }

    Ok(String::from_utf8_lossy(&output.stdout).to_string())
}
