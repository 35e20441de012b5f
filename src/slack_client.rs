//! Chat-service status API client.
//!
//! Talks to the Slack Web API (`users.profile.get` / `users.profile.set`)
//! over plain blocking HTTP. The reconciler only sees the [`StatusApi`]
//! trait, which keeps the decision logic testable without a network and
//! leaves the wire format contained here.
//!
//! The error type splits failures into the three classes the retry policy
//! cares about: transport problems and unparsable bodies may be retried;
//! an application-level failure (`ok: false`) is an explicit answer from
//! the server and must never be retried.

use crate::config::RuntimeConfig;
use log::debug;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Per-request timeout for the chat service.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Remote status as observed on one read. Read-only view of server state
/// at a point in time; Herald never mutates a snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub text: String,
    pub emoji: String,
    pub expiration: i64,
}

/// Failure classes for remote status calls.
#[derive(Debug, Error)]
pub enum StatusApiError {
    /// Network-level failure: connection refused, timeout, non-success HTTP.
    #[error("transport error: {0}")]
    Transport(String),

    /// The response arrived but was not the JSON shape we expect.
    #[error("malformed response: {0}")]
    Parse(String),

    /// The service answered with an explicit failure (`ok: false`).
    #[error("api error: {0}")]
    Api(String),
}

impl StatusApiError {
    /// Whether the reconciler's bounded read-retry may try again.
    ///
    /// Only transport and parse failures qualify. An explicit API error is
    /// an answer, not a glitch.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        !matches!(self, StatusApiError::Api(_))
    }
}

/// The remote status capability consumed by the reconciler.
pub trait StatusApi {
    /// Read the current profile status.
    fn get_status(&self) -> Result<StatusSnapshot, StatusApiError>;

    /// Overwrite the profile status. `expiration` is an absolute epoch
    /// timestamp after which the server clears the status on its own.
    fn set_status(&self, text: &str, emoji: &str, expiration: i64) -> Result<(), StatusApiError>;
}

/// Concrete Slack Web API client.
pub struct SlackClient {
    agent: ureq::Agent,
    token: String,
    base_url: String,
}

impl SlackClient {
    /// Build a client from the runtime configuration.
    pub fn new(config: &RuntimeConfig) -> Self {
        Self::with_base_url(&config.slack_token, "https://slack.com/api")
    }

    /// Build a client against an explicit API root. Tests point this at a
    /// local server.
    pub fn with_base_url(token: &str, base_url: &str) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(REQUEST_TIMEOUT)
            .build();

        Self {
            agent,
            token: token.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Issue a request and parse the envelope shared by all Web API
    /// methods: a JSON object with `ok: bool` and an `error` code on
    /// failure.
    fn call(&self, method: &str, body: Option<serde_json::Value>) -> Result<serde_json::Value, StatusApiError> {
        let url = format!("{}/{method}", self.base_url);
        debug!("Calling {method}");

        let request = self
            .agent
            .post(&url)
            .set("Authorization", &format!("Bearer {}", self.token))
            .set("Content-Type", "application/json; charset=utf-8");

        let response = match body {
            Some(json) => request.send_json(json),
            None => request.call(),
        };

        let response = response.map_err(|e| match e {
            ureq::Error::Status(code, _) => StatusApiError::Transport(format!("HTTP {code} from {method}")),
            ureq::Error::Transport(t) => StatusApiError::Transport(t.to_string()),
        })?;

        let value: serde_json::Value = response
            .into_json()
            .map_err(|e| StatusApiError::Parse(format!("{method}: {e}")))?;

        let ok = value
            .get("ok")
            .and_then(serde_json::Value::as_bool)
            .ok_or_else(|| StatusApiError::Parse(format!("{method}: missing 'ok' field")))?;

        if !ok {
            let code = value
                .get("error")
                .and_then(serde_json::Value::as_str)
                .unwrap_or("unknown_error");
            return Err(StatusApiError::Api(code.to_string()));
        }

        Ok(value)
    }
}

impl StatusApi for SlackClient {
    fn get_status(&self) -> Result<StatusSnapshot, StatusApiError> {
        let value = self.call("users.profile.get", None)?;

        let profile = value
            .get("profile")
            .ok_or_else(|| StatusApiError::Parse("users.profile.get: missing 'profile'".to_string()))?;

        let text = profile
            .get("status_text")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string();
        let emoji = profile
            .get("status_emoji")
            .and_then(serde_json::Value::as_str)
            .unwrap_or_default()
            .to_string();
        let expiration = profile
            .get("status_expiration")
            .and_then(serde_json::Value::as_i64)
            .unwrap_or(0);

        Ok(StatusSnapshot { text, emoji, expiration })
    }

    fn set_status(&self, text: &str, emoji: &str, expiration: i64) -> Result<(), StatusApiError> {
        let body = serde_json::json!({
            "profile": {
                "status_text": text,
                "status_emoji": emoji,
                "status_expiration": expiration,
            }
        });

        self.call("users.profile.set", Some(body))?;
        Ok(())
    }
}
