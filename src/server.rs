//! Local config/log web service.
//!
//! A tiny HTTP server for the two chores that are annoying over SSH:
//! editing Herald's configuration and reading its log file. Serves an
//! embedded single-page front-end plus a JSON API:
//!
//! - `GET  /`                → the front-end
//! - `GET  /api/config`      → current configuration
//! - `PUT  /api/config`      → validate and persist a new configuration
//! - `GET  /api/logs?lines=N` → last N log lines (default 200)
//! - `POST /api/logs/clear`  → truncate the log file
//!
//! When `server_username` is set, every route requires HTTP Basic Auth.
//! The server binds loopback by default and holds no in-memory state: the
//! config and log files on disk are the single source of truth, so edits
//! made here are picked up by the next reconciliation pass without any
//! coordination.

use anyhow::{Context, Result};
use axum::extract::{Query, Request, State};
use axum::http::{header, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{Html, IntoResponse, Json, Response};
use axum::routing::{get, post};
use axum::Router;
use base64::Engine as _;
use log::{info, warn};
use serde::Deserialize;
use std::path::PathBuf;
use tokio::net::TcpListener;

use crate::config::RuntimeConfig;
use crate::logging;

/// Default number of log lines returned by `GET /api/logs`.
const DEFAULT_TAIL_LINES: usize = 200;

/// The embedded browser front-end.
const INDEX_HTML: &str = include_str!("../assets/index.html");

/// Shared state for axum handlers.
#[derive(Clone)]
struct AppState {
    config_path: PathBuf,
    log_path: PathBuf,
    /// `Some((username, password))` when Basic Auth is enabled.
    auth: Option<(String, String)>,
}

/// Run the web service until the process is terminated.
///
/// Blocks the calling thread on a tokio runtime created for this command
/// only; the reconciler never runs inside it.
pub fn serve(config: &RuntimeConfig) -> Result<()> {
    let state = AppState {
        config_path: crate::config::get_config_path()?,
        log_path: crate::config::get_log_path()?,
        auth: if config.server_username.is_empty() {
            None
        } else {
            Some((config.server_username.clone(), config.server_password.clone()))
        },
    };

    if state.auth.is_none() {
        warn!("Web service running without authentication; keep server_bind on loopback");
    }

    let bind_addr = config.server_bind.clone();
    let runtime = tokio::runtime::Runtime::new().context("Failed to start tokio runtime")?;

    runtime.block_on(async move {
        let app = Router::new()
            .route("/", get(handle_index))
            .route("/api/config", get(handle_get_config).put(handle_put_config))
            .route("/api/logs", get(handle_get_logs))
            .route("/api/logs/clear", post(handle_clear_logs))
            .layer(middleware::from_fn_with_state(state.clone(), require_auth))
            .with_state(state);

        let listener = TcpListener::bind(&bind_addr)
            .await
            .with_context(|| format!("Failed to bind web service to {bind_addr}"))?;

        info!("Web service listening on http://{bind_addr}/");
        axum::serve(listener, app)
            .await
            .context("Web service terminated unexpectedly")
    })
}

/// Basic-Auth gate applied to every route.
async fn require_auth(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let Some((username, password)) = &state.auth else {
        return next.run(request).await;
    };

    let expected = format!("{username}:{password}");
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Basic "))
        .and_then(|encoded| base64::engine::general_purpose::STANDARD.decode(encoded).ok())
        .and_then(|bytes| String::from_utf8(bytes).ok())
        .map(|credentials| credentials == expected)
        .unwrap_or(false);

    if !authorized {
        return (
            StatusCode::UNAUTHORIZED,
            [(header::WWW_AUTHENTICATE, "Basic realm=\"herald\"")],
            "unauthorized",
        )
            .into_response();
    }

    next.run(request).await
}

async fn handle_index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// Read the config file fresh on every request; the watch process may have
/// rewritten defaults since the server started.
async fn handle_get_config(State(state): State<AppState>) -> Response {
    match RuntimeConfig::load_from(&state.config_path) {
        Ok(config) => Json(config).into_response(),
        Err(e) => {
            warn!("Config read failed: {e:#}");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("config read failed: {e}")).into_response()
        }
    }
}

async fn handle_put_config(
    State(state): State<AppState>,
    Json(config): Json<RuntimeConfig>,
) -> Response {
    if let Err(e) = config.validate() {
        return (StatusCode::BAD_REQUEST, format!("invalid config: {e}")).into_response();
    }

    match config.save_to(&state.config_path) {
        Ok(()) => {
            info!("Configuration updated via web service");
            Json(config).into_response()
        }
        Err(e) => {
            warn!("Config save failed: {e:#}");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("config save failed: {e}")).into_response()
        }
    }
}

#[derive(Deserialize)]
struct LogsQuery {
    lines: Option<usize>,
}

async fn handle_get_logs(State(state): State<AppState>, Query(query): Query<LogsQuery>) -> Response {
    let n = query.lines.unwrap_or(DEFAULT_TAIL_LINES);
    match logging::tail_lines(&state.log_path, n) {
        Ok(lines) => Json(serde_json::json!({ "lines": lines })).into_response(),
        Err(e) => {
            warn!("Log tail failed: {e:#}");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("log read failed: {e}")).into_response()
        }
    }
}

async fn handle_clear_logs(State(state): State<AppState>) -> Response {
    match logging::clear_log(&state.log_path) {
        Ok(()) => {
            info!("Log file cleared via web service");
            StatusCode::NO_CONTENT.into_response()
        }
        Err(e) => {
            warn!("Log clear failed: {e:#}");
            (StatusCode::INTERNAL_SERVER_ERROR, format!("log clear failed: {e}")).into_response()
        }
    }
}
