//! HTTP handlers for the status endpoint and the landing page.

use std::sync::Arc;

use axum::extract::State;
use axum::response::{Html, IntoResponse};
use axum::Json;
use chrono::Utc;
use tempo_types::StatusReport;

use crate::error::ApiError;
use crate::state::AppState;

/// Report relay health, peer count, tempo and observer count.
///
/// # Route
///
/// `GET /status`
pub async fn status(State(state): State<Arc<AppState>>) -> Result<Json<StatusReport>, ApiError> {
    let report = state.hub.status().await?;
    Ok(Json(report))
}

/// Minimal HTML page with the live status.
///
/// # Route
///
/// `GET /`
pub async fn index(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let report = state.hub.status().await?;
    let peers = report.num_peers;
    let bpm = format!("{:.2}", report.bpm);
    let clients = report.connected_clients;
    let uptime = Utc::now()
        .signed_duration_since(state.started_at)
        .num_seconds();

    Ok(Html(format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
    <meta charset="utf-8">
    <title>Tempo Relay</title>
    <style>
        body {{ font-family: monospace; padding: 2rem; }}
        .metric {{ display: inline-block; margin-right: 2rem; }}
        .value {{ font-size: 1.5rem; font-weight: bold; }}
    </style>
</head>
<body>
    <h1>Tempo Relay</h1>
    <p>Shared tempo clock for observers</p>

    <p>Status: <strong>{status}</strong> (up {uptime}s)</p>

    <div>
        <div class="metric">
            <div>BPM</div>
            <div class="value">{bpm}</div>
        </div>
        <div class="metric">
            <div>Peers</div>
            <div class="value">{peers}</div>
        </div>
        <div class="metric">
            <div>Observers</div>
            <div class="value">{clients}</div>
        </div>
    </div>

    <h2>Endpoints</h2>
    <ul>
        <li><a href="/status">GET /status</a> -- Relay status as JSON</li>
        <li>GET /ws -- Observer <code>WebSocket</code> (link-status, link-update, bpm-changed, transport-state)</li>
    </ul>
</body>
</html>"#,
        status = report.status.to_uppercase(),
    )))
}

