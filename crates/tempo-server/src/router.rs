//! Axum router construction for the relay.
//!
//! Assembles the observer `WebSocket` and the HTTP routes into a single
//! [`Router`] with CORS and request tracing.

use std::sync::Arc;

use axum::http::header::{ACCEPT, CONTENT_TYPE, ORIGIN};
use axum::http::{HeaderName, Method};
use axum::routing::get;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete router.
///
/// - `GET /` -- HTML status page
/// - `GET /status` -- JSON status report
/// - `GET /ws` -- observer `WebSocket`
///
/// Any origin is allowed; browser observers are served from elsewhere.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([
            ORIGIN,
            HeaderName::from_static("x-requested-with"),
            CONTENT_TYPE,
            ACCEPT,
        ]);

    Router::new()
        .route("/", get(handlers::index))
        .route("/status", get(handlers::status))
        .route("/ws", get(ws::ws_observer))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
