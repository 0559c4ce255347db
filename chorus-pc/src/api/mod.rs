//! REST API for the playback coordinator
//!
//! One route tree per session under `/session/:id`, a coordinator-wide
//! `/info`, an SSE stream at `/events` and the audio-node callback at
//! `/node/events`.

pub mod handlers;
pub mod sse;

use crate::registry::SessionRegistry;
use axum::{
    extract::State,
    response::Json,
    routing::{get, post},
    Router,
};
use chorus_common::events::EventBus;
use serde_json::json;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppContext {
    pub registry: Arc<SessionRegistry>,
    pub events: Arc<EventBus>,
    pub port: u16,
}

/// Create the API router
pub fn create_router(ctx: AppContext) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/info", get(handlers::get_info))
        .route("/events", get(sse::event_stream))
        .route("/node/events", post(handlers::node_event))
        .route("/session/:session_id", get(handlers::get_session))
        .route("/session/:session_id/queue", get(handlers::get_queue))
        .route("/session/:session_id/connect", post(handlers::connect))
        .route("/session/:session_id/play", post(handlers::play))
        .route("/session/:session_id/pause", post(handlers::pause))
        .route("/session/:session_id/resume", post(handlers::resume))
        .route("/session/:session_id/skip", post(handlers::skip))
        .route("/session/:session_id/stop", post(handlers::stop))
        .route("/session/:session_id/shuffle", post(handlers::shuffle))
        .route("/session/:session_id/repeat", post(handlers::repeat))
        .route("/session/:session_id/volume", post(handlers::set_volume))
        .route("/session/:session_id/volume/up", post(handlers::volume_up))
        .route("/session/:session_id/volume/down", post(handlers::volume_down))
        .route("/session/:session_id/equalizer", post(handlers::set_equalizer))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(ctx)
}

/// Health check endpoint
async fn health_check(State(ctx): State<AppContext>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "module": "chorus-pc",
        "version": env!("CARGO_PKG_VERSION"),
        "port": ctx.port,
    }))
}
