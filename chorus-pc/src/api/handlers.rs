//! HTTP request handlers
//!
//! Thin translation layer: extract the actor and arguments, hand one
//! `Action` to the session, serialize the outcome. All policy lives in the
//! session state machine.

use crate::api::AppContext;
use crate::error::Error;
use crate::session::{Action, ActionOutcome, SessionSnapshot};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chorus_common::events::NodeEvent;
use chorus_common::model::{ChannelId, EqPreset, ParticipantId, SessionId, Track};
use serde::{Deserialize, Serialize};
use tracing::info;

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct ActorRequest {
    pub actor: u64,
}

#[derive(Debug, Deserialize)]
pub struct ConnectRequest {
    pub actor: u64,
    #[serde(default)]
    pub channel: Option<u64>,
}

#[derive(Debug, Deserialize)]
pub struct PlayRequest {
    pub actor: u64,
    pub query: String,
}

#[derive(Debug, Deserialize)]
pub struct VolumeRequest {
    pub actor: u64,
    pub volume: u8, // 1-100 user-facing scale
}

#[derive(Debug, Deserialize)]
pub struct EqualizerRequest {
    pub actor: u64,
    pub preset: String,
}

#[derive(Debug, Serialize)]
pub struct QueueResponse {
    pub current: Option<Track>,
    pub upcoming: Vec<Track>,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Coordinator error mapped onto an HTTP response
pub struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            Error::NotConnected | Error::AlreadyElsewhere => StatusCode::CONFLICT,
            Error::InvalidChannel | Error::InvalidArgument(_) => StatusCode::BAD_REQUEST,
            Error::NoTrackFound => StatusCode::NOT_FOUND,
            Error::CollaboratorFailure(_) => StatusCode::BAD_GATEWAY,
            Error::Common(chorus_common::Error::NotFound(_)) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(ErrorResponse {
            error: self.0.to_string(),
        });
        (status, body).into_response()
    }
}

type ApiResult<T> = std::result::Result<T, ApiError>;

// ============================================================================
// Session read endpoints
// ============================================================================

/// GET /session/:id - session snapshot
pub async fn get_session(
    State(ctx): State<AppContext>,
    Path(session_id): Path<u64>,
) -> ApiResult<Json<SessionSnapshot>> {
    let session = ctx
        .registry
        .get(SessionId(session_id))
        .await
        .ok_or_else(session_not_found)?;
    Ok(Json(session.snapshot().await))
}

/// GET /session/:id/queue - current track plus upcoming tracks
pub async fn get_queue(
    State(ctx): State<AppContext>,
    Path(session_id): Path<u64>,
) -> ApiResult<Json<QueueResponse>> {
    let session = ctx
        .registry
        .get(SessionId(session_id))
        .await
        .ok_or_else(session_not_found)?;
    let snapshot = session.snapshot().await;
    Ok(Json(QueueResponse {
        current: snapshot.current,
        upcoming: session.upcoming(10).await,
    }))
}

/// GET /info - coordinator statistics
pub async fn get_info(State(ctx): State<AppContext>) -> Json<crate::registry::RegistryStats> {
    Json(ctx.registry.stats().await)
}

// ============================================================================
// Session action endpoints
// ============================================================================

/// POST /session/:id/connect
///
/// Creates the session on first use.
pub async fn connect(
    State(ctx): State<AppContext>,
    Path(session_id): Path<u64>,
    Json(req): Json<ConnectRequest>,
) -> ApiResult<Json<ActionOutcome>> {
    let session = ctx.registry.get_or_create(SessionId(session_id)).await;
    let outcome = session
        .request_action(
            ParticipantId(req.actor),
            Action::Connect {
                channel: req.channel.map(ChannelId),
            },
        )
        .await?;
    Ok(Json(outcome))
}

/// POST /session/:id/play
///
/// Creates the session on first use and auto-connects it.
pub async fn play(
    State(ctx): State<AppContext>,
    Path(session_id): Path<u64>,
    Json(req): Json<PlayRequest>,
) -> ApiResult<Json<ActionOutcome>> {
    let session = ctx.registry.get_or_create(SessionId(session_id)).await;
    let outcome = session
        .request_action(ParticipantId(req.actor), Action::Play { query: req.query })
        .await?;
    Ok(Json(outcome))
}

pub async fn pause(
    ctx: State<AppContext>,
    path: Path<u64>,
    Json(req): Json<ActorRequest>,
) -> ApiResult<Json<ActionOutcome>> {
    act(ctx, path, req.actor, Action::Pause).await
}

pub async fn resume(
    ctx: State<AppContext>,
    path: Path<u64>,
    Json(req): Json<ActorRequest>,
) -> ApiResult<Json<ActionOutcome>> {
    act(ctx, path, req.actor, Action::Resume).await
}

pub async fn skip(
    ctx: State<AppContext>,
    path: Path<u64>,
    Json(req): Json<ActorRequest>,
) -> ApiResult<Json<ActionOutcome>> {
    act(ctx, path, req.actor, Action::Skip).await
}

/// POST /session/:id/stop
///
/// A stop that executes also removes the session from the registry.
pub async fn stop(
    State(ctx): State<AppContext>,
    Path(session_id): Path<u64>,
    Json(req): Json<ActorRequest>,
) -> ApiResult<Json<ActionOutcome>> {
    let id = SessionId(session_id);
    let session = ctx.registry.get(id).await.ok_or_else(session_not_found)?;
    let outcome = session
        .request_action(ParticipantId(req.actor), Action::Stop)
        .await?;
    if outcome == ActionOutcome::Executed {
        ctx.registry.remove(id).await;
    }
    Ok(Json(outcome))
}

pub async fn shuffle(
    ctx: State<AppContext>,
    path: Path<u64>,
    Json(req): Json<ActorRequest>,
) -> ApiResult<Json<ActionOutcome>> {
    act(ctx, path, req.actor, Action::Shuffle).await
}

pub async fn repeat(
    ctx: State<AppContext>,
    path: Path<u64>,
    Json(req): Json<ActorRequest>,
) -> ApiResult<Json<ActionOutcome>> {
    act(ctx, path, req.actor, Action::Repeat).await
}

pub async fn set_volume(
    ctx: State<AppContext>,
    path: Path<u64>,
    Json(req): Json<VolumeRequest>,
) -> ApiResult<Json<ActionOutcome>> {
    act(ctx, path, req.actor, Action::SetVolume { volume: req.volume }).await
}

pub async fn volume_up(
    ctx: State<AppContext>,
    path: Path<u64>,
    Json(req): Json<ActorRequest>,
) -> ApiResult<Json<ActionOutcome>> {
    act(ctx, path, req.actor, Action::VolumeUp).await
}

pub async fn volume_down(
    ctx: State<AppContext>,
    path: Path<u64>,
    Json(req): Json<ActorRequest>,
) -> ApiResult<Json<ActionOutcome>> {
    act(ctx, path, req.actor, Action::VolumeDown).await
}

pub async fn set_equalizer(
    ctx: State<AppContext>,
    path: Path<u64>,
    Json(req): Json<EqualizerRequest>,
) -> ApiResult<Json<ActionOutcome>> {
    let preset = EqPreset::parse(&req.preset).ok_or_else(|| {
        ApiError(Error::InvalidArgument(format!(
            "Unknown equalizer preset '{}'",
            req.preset
        )))
    })?;
    act(ctx, path, req.actor, Action::SetEqualizer { preset }).await
}

/// Shared path for actions on an existing session
async fn act(
    State(ctx): State<AppContext>,
    Path(session_id): Path<u64>,
    actor: u64,
    action: Action,
) -> ApiResult<Json<ActionOutcome>> {
    let session = ctx
        .registry
        .get(SessionId(session_id))
        .await
        .ok_or_else(session_not_found)?;
    let outcome = session
        .request_action(ParticipantId(actor), action)
        .await?;
    Ok(Json(outcome))
}

fn session_not_found() -> ApiError {
    ApiError(Error::Common(chorus_common::Error::NotFound(
        "No such session".to_string(),
    )))
}

// ============================================================================
// Audio node callback
// ============================================================================

/// POST /node/events - asynchronous audio node callback
pub async fn node_event(
    State(ctx): State<AppContext>,
    Json(event): Json<NodeEvent>,
) -> StatusCode {
    info!("Node event: {:?}", event);
    ctx.registry.dispatch(&event).await;
    StatusCode::ACCEPTED
}
