//! HTTP handlers for conversation endpoints.
//!
//! These handlers connect Axum routes to the conversation registry.

use std::sync::Arc;

use axum::extract::{Json, Path, State};
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::IntoResponse;
use futures::stream::{self, Stream, StreamExt};
use tokio::sync::broadcast;

use crate::application::{ConversationRegistry, OrchestratorError};
use crate::domain::conversation::{
    ConversationConfig, ConversationEvent, ConversationId, ParticipantPatch, Speaker,
};

use super::dto::{
    ControlResponse, ConversationCreated, ConversationDetail, ErrorResponse, ExportDocument,
    PatchResponse,
};

/// Shared application state for conversation handlers.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<ConversationRegistry>,
}

impl AppState {
    pub fn new(registry: Arc<ConversationRegistry>) -> Self {
        Self { registry }
    }
}

/// POST /api/conversations - Validate, register and launch a conversation.
///
/// # Errors
/// - 400 Bad Request: configuration out of bounds or provider unconfigured
pub async fn create_conversation(
    State(state): State<AppState>,
    Json(config): Json<ConversationConfig>,
) -> Result<impl IntoResponse, ApiError> {
    let handle = state.registry.create(config)?;

    let body = ConversationCreated {
        id: handle.id(),
        status: handle.status(),
        created_at: handle.created_at(),
    };
    Ok((StatusCode::CREATED, Json(body)))
}

/// GET /api/conversations/{id} - Full conversation detail.
///
/// # Errors
/// - 400 Bad Request: malformed id
/// - 404 Not Found: unknown conversation
pub async fn get_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let handle = state.registry.get(parse_id(&id)?)?;
    Ok(Json(ConversationDetail::from(handle.snapshot())))
}

/// POST /api/conversations/{id}/pause
///
/// # Errors
/// - 400 Bad Request: not currently running
/// - 404 Not Found / 409 Conflict: unknown or terminal conversation
pub async fn pause_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    state.registry.pause(id)?;
    control_response(&state, id)
}

/// POST /api/conversations/{id}/resume
///
/// # Errors
/// - 400 Bad Request: not currently paused
/// - 404 Not Found / 409 Conflict: unknown or terminal conversation
pub async fn resume_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    state.registry.resume(id)?;
    control_response(&state, id)
}

/// POST /api/conversations/{id}/stop
///
/// The stop is honored at the turn loop's next checkpoint; a turn
/// already in flight still lands in the log first.
///
/// # Errors
/// - 404 Not Found / 409 Conflict: unknown or terminal conversation
pub async fn stop_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    state.registry.stop(id)?;
    control_response(&state, id)
}

/// PATCH /api/conversations/{id}/participants/{index} - Edit persona
/// and/or temperature mid-run.
///
/// # Errors
/// - 400 Bad Request: bad index, empty patch or out-of-bounds value
/// - 404 Not Found / 409 Conflict: unknown or terminal conversation
pub async fn patch_participant(
    State(state): State<AppState>,
    Path((id, index)): Path<(String, u8)>,
    Json(patch): Json<ParticipantPatch>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let speaker = Speaker::from_index(index).ok_or_else(|| {
        ApiError::BadRequest(format!("participant index must be 1 or 2, got {}", index))
    })?;

    let config = state.registry.patch_participant(id, speaker, &patch)?;
    Ok(Json(PatchResponse {
        id,
        participant: index,
        config,
    }))
}

/// GET /api/conversations/{id}/events - Server-sent event stream.
///
/// Replays every message appended so far, then delivers live events
/// until a terminal status event closes the stream. A subscriber that
/// attaches after the conversation ended receives the backfill and one
/// terminal status event.
pub async fn stream_events(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Sse<impl Stream<Item = Result<Event, axum::Error>>>, ApiError> {
    let handle = state.registry.get(parse_id(&id)?)?;
    let subscription = handle.subscribe();

    let backfill = subscription
        .backfill
        .into_iter()
        .map(ConversationEvent::Message);

    let live: std::pin::Pin<Box<dyn Stream<Item = ConversationEvent> + Send>> =
        if subscription.status.is_terminal() {
            Box::pin(stream::iter([ConversationEvent::Status {
                status: subscription.status,
                error: subscription.error_detail,
            }]))
        } else {
            Box::pin(live_events(subscription.receiver))
        };

    let events = stream::iter(backfill)
        .chain(live)
        .map(|event| Event::default().event(event.kind()).json_data(&event));

    Ok(Sse::new(events).keep_alive(KeepAlive::default()))
}

/// Live tail of a conversation's event channel.
///
/// Ends after forwarding the terminal status event. Lagged receivers
/// skip ahead rather than erroring the stream.
fn live_events(
    receiver: broadcast::Receiver<ConversationEvent>,
) -> impl Stream<Item = ConversationEvent> {
    stream::unfold(Some(receiver), |state| async move {
        let mut receiver = state?;
        loop {
            match receiver.recv().await {
                Ok(event) => {
                    let next = if event.is_terminal() {
                        None
                    } else {
                        Some(receiver)
                    };
                    return Some((event, next));
                }
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
}

/// GET /api/conversations/{id}/export - Download the conversation as a
/// versioned JSON document.
pub async fn export_conversation(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let handle = state.registry.get(parse_id(&id)?)?;
    let export = ExportDocument::new(handle.snapshot());

    let disposition = format!("attachment; filename=\"{}\"", export.filename());
    let disposition = HeaderValue::from_str(&disposition)
        .map_err(|_| ApiError::Internal("export filename was not a valid header".to_string()))?;

    Ok(([(header::CONTENT_DISPOSITION, disposition)], Json(export)))
}

fn parse_id(raw: &str) -> Result<ConversationId, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::BadRequest("invalid conversation id format".to_string()))
}

fn control_response(state: &AppState, id: ConversationId) -> Result<impl IntoResponse, ApiError> {
    let handle = state.registry.get(id)?;
    Ok(Json(ControlResponse {
        id,
        status: handle.status(),
    }))
}

/// API-level errors with their HTTP mapping.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        match err {
            OrchestratorError::InvalidConfig(_) | OrchestratorError::InvalidPatch(_) => {
                ApiError::BadRequest(err.to_string())
            }
            OrchestratorError::NotFound(_) => ApiError::NotFound(err.to_string()),
            OrchestratorError::ConversationTerminal { .. } => ApiError::Conflict(err.to_string()),
            OrchestratorError::Provider(_) => ApiError::Internal(err.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, error) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorResponse::bad_request(msg)),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorResponse::not_found(msg)),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, ErrorResponse::conflict(msg)),
            ApiError::Internal(msg) => {
                tracing::error!("internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ErrorResponse::internal("An internal error occurred"),
                )
            }
        };

        (status, Json(error)).into_response()
    }
}
