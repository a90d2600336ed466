use super::state::AppState;
use crate::error::SessionError;
use crate::session::{SessionView, SubmitOutcome};
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

// ============================================================================
// Request/Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct UpdateAnswerRequest {
    pub answer: String,
}

#[derive(Debug, Serialize)]
pub struct StopRecordingResponse {
    /// Transcript appended to the answer, if any
    pub transcript: Option<String>,
    pub session: SessionView,
}

#[derive(Debug, Serialize)]
pub struct SubmitAnswerResponse {
    #[serde(flatten)]
    pub outcome: SubmitOutcome,
    pub session: SessionView,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

/// Map a session failure onto a status code
fn error_response(e: anyhow::Error) -> Response {
    let status = match e.downcast_ref::<SessionError>() {
        Some(SessionError::InvalidPhase { .. })
        | Some(SessionError::AlreadyRecording)
        | Some(SessionError::AlreadyJoined(_)) => StatusCode::CONFLICT,
        Some(SessionError::CandidateOnly { .. }) => StatusCode::FORBIDDEN,
        Some(SessionError::Closed) => StatusCode::GONE,
        Some(SessionError::Media(_)) => StatusCode::SERVICE_UNAVAILABLE,
        Some(SessionError::Connection(_))
        | Some(SessionError::Transcription(_))
        | Some(SessionError::Submission(_)) => StatusCode::BAD_GATEWAY,
        None => StatusCode::INTERNAL_SERVER_ERROR,
    };

    if status.is_server_error() {
        error!("Request failed: {:#}", e);
    } else {
        warn!("Request rejected: {:#}", e);
    }

    (
        status,
        Json(ErrorResponse {
            error: format!("{:#}", e),
        }),
    )
        .into_response()
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /session
pub async fn get_session(State(state): State<AppState>) -> impl IntoResponse {
    Json(state.session.view().await)
}

/// POST /session/start
pub async fn start_interview(State(state): State<AppState>) -> Response {
    info!("Start requested for interview {}", state.session.room().interview_id);

    match state.session.start_interview().await {
        Ok(()) => (StatusCode::ACCEPTED, Json(state.session.view().await)).into_response(),
        Err(e) => error_response(e),
    }
}

/// PUT /session/answer
pub async fn update_answer(
    State(state): State<AppState>,
    Json(req): Json<UpdateAnswerRequest>,
) -> Response {
    match state.session.update_answer(req.answer).await {
        Ok(()) => Json(state.session.view().await).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /session/submit
pub async fn submit_answer(State(state): State<AppState>) -> Response {
    match state.session.submit_answer().await {
        Ok(outcome) => Json(SubmitAnswerResponse {
            outcome,
            session: state.session.view().await,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /session/recording/start
pub async fn start_recording(State(state): State<AppState>) -> Response {
    match state.session.start_recording().await {
        Ok(()) => Json(state.session.view().await).into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /session/recording/stop
/// Stop recording and append the transcript to the answer
pub async fn stop_recording(State(state): State<AppState>) -> Response {
    match state.session.stop_recording().await {
        Ok(transcript) => Json(StopRecordingResponse {
            transcript,
            session: state.session.view().await,
        })
        .into_response(),
        Err(e) => error_response(e),
    }
}

/// POST /session/leave
pub async fn leave_room(State(state): State<AppState>) -> impl IntoResponse {
    state.session.leave_room().await;
    Json(state.session.view().await)
}

/// GET /health
/// Health check endpoint
pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}
