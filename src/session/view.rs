use super::phase::{Phase, SessionStatus};
use crate::api::Question;
use crate::roster::{Participant, UserType};
use serde::Serialize;

/// Health of the room channel as seen by the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
    Reconnecting { attempt: u32 },
    /// Retries exhausted; the session runs on HTTP polling
    Lost,
}

/// Everything the host UI renders
#[derive(Debug, Clone, Serialize)]
pub struct SessionView {
    pub interview_id: String,
    pub room_id: String,
    pub user_id: String,
    pub user_type: UserType,
    pub field: Option<String>,

    pub status: SessionStatus,
    pub phase: Phase,

    /// Whole seconds left in the current phase
    pub time_remaining: u64,

    pub question_index: usize,
    pub total_questions: usize,
    pub current_question: Option<Question>,

    pub participants: Vec<Participant>,

    /// Working answer for the current question
    pub answer: String,

    pub recording: bool,
    pub transcribing: bool,
    pub submitting: bool,

    pub connection: ConnectionState,

    /// Last non-fatal failure worth showing to the user
    pub last_error: Option<String>,
}
