use crate::api::Question;
use crate::roster::UserType;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

/// Who this client is and which room it belongs to
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoomInfo {
    pub interview_id: String,
    pub room_id: String,
    pub user_id: String,
    pub user_name: String,
    pub user_type: UserType,
    pub field: Option<String>,
}

/// Interview details carried by `room_joined`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct InterviewInfo {
    pub interview_id: Option<String>,
    pub field: Option<String>,
    pub status: String,
    pub current_question_index: usize,
    pub questions: Vec<Question>,
    pub total_questions: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoomJoined {
    #[serde(default)]
    pub room_id: Option<String>,
    /// Raw roster entries; malformed ones are dropped by the registry
    #[serde(default)]
    pub participants: Vec<Value>,
    #[serde(default)]
    pub interview_info: Option<InterviewInfo>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateSync {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub current_question_index: usize,
    #[serde(default)]
    pub participants: Vec<Value>,
    #[serde(default)]
    pub questions: Option<Vec<Question>>,
    #[serde(default)]
    pub server_time: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserLeft {
    pub user_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParticipantsList {
    #[serde(default)]
    pub participants: Vec<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterviewStarted {
    #[serde(default)]
    pub current_question_index: usize,
    #[serde(default)]
    pub server_time: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextQuestion {
    #[serde(default)]
    pub next_index: usize,
    #[serde(default)]
    pub is_complete: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Heartbeat {
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub current_question_index: usize,
    #[serde(default)]
    pub active_participants: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorNotice {
    #[serde(default)]
    pub message: String,
}

/// Messages the server pushes to a room
///
/// Wire form: `{"event": "next_question", "data": {"nextIndex": 2, ...}}`.
/// Unknown event names fail to decode and are dropped by the client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum RoomEvent {
    /// Full snapshot sent to a client after it joins
    RoomJoined(RoomJoined),
    /// Full authoritative snapshot, on join, on request and periodically
    InterviewStateSync(StateSync),
    /// Roster delta, payload is a raw roster entry
    UserJoined(Value),
    /// Roster delta
    UserLeft(UserLeft),
    /// Full roster replacement
    ParticipantsList(ParticipantsList),
    InterviewStarted(InterviewStarted),
    NextQuestion(NextQuestion),
    Heartbeat(Heartbeat),
    Error(ErrorNotice),
}

impl RoomEvent {
    /// Snapshots overwrite local state; everything else is a delta
    pub fn is_snapshot(&self) -> bool {
        matches!(
            self,
            Self::RoomJoined(_) | Self::InterviewStateSync(_) | Self::ParticipantsList(_)
        )
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::RoomJoined(_) => "room_joined",
            Self::InterviewStateSync(_) => "interview_state_sync",
            Self::UserJoined(_) => "user_joined",
            Self::UserLeft(_) => "user_left",
            Self::ParticipantsList(_) => "participants_list",
            Self::InterviewStarted(_) => "interview_started",
            Self::NextQuestion(_) => "next_question",
            Self::Heartbeat(_) => "heartbeat",
            Self::Error(_) => "error",
        }
    }
}

/// Messages this client publishes to the room
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "snake_case")]
pub enum ClientMessage {
    #[serde(rename_all = "camelCase")]
    JoinRoom {
        room_id: String,
        user_id: String,
        user_name: String,
        user_type: UserType,
    },
    #[serde(rename_all = "camelCase")]
    LeaveRoom { room_id: String, user_id: String },
    #[serde(rename_all = "camelCase")]
    RequestSync { room_id: String },
}

impl ClientMessage {
    pub fn join(room: &RoomInfo) -> Self {
        Self::JoinRoom {
            room_id: room.room_id.clone(),
            user_id: room.user_id.clone(),
            user_name: room.user_name.clone(),
            user_type: room.user_type,
        }
    }

    pub fn leave(room: &RoomInfo) -> Self {
        Self::LeaveRoom {
            room_id: room.room_id.clone(),
            user_id: room.user_id.clone(),
        }
    }

    pub fn request_sync(room: &RoomInfo) -> Self {
        Self::RequestSync {
            room_id: room.room_id.clone(),
        }
    }
}

/// Everything the session learns from the channel, in arrival order
#[derive(Debug, Clone)]
pub enum ChannelEvent {
    /// First connection established and join published
    Connected,
    /// Transport re-established; a sync was requested instead of a re-join
    Reconnected,
    /// Subscription ended unexpectedly
    Disconnected { reason: String },
    /// Waiting `delay` before reconnect attempt `attempt`
    Reconnecting { attempt: u32, delay: Duration },
    /// Retries exhausted; no further events will follow
    ConnectionLost { reason: String },
    Room(RoomEvent),
}
