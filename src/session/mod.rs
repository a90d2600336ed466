//! Live interview session
//!
//! This module provides the `InterviewSession` state machine that drives:
//! - The reading/answering phase cycle and its timers
//! - The room roster and authoritative snapshots from the room channel
//! - Answer recording and transcription
//! - Exactly-once answer submission per question

mod config;
mod dispatch;
mod phase;
mod room;
mod session;
mod submission;
mod view;

pub use config::SessionConfig;
pub use phase::{Phase, SessionStatus};
pub use room::resolve_room;
pub use session::{InterviewSession, SubmitOutcome};
pub use submission::{answer_payload, SubmissionCoordinator, SubmissionTicket, NO_ANSWER};
pub use view::{ConnectionState, SessionView};
