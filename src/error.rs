use crate::session::Phase;
use thiserror::Error;

/// Failures surfaced by the interview session subsystem
///
/// Transport, media, transcription and submission failures are reported with
/// these variants. None of them ends the session on its own: callers log them
/// and keep the phase cycle running.
#[derive(Debug, Error)]
pub enum SessionError {
    /// Room channel unreachable or dropped
    #[error("connection error: {0}")]
    Connection(String),

    /// Microphone permission denied or capture device failure
    #[error("media error: {0}")]
    Media(String),

    /// Transcription service failed or timed out
    #[error("transcription error: {0}")]
    Transcription(String),

    /// Answer submission failed or timed out
    #[error("submission error: {0}")]
    Submission(String),

    #[error("recording is already active")]
    AlreadyRecording,

    #[error("{action} is not valid during the {phase} phase")]
    InvalidPhase { action: &'static str, phase: Phase },

    #[error("{action} is reserved for the candidate")]
    CandidateOnly { action: &'static str },

    #[error("room {0} has already been joined by this client")]
    AlreadyJoined(String),

    #[error("session has been closed")]
    Closed,
}
