use serde::{Deserialize, Serialize};
use std::fmt;

/// Stage of the timed question/answer cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    #[default]
    Waiting,
    Reading,
    Answering,
    Complete,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Waiting => "waiting",
            Self::Reading => "reading",
            Self::Answering => "answering",
            Self::Complete => "complete",
        };
        f.write_str(name)
    }
}

/// Server-side lifecycle of an interview
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    #[default]
    Waiting,
    InProgress,
    Completed,
}

impl SessionStatus {
    /// Map the backend's status strings ("scheduled", "in_progress", ...)
    pub fn parse(raw: &str) -> Self {
        match raw {
            "in_progress" => Self::InProgress,
            "completed" => Self::Completed,
            _ => Self::Waiting,
        }
    }
}
