use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role of a party in the interview room
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserType {
    Hr,
    Candidate,
}

impl UserType {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "hr" => Some(Self::Hr),
            "candidate" => Some(Self::Candidate),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hr => "hr",
            Self::Candidate => "candidate",
        }
    }
}

/// A connected party, identified by a stable user id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub user_id: String,
    pub user_name: String,
    pub user_type: UserType,
    pub joined_at: Option<DateTime<Utc>>,
}

impl Participant {
    pub fn new(user_id: impl Into<String>, user_name: impl Into<String>, user_type: UserType) -> Self {
        Self {
            user_id: user_id.into(),
            user_name: user_name.into(),
            user_type,
            joined_at: None,
        }
    }

    /// Parse one roster entry from a channel payload
    ///
    /// Returns `None` when the entry has no usable user id or an unknown role.
    pub fn from_value(raw: &Value) -> Option<Self> {
        PartialParticipant::from_value(raw)?.finish()
    }
}

/// Roster entry as it arrives on the wire, every field optional
///
/// Duplicate entries for one user are merged field by field before the entry
/// is finalized, so a sparse first occurrence can be completed by a later one.
#[derive(Debug, Clone)]
pub(crate) struct PartialParticipant {
    pub user_id: String,
    pub user_name: Option<String>,
    pub user_type: Option<UserType>,
    pub joined_at: Option<DateTime<Utc>>,
}

impl PartialParticipant {
    pub fn from_value(raw: &Value) -> Option<Self> {
        let obj = raw.as_object()?;

        let user_id = obj.get("userId").and_then(identity)?;
        let user_name = obj
            .get("userName")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string);
        let user_type = obj
            .get("userType")
            .and_then(Value::as_str)
            .and_then(UserType::parse);
        let joined_at = obj
            .get("joinedAt")
            .or_else(|| obj.get("timestamp"))
            .and_then(Value::as_str)
            .and_then(parse_timestamp);

        Some(Self {
            user_id,
            user_name,
            user_type,
            joined_at,
        })
    }

    /// Fill fields this entry is missing from a later duplicate
    pub fn complete_from(&mut self, other: PartialParticipant) {
        if self.user_name.is_none() {
            self.user_name = other.user_name;
        }
        if self.user_type.is_none() {
            self.user_type = other.user_type;
        }
        if self.joined_at.is_none() {
            self.joined_at = other.joined_at;
        }
    }

    pub fn finish(self) -> Option<Participant> {
        let user_type = self.user_type?;
        let user_name = self.user_name.unwrap_or_else(|| self.user_id.clone());

        Some(Participant {
            user_id: self.user_id,
            user_name,
            user_type,
            joined_at: self.joined_at,
        })
    }
}

fn identity(raw: &Value) -> Option<String> {
    match raw {
        Value::String(s) => {
            let s = s.trim();
            (!s.is_empty()).then(|| s.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Parse an RFC 3339 timestamp, falling back to naive ISO 8601 read as UTC
pub(crate) fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }

    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}
