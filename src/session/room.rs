use crate::api::InterviewApi;
use crate::channel::RoomInfo;
use crate::roster::UserType;
use anyhow::{bail, Context, Result};
use tracing::info;

/// Look up the interview's room and this user's role in it
///
/// The user is `hr` when they are the interview's HR id and `candidate` when
/// they are its candidate id; anyone else cannot join.
pub async fn resolve_room(
    api: &dyn InterviewApi,
    interview_id: &str,
    user_id: &str,
    user_name: &str,
) -> Result<RoomInfo> {
    let interview = api
        .interview(interview_id)
        .await
        .with_context(|| format!("Interview {} not found", interview_id))?;

    let Some(room_id) = interview.room_id.filter(|id| !id.is_empty()) else {
        bail!("Room not created for interview {}", interview_id);
    };

    let user_type = if interview.hr_id.as_deref() == Some(user_id) {
        UserType::Hr
    } else if interview.candidate_id.as_deref() == Some(user_id) {
        UserType::Candidate
    } else {
        bail!("User {} is not a participant of interview {}", user_id, interview_id);
    };

    info!("Resolved room {} for {} as {}", room_id, user_name, user_type.as_str());

    Ok(RoomInfo {
        interview_id: interview_id.to_string(),
        room_id,
        user_id: user_id.to_string(),
        user_name: user_name.to_string(),
        user_type,
        field: interview.field,
    })
}
