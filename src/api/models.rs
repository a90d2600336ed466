use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
    #[serde(other)]
    Unspecified,
}

/// Where a question came from; the bank's fallback set counts as static
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionSource {
    #[serde(alias = "fallback")]
    Static,
    #[serde(alias = "ai")]
    AiGenerated,
    #[default]
    #[serde(other)]
    Unknown,
}

/// One interview question
///
/// Questions are immutable once delivered; `index` is their position in the
/// delivered sequence and the only key answers are correlated by.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    #[serde(default)]
    pub index: usize,
    #[serde(default)]
    pub id: Option<String>,
    pub text: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub source: QuestionSource,
}

impl Question {
    /// Stamp each question with its position in the delivered sequence
    pub fn indexed(mut questions: Vec<Question>) -> Vec<Question> {
        for (index, question) in questions.iter_mut().enumerate() {
            question.index = index;
        }
        questions
    }
}

/// Response of GET current-state
#[derive(Debug, Clone, Deserialize)]
pub struct CurrentState {
    #[serde(rename = "interviewId", default)]
    pub interview_id: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub questions: Vec<Question>,
    #[serde(default)]
    pub current_question_index: usize,
    #[serde(default)]
    pub status: String,
}

/// Response of GET /api/interviews/:id, reduced to what room resolution needs
#[derive(Debug, Clone, Deserialize)]
pub struct InterviewSummary {
    #[serde(default)]
    pub room_id: Option<String>,
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub hr_id: Option<String>,
    #[serde(default)]
    pub candidate_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StartInterviewResponse {
    #[serde(default)]
    pub status: String,
    #[serde(rename = "totalQuestions", default)]
    pub total_questions: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmitAnswerRequest {
    pub question_index: usize,
    pub answer: String,
    pub user_id: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubmitAnswerResponse {
    pub next_question_index: usize,
    pub is_complete: bool,
}
