//! REST collaborators of the interview session
//!
//! The backend owns interview persistence and the question bank; this module
//! only carries the calls the live session needs:
//! - GET  /api/interviews/:id - Interview lookup (room id, participants' ids)
//! - GET  /api/interview-rooms/:id/current-state - Authoritative session state
//! - POST /api/interview-rooms/:id/start-interview - Start broadcast
//! - POST /api/interview-rooms/:id/submit-answer - Answer for one question

mod client;
mod models;

pub use client::{HttpInterviewApi, InterviewApi};
pub use models::{
    CurrentState, Difficulty, InterviewSummary, Question, QuestionSource, StartInterviewResponse,
    SubmitAnswerRequest, SubmitAnswerResponse,
};
