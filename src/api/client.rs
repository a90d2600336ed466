use super::models::{
    CurrentState, InterviewSummary, StartInterviewResponse, SubmitAnswerRequest,
    SubmitAnswerResponse,
};
use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

/// REST backend consumed by the session
#[async_trait::async_trait]
pub trait InterviewApi: Send + Sync {
    async fn interview(&self, interview_id: &str) -> Result<InterviewSummary>;

    async fn current_state(&self, interview_id: &str) -> Result<CurrentState>;

    async fn start_interview(&self, interview_id: &str) -> Result<StartInterviewResponse>;

    async fn submit_answer(
        &self,
        interview_id: &str,
        request: &SubmitAnswerRequest,
    ) -> Result<SubmitAnswerResponse>;
}

/// `reqwest` implementation of [`InterviewApi`]
#[derive(Clone)]
pub struct HttpInterviewApi {
    client: Client,
    base_url: String,
}

impl HttpInterviewApi {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn room_url(&self, interview_id: &str, action: &str) -> String {
        format!("{}/api/interview-rooms/{}/{}", self.base_url, interview_id, action)
    }
}

#[async_trait::async_trait]
impl InterviewApi for HttpInterviewApi {
    async fn interview(&self, interview_id: &str) -> Result<InterviewSummary> {
        let url = format!("{}/api/interviews/{}", self.base_url, interview_id);
        debug!("GET {}", url);

        let summary = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to reach interview service")?
            .error_for_status()
            .context("Interview lookup rejected")?
            .json::<InterviewSummary>()
            .await
            .context("Malformed interview response")?;

        Ok(summary)
    }

    async fn current_state(&self, interview_id: &str) -> Result<CurrentState> {
        let url = self.room_url(interview_id, "current-state");
        debug!("GET {}", url);

        let state = self
            .client
            .get(&url)
            .send()
            .await
            .context("Failed to fetch interview state")?
            .error_for_status()
            .context("Interview state request rejected")?
            .json::<CurrentState>()
            .await
            .context("Malformed interview state")?;

        Ok(state)
    }

    async fn start_interview(&self, interview_id: &str) -> Result<StartInterviewResponse> {
        let url = self.room_url(interview_id, "start-interview");
        info!("Starting interview {}", interview_id);

        let response = self
            .client
            .post(&url)
            .send()
            .await
            .context("Failed to start interview")?
            .error_for_status()
            .context("Start interview rejected")?
            .json::<StartInterviewResponse>()
            .await
            .context("Malformed start interview response")?;

        Ok(response)
    }

    async fn submit_answer(
        &self,
        interview_id: &str,
        request: &SubmitAnswerRequest,
    ) -> Result<SubmitAnswerResponse> {
        let url = self.room_url(interview_id, "submit-answer");
        debug!("POST {} (question {})", url, request.question_index);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .context("Failed to submit answer")?
            .error_for_status()
            .context("Answer submission rejected")?
            .json::<SubmitAnswerResponse>()
            .await
            .context("Malformed submission response")?;

        Ok(response)
    }
}
