use super::config::SessionConfig;
use super::phase::{Phase, SessionStatus};
use super::submission::{answer_payload, SubmissionCoordinator};
use super::view::{ConnectionState, SessionView};
use crate::api::{CurrentState, InterviewApi, Question, SubmitAnswerRequest};
use crate::channel::{backoff_delay, ChannelClient, ChannelConfig, RoomInfo, TransportConnector};
use crate::error::SessionError;
use crate::recording::{append_transcript, RecordingPipeline};
use crate::roster::{ParticipantRegistry, UserType};
use crate::timer::{PhaseTag, PhaseTimer};
use anyhow::{Context, Result};
use serde::Serialize;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Mutable session state; every field is owned by the session alone
pub(super) struct SessionState {
    pub status: SessionStatus,
    pub phase: Phase,
    /// Bumped on every phase entry
    pub generation: u64,
    pub questions: Vec<Question>,
    pub field: Option<String>,
    /// Working answer for the current question
    pub answer: String,
    /// Generation of the answering phase whose answer was already sent
    pub submitted: Option<u64>,
    pub roster: ParticipantRegistry,
    pub connection: ConnectionState,
    pub last_error: Option<String>,
    /// Set by leave_room; a closed session ignores every input
    pub closed: bool,
    pub timer: PhaseTimer,
}

pub(super) struct Inner {
    pub room: RoomInfo,
    pub config: SessionConfig,
    pub api: Arc<dyn InterviewApi>,
    pub recorder: Arc<RecordingPipeline>,
    pub submission: SubmissionCoordinator,
    pub state: Mutex<SessionState>,
    /// Live question index; deferred work reads it at the moment it acts
    pub current_index: Arc<AtomicUsize>,
    /// Active phase tag, watched by the phase timer
    pub phase_tx: watch::Sender<PhaseTag>,
    pub remaining_rx: watch::Receiver<u64>,
    pub channel: Mutex<Option<Arc<ChannelClient>>>,
    /// Event pump and degraded-mode poller
    pub tasks: Mutex<Vec<JoinHandle<()>>>,
    /// Serializes stop-and-append so a submission waits for an in-flight transcription
    pub stop_gate: Mutex<()>,
    pub view_tx: watch::Sender<SessionView>,
}

/// Result of a submission trigger
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubmitOutcome {
    /// A request for this question was sent
    Submitted { question_index: usize },
    /// This question's answer was already sent by another trigger
    Duplicate,
    /// The phase moved on while the trigger waited; nothing was sent
    Skipped,
}

/// Authoritative state reduced to what drives the phase machine
pub(super) struct Snapshot {
    pub status: SessionStatus,
    pub index: usize,
    pub questions: Option<Vec<Question>>,
    pub field: Option<String>,
}

impl From<CurrentState> for Snapshot {
    fn from(state: CurrentState) -> Self {
        Self {
            status: SessionStatus::parse(&state.status),
            index: state.current_question_index,
            questions: Some(state.questions),
            field: state.field,
        }
    }
}

/// Client-side replica of one live interview
///
/// Cheap to clone; all clones drive the same session. The session consumes
/// room channel events and its own phase timer expirations, and exposes the
/// host UI's actions as methods.
#[derive(Clone)]
pub struct InterviewSession {
    pub(super) inner: Arc<Inner>,
}

impl InterviewSession {
    pub fn new(
        room: RoomInfo,
        config: SessionConfig,
        api: Arc<dyn InterviewApi>,
        recorder: Arc<RecordingPipeline>,
    ) -> Self {
        let (phase_tx, phase_rx) = watch::channel(PhaseTag::default());
        let timer = PhaseTimer::new(phase_rx, config.tick);
        let remaining_rx = timer.subscribe_remaining();

        let state = SessionState {
            status: SessionStatus::Waiting,
            phase: Phase::Waiting,
            generation: 0,
            questions: Vec::new(),
            field: room.field.clone(),
            answer: String::new(),
            submitted: None,
            roster: ParticipantRegistry::new(),
            connection: ConnectionState::Disconnected,
            last_error: None,
            closed: false,
            timer,
        };

        let initial = render(&room, &state, 0, 0, false, false, false);
        let (view_tx, _) = watch::channel(initial);

        info!(
            "Interview session {} created for {} ({})",
            room.interview_id,
            room.user_name,
            room.user_type.as_str()
        );

        Self {
            inner: Arc::new(Inner {
                submission: SubmissionCoordinator::new(config.submit_cooldown),
                room,
                config,
                api,
                recorder,
                state: Mutex::new(state),
                current_index: Arc::new(AtomicUsize::new(0)),
                phase_tx,
                remaining_rx,
                channel: Mutex::new(None),
                tasks: Mutex::new(Vec::new()),
                stop_gate: Mutex::new(()),
                view_tx,
            }),
        }
    }

    pub fn room(&self) -> &RoomInfo {
        &self.inner.room
    }

    pub fn current_question_index(&self) -> usize {
        self.inner.current_index.load(Ordering::SeqCst)
    }

    /// Fresh view of the session, including the live countdown
    pub async fn view(&self) -> SessionView {
        let state = self.inner.state.lock().await;
        self.render(&state)
    }

    /// Views published after every state change
    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.inner.view_tx.subscribe()
    }

    /// Remaining seconds of the armed phase, updated every tick
    pub fn subscribe_remaining(&self) -> watch::Receiver<u64> {
        self.inner.remaining_rx.clone()
    }

    /// Load the authoritative state and join the room channel
    ///
    /// A failed state fetch is not fatal: the room snapshot delivered on join
    /// carries the same information.
    pub async fn open(&self, connector: Arc<dyn TransportConnector>, channel_config: ChannelConfig) -> Result<()> {
        if let Err(e) = self.refresh().await {
            warn!("Initial state fetch failed, waiting for room snapshot: {:#}", e);
        }

        let client = Arc::new(ChannelClient::new(self.inner.room.clone(), connector, channel_config));
        let mut events = client.connect().await?;
        *self.inner.channel.lock().await = Some(client);

        {
            let mut state = self.inner.state.lock().await;
            state.connection = ConnectionState::Connecting;
            self.publish(&state);
        }

        let weak: Weak<Inner> = Arc::downgrade(&self.inner);
        let pump = tokio::spawn(async move {
            while let Some(event) = events.recv().await {
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                InterviewSession { inner }.handle_event(event).await;
            }
            debug!("Room event pump finished");
        });
        self.inner.tasks.lock().await.push(pump);

        Ok(())
    }

    /// Fetch current-state over HTTP and apply it as a snapshot
    pub async fn refresh(&self) -> Result<()> {
        let current = self
            .inner
            .api
            .current_state(&self.inner.room.interview_id)
            .await
            .context("Failed to fetch interview state")?;

        let mut state = self.inner.state.lock().await;
        if state.closed {
            return Ok(());
        }
        self.apply_snapshot(&mut state, Snapshot::from(current));
        self.publish(&state);
        Ok(())
    }

    /// Ask the backend to start the interview; the start arrives as a room event
    pub async fn start_interview(&self) -> Result<()> {
        let response = self
            .inner
            .api
            .start_interview(&self.inner.room.interview_id)
            .await?;

        info!(
            "Interview {} started ({} questions)",
            self.inner.room.interview_id, response.total_questions
        );

        Ok(())
    }

    /// Replace the working answer with typed text
    pub async fn update_answer(&self, text: impl Into<String>) -> Result<()> {
        self.ensure_candidate("typing an answer")?;
        let mut state = self.inner.state.lock().await;
        ensure_open(&state)?;
        if state.phase != Phase::Answering {
            return Err(SessionError::InvalidPhase {
                action: "typing an answer",
                phase: state.phase,
            }
            .into());
        }

        state.answer = text.into();
        self.publish(&state);
        Ok(())
    }

    /// Start capturing audio for the current answer
    ///
    /// Opening the device may take a while; if the answering phase ends in
    /// the meantime the fresh capture is dropped and the call fails.
    pub async fn start_recording(&self) -> Result<()> {
        self.ensure_candidate("recording")?;
        let generation = {
            let state = self.inner.state.lock().await;
            ensure_open(&state)?;
            if state.phase != Phase::Answering {
                return Err(SessionError::InvalidPhase {
                    action: "recording",
                    phase: state.phase,
                }
                .into());
            }
            state.generation
        };

        if let Err(e) = self.inner.recorder.start().await {
            if matches!(e.downcast_ref::<SessionError>(), Some(SessionError::Media(_))) {
                error!("Microphone unavailable, answer continues as typed text: {:#}", e);
                self.record_error(e.to_string()).await;
            }
            return Err(e);
        }

        let state = self.inner.state.lock().await;
        if state.closed || state.generation != generation {
            warn!("Answering phase ended while the device opened, dropping capture");
            self.inner.recorder.cancel().await;
            self.publish(&state);
            if state.closed {
                return Err(SessionError::Closed.into());
            }
            return Err(SessionError::InvalidPhase {
                action: "recording",
                phase: state.phase,
            }
            .into());
        }

        self.publish(&state);
        Ok(())
    }

    /// Stop capturing and append the transcript to the working answer
    ///
    /// Returns the transcript that was appended. On transcription failure the
    /// typed answer is left intact and the error is returned.
    pub async fn stop_recording(&self) -> Result<Option<String>> {
        let _gate = self.inner.stop_gate.lock().await;

        let generation = self.inner.state.lock().await.generation;
        let result = self.inner.recorder.stop().await;

        let mut state = self.inner.state.lock().await;
        let outcome = match result {
            Ok(Some(transcript)) => {
                if state.generation == generation && state.phase == Phase::Answering {
                    state.answer = append_transcript(&state.answer, &transcript);
                    Ok(Some(transcript))
                } else {
                    warn!("Phase moved on during transcription, discarding transcript");
                    Ok(None)
                }
            }
            Ok(None) => Ok(None),
            Err(e) => {
                warn!("Transcription failed, keeping typed answer: {:#}", e);
                state.last_error = Some(e.to_string());
                Err(e)
            }
        };

        self.publish(&state);
        outcome
    }

    /// Submit the current answer (manual trigger)
    pub async fn submit_answer(&self) -> Result<SubmitOutcome> {
        self.submit("manual").await
    }

    /// Turn one submission intent into at most one request
    ///
    /// The recording, if any, is stopped and its transcript folded in first.
    /// The question index is read from the live cell when the payload is
    /// built, and the payload is only built if the answering phase that
    /// triggered the submission is still current.
    pub(super) async fn submit(&self, trigger: &'static str) -> Result<SubmitOutcome> {
        self.ensure_candidate("submitting")?;
        let generation = {
            let state = self.inner.state.lock().await;
            ensure_open(&state)?;
            if state.phase != Phase::Answering {
                return Err(SessionError::InvalidPhase {
                    action: "submitting",
                    phase: state.phase,
                }
                .into());
            }
            if state.submitted == Some(state.generation) {
                debug!("Answer already sent for this question, ignoring {} trigger", trigger);
                return Ok(SubmitOutcome::Duplicate);
            }
            state.generation
        };

        let Some(ticket) = self.inner.submission.try_begin() else {
            debug!("Submission already in flight, ignoring {} trigger", trigger);
            return Ok(SubmitOutcome::Duplicate);
        };

        // Transcription failures were already logged; the typed answer stands
        let _ = self.stop_recording().await;

        let request = {
            let mut state = self.inner.state.lock().await;
            if state.closed || state.phase != Phase::Answering || state.generation != generation {
                self.inner.submission.release_now(ticket);
                info!("Phase moved on before {} submission, nothing sent", trigger);
                return Ok(SubmitOutcome::Skipped);
            }

            let request = SubmitAnswerRequest {
                question_index: self.current_question_index(),
                answer: answer_payload(&state.answer),
                user_id: self.inner.room.user_id.clone(),
            };
            state.answer.clear();
            state.submitted = Some(generation);
            self.publish(&state);
            request
        };

        let question_index = request.question_index;
        info!("Submitting answer for question {} ({} trigger)", question_index, trigger);

        tokio::spawn(self.clone().deliver(request));
        self.inner.submission.release_after_cooldown(ticket);

        Ok(SubmitOutcome::Submitted { question_index })
    }

    /// Send one answer, retrying only while the room channel is lost
    async fn deliver(self, request: SubmitAnswerRequest) {
        let timeout = self.inner.config.submission_timeout;
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            let result = tokio::time::timeout(
                timeout,
                self.inner.api.submit_answer(&self.inner.room.interview_id, &request),
            )
            .await;

            let failure = match result {
                Ok(Ok(response)) => {
                    info!(
                        "Answer for question {} accepted (next {}, complete {})",
                        request.question_index, response.next_question_index, response.is_complete
                    );
                    // Without the channel no next_question event will come
                    if self.is_degraded().await {
                        self.apply_advance(response.next_question_index, response.is_complete, "submit response")
                            .await;
                    }
                    return;
                }
                Ok(Err(e)) => format!("{:#}", e),
                Err(_) => format!("timed out after {:?}", timeout),
            };

            let allowed = if self.is_degraded().await {
                1 + self.inner.config.submission_retries
            } else {
                1
            };

            if attempt >= allowed {
                error!("Answer for question {} not delivered: {}", request.question_index, failure);
                self.record_error(SessionError::Submission(failure).to_string()).await;
                return;
            }

            warn!("Submission attempt {} failed, retrying: {}", attempt, failure);
            tokio::time::sleep(backoff_delay(attempt, Duration::from_secs(1), Duration::from_secs(8))).await;
        }
    }

    /// Leave the room: timer, channel and capture device are released together
    pub async fn leave_room(&self) {
        let mut state = self.inner.state.lock().await;
        if state.closed {
            return;
        }
        state.closed = true;

        state.timer.cancel();

        if let Some(client) = self.inner.channel.lock().await.take() {
            client.disconnect().await;
        }
        for task in self.inner.tasks.lock().await.drain(..) {
            task.abort();
        }

        self.inner.recorder.cancel().await;

        state.connection = ConnectionState::Disconnected;
        self.publish(&state);

        info!("Left interview {}", self.inner.room.interview_id);
    }

    pub async fn is_closed(&self) -> bool {
        self.inner.state.lock().await.closed
    }

    pub(super) async fn is_degraded(&self) -> bool {
        self.inner.state.lock().await.connection == ConnectionState::Lost
    }

    pub(super) async fn record_error(&self, message: String) {
        let mut state = self.inner.state.lock().await;
        state.last_error = Some(message);
        self.publish(&state);
    }

    pub(super) async fn apply_advance(&self, next_index: usize, is_complete: bool, origin: &str) {
        let mut state = self.inner.state.lock().await;
        if state.closed {
            return;
        }
        debug!("Advance from {}: next {}, complete {}", origin, next_index, is_complete);
        self.advance(&mut state, next_index, is_complete);
        self.publish(&state);
    }

    // ------------------------------------------------------------------
    // Transitions; all run with the state lock held
    // ------------------------------------------------------------------

    /// Apply a full snapshot; it overrides locally inferred progress
    pub(super) fn apply_snapshot(&self, state: &mut SessionState, snapshot: Snapshot) {
        if let Some(questions) = snapshot.questions.filter(|q| !q.is_empty()) {
            state.questions = Question::indexed(questions);
        }
        if snapshot.field.is_some() {
            state.field = snapshot.field;
        }

        match snapshot.status {
            SessionStatus::Completed => self.enter_complete(state),
            _ if state.phase == Phase::Complete => {
                debug!("Ignoring {:?} snapshot after completion", snapshot.status);
            }
            SessionStatus::InProgress => {
                if !state.questions.is_empty() && snapshot.index >= state.questions.len() {
                    self.enter_complete(state);
                    return;
                }

                let running = matches!(state.phase, Phase::Reading | Phase::Answering);
                if running && self.current_question_index() == snapshot.index {
                    state.status = SessionStatus::InProgress;
                    return;
                }

                self.enter_reading(state, snapshot.index);
            }
            SessionStatus::Waiting => {
                if state.phase != Phase::Waiting {
                    warn!("Snapshot reports interview not started, discarding local progress");
                }
                self.enter_waiting(state, snapshot.index);
            }
        }
    }

    /// Apply a confirmed move to `next_index`, or to completion
    ///
    /// Stale or repeated confirmations (an index at or behind the one already
    /// running) are ignored, so the event and the local fallback can both
    /// report the same advance.
    pub(super) fn advance(&self, state: &mut SessionState, next_index: usize, is_complete: bool) {
        if is_complete {
            self.enter_complete(state);
            return;
        }
        if state.phase == Phase::Complete {
            debug!("Ignoring advance to {} after completion", next_index);
            return;
        }

        let current = self.current_question_index();
        if next_index < current || (next_index == current && state.phase != Phase::Waiting) {
            debug!("Ignoring stale advance to {} (at {})", next_index, current);
            return;
        }

        if !state.questions.is_empty() && next_index >= state.questions.len() {
            self.enter_complete(state);
            return;
        }

        self.enter_reading(state, next_index);
    }

    pub(super) fn enter_reading(&self, state: &mut SessionState, index: usize) {
        state.generation += 1;
        state.status = SessionStatus::InProgress;
        state.phase = Phase::Reading;
        state.answer.clear();
        self.inner.current_index.store(index, Ordering::SeqCst);
        self.inner.submission.reset();
        self.discard_recording();

        let tag = self.activate(state);
        state
            .timer
            .arm(self.inner.config.reading_secs, tag, self.expiry_callback());

        info!("Question {}: reading ({}s)", index, self.inner.config.reading_secs);
    }

    pub(super) fn enter_answering(&self, state: &mut SessionState) {
        state.generation += 1;
        state.phase = Phase::Answering;

        let tag = self.activate(state);
        state
            .timer
            .arm(self.inner.config.answering_secs, tag, self.expiry_callback());

        info!(
            "Question {}: answering ({}s)",
            tag.question_index, self.inner.config.answering_secs
        );
    }

    pub(super) fn enter_complete(&self, state: &mut SessionState) {
        if state.phase == Phase::Complete {
            state.status = SessionStatus::Completed;
            return;
        }

        state.generation += 1;
        state.status = SessionStatus::Completed;
        state.phase = Phase::Complete;
        state.answer.clear();
        state.timer.cancel();
        self.discard_recording();
        self.activate(state);

        info!("Interview {} complete", self.inner.room.interview_id);
    }

    fn enter_waiting(&self, state: &mut SessionState, index: usize) {
        state.generation += 1;
        state.status = SessionStatus::Waiting;
        state.phase = Phase::Waiting;
        state.answer.clear();
        state.timer.cancel();
        self.inner.current_index.store(index, Ordering::SeqCst);
        self.discard_recording();
        self.activate(state);
    }

    /// Publish the tag of the phase just entered; older timers go inert
    fn activate(&self, state: &SessionState) -> PhaseTag {
        let tag = PhaseTag {
            phase: state.phase,
            question_index: self.current_question_index(),
            generation: state.generation,
        };
        self.inner.phase_tx.send_replace(tag);
        tag
    }

    fn expiry_callback(&self) -> Box<dyn FnOnce(PhaseTag) + Send + 'static> {
        let weak = Arc::downgrade(&self.inner);
        Box::new(move |tag| {
            if let Some(inner) = weak.upgrade() {
                tokio::spawn(async move {
                    InterviewSession { inner }.on_timer_expired(tag).await;
                });
            }
        })
    }

    async fn on_timer_expired(&self, tag: PhaseTag) {
        let submit = {
            let mut state = self.inner.state.lock().await;
            if state.closed || *self.inner.phase_tx.borrow() != tag {
                debug!("Ignoring expiry of superseded {} phase", tag.phase);
                return;
            }

            match tag.phase {
                Phase::Reading => {
                    self.enter_answering(&mut state);
                    self.publish(&state);
                    false
                }
                // The interviewer waits for the candidate's answer to be confirmed
                Phase::Answering => self.inner.room.user_type == UserType::Candidate,
                Phase::Waiting | Phase::Complete => false,
            }
        };

        if submit {
            match self.submit("timer").await {
                Ok(outcome) => debug!("Timer submission: {:?}", outcome),
                Err(e) => warn!("Timer submission failed: {:#}", e),
            }
        }
    }

    /// Release the capture device without transcribing
    fn discard_recording(&self) {
        self.inner.recorder.discard();
    }

    /// Answers belong to the candidate; the interviewer only watches
    fn ensure_candidate(&self, action: &'static str) -> Result<()> {
        if self.inner.room.user_type != UserType::Candidate {
            return Err(SessionError::CandidateOnly { action }.into());
        }
        Ok(())
    }

    pub(super) fn publish(&self, state: &SessionState) {
        self.inner.view_tx.send_replace(self.render(state));
    }

    fn render(&self, state: &SessionState) -> SessionView {
        render(
            &self.inner.room,
            state,
            self.current_question_index(),
            *self.inner.remaining_rx.borrow(),
            self.inner.recorder.is_recording(),
            self.inner.recorder.is_transcribing(),
            self.inner.submission.is_in_flight(),
        )
    }
}

fn ensure_open(state: &SessionState) -> Result<()> {
    if state.closed {
        return Err(SessionError::Closed.into());
    }
    Ok(())
}

fn render(
    room: &RoomInfo,
    state: &SessionState,
    question_index: usize,
    time_remaining: u64,
    recording: bool,
    transcribing: bool,
    submitting: bool,
) -> SessionView {
    let time_remaining = match state.phase {
        Phase::Reading | Phase::Answering => time_remaining,
        Phase::Waiting | Phase::Complete => 0,
    };

    SessionView {
        interview_id: room.interview_id.clone(),
        room_id: room.room_id.clone(),
        user_id: room.user_id.clone(),
        user_type: room.user_type,
        field: state.field.clone(),
        status: state.status,
        phase: state.phase,
        time_remaining,
        question_index,
        total_questions: state.questions.len(),
        current_question: state.questions.get(question_index).cloned(),
        participants: state.roster.list().to_vec(),
        answer: state.answer.clone(),
        recording,
        transcribing,
        submitting,
        connection: state.connection,
        last_error: state.last_error.clone(),
    }
}
