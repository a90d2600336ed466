// Shared fakes for integration tests
//
// An in-memory room transport, a recording REST backend and a scripted
// transcriber, plus helpers to build a session wired to them.

#![allow(dead_code)]

use anyhow::{bail, Result};
use futures::channel::mpsc as fmpsc;
use futures::stream::StreamExt;
use interview_sync::api::{
    CurrentState, InterviewApi, InterviewSummary, Question, StartInterviewResponse, SubmitAnswerRequest,
    SubmitAnswerResponse,
};
use interview_sync::audio::{AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFrame, AudioSource};
use interview_sync::channel::{
    ChannelConfig, ClientMessage, PayloadStream, RoomInfo, RoomSubjects, RoomTransport, TransportConnector,
};
use interview_sync::recording::{BackendFactory, RecordingConfig, RecordingPipeline, Transcriber};
use interview_sync::roster::UserType;
use interview_sync::session::{InterviewSession, SessionConfig, SessionView};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

pub const INTERVIEW_ID: &str = "iv-1";
pub const ROOM_ID: &str = "room-1";

pub fn room_info(user_id: &str, user_type: UserType) -> RoomInfo {
    RoomInfo {
        interview_id: INTERVIEW_ID.to_string(),
        room_id: ROOM_ID.to_string(),
        user_id: user_id.to_string(),
        user_name: format!("{} name", user_id),
        user_type,
        field: Some("backend".to_string()),
    }
}

pub fn questions(count: usize) -> Vec<Question> {
    (0..count)
        .map(|i| Question {
            index: i,
            id: Some(format!("q{}", i)),
            text: format!("Question {}", i),
            difficulty: Default::default(),
            kind: None,
            source: Default::default(),
        })
        .collect()
}

pub fn questions_json(count: usize) -> Value {
    Value::Array(
        (0..count)
            .map(|i| serde_json::json!({ "id": format!("q{}", i), "text": format!("Question {}", i) }))
            .collect(),
    )
}

pub fn session_config() -> SessionConfig {
    SessionConfig {
        reading_secs: 8,
        answering_secs: 30,
        tick: Duration::from_millis(100),
        submit_cooldown: Duration::from_millis(1000),
        submission_timeout: Duration::from_secs(15),
        submission_retries: 3,
        poll_interval: Duration::from_secs(5),
    }
}

pub fn channel_config() -> ChannelConfig {
    ChannelConfig {
        max_retries: 2,
        initial_backoff: Duration::from_millis(100),
        max_backoff: Duration::from_millis(400),
        connect_timeout: Duration::from_secs(1),
        event_buffer: 64,
    }
}

// ============================================================================
// Room transport
// ============================================================================

/// Pub/sub broker living in the test process
#[derive(Default)]
pub struct MemoryTransport {
    published: Mutex<Vec<(String, Vec<u8>)>>,
    subscribers: Mutex<HashMap<String, Vec<fmpsc::UnboundedSender<Vec<u8>>>>>,
}

impl MemoryTransport {
    /// Deliver a raw payload to every subscriber of `subject`
    pub fn deliver(&self, subject: &str, payload: Vec<u8>) {
        let mut subscribers = self.subscribers.lock().unwrap();
        if let Some(senders) = subscribers.get_mut(subject) {
            senders.retain(|tx| tx.unbounded_send(payload.clone()).is_ok());
        }
    }

    /// Deliver a room event in its wire form
    pub fn push(&self, subject: &str, event: Value) {
        self.deliver(subject, serde_json::to_vec(&event).unwrap());
    }

    pub fn subscriber_count(&self, subject: &str) -> usize {
        self.subscribers
            .lock()
            .unwrap()
            .get(subject)
            .map(|senders| senders.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    /// End every subscription, as a dropped connection would
    pub fn drop_subscriptions(&self) {
        self.subscribers.lock().unwrap().clear();
    }

    pub fn client_messages(&self) -> Vec<ClientMessage> {
        self.published
            .lock()
            .unwrap()
            .iter()
            .filter_map(|(_, payload)| serde_json::from_slice(payload).ok())
            .collect()
    }
}

#[async_trait::async_trait]
impl RoomTransport for MemoryTransport {
    async fn publish(&self, subject: &str, payload: Vec<u8>) -> Result<()> {
        self.published.lock().unwrap().push((subject.to_string(), payload));
        Ok(())
    }

    async fn subscribe(&self, subject: &str) -> Result<PayloadStream> {
        let (tx, rx) = fmpsc::unbounded();
        self.subscribers
            .lock()
            .unwrap()
            .entry(subject.to_string())
            .or_default()
            .push(tx);
        Ok(rx.boxed())
    }
}

/// Hands out the shared [`MemoryTransport`]; can be told to refuse connections
#[derive(Default)]
pub struct MemoryConnector {
    pub transport: Arc<MemoryTransport>,
    pub refuse: AtomicBool,
    pub attempts: AtomicU32,
}

impl MemoryConnector {
    pub fn refusing() -> Self {
        let connector = Self::default();
        connector.refuse.store(true, Ordering::SeqCst);
        connector
    }

    pub fn attempts(&self) -> u32 {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl TransportConnector for MemoryConnector {
    async fn connect(&self) -> Result<Arc<dyn RoomTransport>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            bail!("connection refused");
        }
        Ok(self.transport.clone())
    }
}

// ============================================================================
// REST backend
// ============================================================================

pub struct FakeApi {
    pub state: Mutex<CurrentState>,
    pub summary: Mutex<InterviewSummary>,
    pub submissions: Mutex<Vec<SubmitAnswerRequest>>,
    pub submit_response: Mutex<Option<SubmitAnswerResponse>>,
    pub fail_state: AtomicBool,
    pub fail_submit: AtomicBool,
    pub state_calls: AtomicU32,
    pub start_calls: AtomicU32,
}

impl FakeApi {
    pub fn new(status: &str, index: usize, question_count: usize) -> Self {
        Self {
            state: Mutex::new(CurrentState {
                interview_id: Some(INTERVIEW_ID.to_string()),
                field: Some("backend".to_string()),
                questions: questions(question_count),
                current_question_index: index,
                status: status.to_string(),
            }),
            summary: Mutex::new(InterviewSummary {
                room_id: Some(ROOM_ID.to_string()),
                field: Some("backend".to_string()),
                hr_id: Some("hr-1".to_string()),
                candidate_id: Some("cand-1".to_string()),
            }),
            submissions: Mutex::new(Vec::new()),
            submit_response: Mutex::new(None),
            fail_state: AtomicBool::new(false),
            fail_submit: AtomicBool::new(false),
            state_calls: AtomicU32::new(0),
            start_calls: AtomicU32::new(0),
        }
    }

    pub fn set_state(&self, status: &str, index: usize) {
        let mut state = self.state.lock().unwrap();
        state.status = status.to_string();
        state.current_question_index = index;
    }

    pub fn submissions(&self) -> Vec<SubmitAnswerRequest> {
        self.submissions.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl InterviewApi for FakeApi {
    async fn interview(&self, _interview_id: &str) -> Result<InterviewSummary> {
        Ok(self.summary.lock().unwrap().clone())
    }

    async fn current_state(&self, _interview_id: &str) -> Result<CurrentState> {
        self.state_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_state.load(Ordering::SeqCst) {
            bail!("state service unavailable");
        }
        Ok(self.state.lock().unwrap().clone())
    }

    async fn start_interview(&self, _interview_id: &str) -> Result<StartInterviewResponse> {
        self.start_calls.fetch_add(1, Ordering::SeqCst);
        Ok(StartInterviewResponse {
            status: "started".to_string(),
            total_questions: self.state.lock().unwrap().questions.len(),
        })
    }

    async fn submit_answer(&self, _interview_id: &str, request: &SubmitAnswerRequest) -> Result<SubmitAnswerResponse> {
        self.submissions.lock().unwrap().push(request.clone());
        if self.fail_submit.load(Ordering::SeqCst) {
            bail!("submission rejected");
        }

        let mut state = self.state.lock().unwrap();
        let scripted = self.submit_response.lock().unwrap().clone();
        let response = scripted.unwrap_or_else(|| {
            let next = request.question_index + 1;
            SubmitAnswerResponse {
                next_question_index: next,
                is_complete: next >= state.questions.len(),
            }
        });

        // The backend moves its own state forward on every accepted answer
        state.current_question_index = response.next_question_index;
        if response.is_complete {
            state.status = "completed".to_string();
        }

        Ok(response)
    }
}

// ============================================================================
// Transcription
// ============================================================================

/// Returns a scripted transcript after an optional delay
pub struct FakeTranscriber {
    pub reply: Mutex<Result<String, String>>,
    pub delay: Duration,
    pub uploads: Mutex<Vec<Vec<u8>>>,
}

impl FakeTranscriber {
    pub fn replying(text: &str) -> Self {
        Self {
            reply: Mutex::new(Ok(text.to_string())),
            delay: Duration::ZERO,
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            reply: Mutex::new(Err(message.to_string())),
            delay: Duration::ZERO,
            uploads: Mutex::new(Vec::new()),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn upload_count(&self) -> usize {
        self.uploads.lock().unwrap().len()
    }
}

#[async_trait::async_trait]
impl Transcriber for FakeTranscriber {
    async fn transcribe(&self, wav: Vec<u8>) -> Result<String> {
        self.uploads.lock().unwrap().push(wav);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        match &*self.reply.lock().unwrap() {
            Ok(text) => Ok(text.clone()),
            Err(message) => bail!("{}", message),
        }
    }
}

// ============================================================================
// Audio fixtures
// ============================================================================

/// Write a 16-bit PCM WAV file
pub fn write_wav(dir: &Path, name: &str, samples: &[i16], sample_rate: u32, channels: u16) -> PathBuf {
    let path = dir.join(name);
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(&path, spec).unwrap();
    for &sample in samples {
        writer.write_sample(sample).unwrap();
    }
    writer.finalize().unwrap();
    path
}

/// Half a second of a 16kHz mono ramp
pub fn speech_wav(dir: &Path) -> PathBuf {
    let samples: Vec<i16> = (0..8000).map(|i| (i % 2000) as i16).collect();
    write_wav(dir, "answer.wav", &samples, 16000, 1)
}

pub fn recorder(source: AudioSource, transcriber: Arc<dyn Transcriber>, timeout: Duration) -> Arc<RecordingPipeline> {
    Arc::new(RecordingPipeline::new(
        RecordingConfig {
            source,
            backend: AudioBackendConfig::default(),
            transcription_timeout: timeout,
        },
        transcriber,
    ))
}

/// A capture device that takes `delay` to open, then replays like the file source
pub struct SlowBackend {
    inner: Box<dyn AudioBackend>,
    delay: Duration,
}

impl SlowBackend {
    pub fn factory(delay: Duration) -> BackendFactory {
        Arc::new(
            move |source: &AudioSource, config: AudioBackendConfig| -> Result<Box<dyn AudioBackend>> {
                let inner = AudioBackendFactory::create(source, config)?;
                Ok(Box::new(SlowBackend { inner, delay }))
            },
        )
    }
}

#[async_trait::async_trait]
impl AudioBackend for SlowBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        tokio::time::sleep(self.delay).await;
        self.inner.start().await
    }

    async fn stop(&mut self) -> Result<()> {
        self.inner.stop().await
    }

    fn is_capturing(&self) -> bool {
        self.inner.is_capturing()
    }

    fn name(&self) -> &str {
        "slow"
    }
}

// ============================================================================
// Session harness
// ============================================================================

pub struct Harness {
    pub session: InterviewSession,
    pub api: Arc<FakeApi>,
    pub connector: Arc<MemoryConnector>,
    pub transcriber: Arc<FakeTranscriber>,
    pub subjects: RoomSubjects,
    pub dir: tempfile::TempDir,
}

impl Harness {
    /// A candidate session over a fresh fake backend; not yet opened
    pub fn new(api: FakeApi, transcriber: FakeTranscriber) -> Self {
        Self::build(api, transcriber, room_info("cand-1", UserType::Candidate), None)
    }

    /// The interviewer's side of the same room
    pub fn hr(api: FakeApi, transcriber: FakeTranscriber) -> Self {
        Self::build(api, transcriber, room_info("hr-1", UserType::Hr), None)
    }

    /// A candidate session whose capture device takes `delay` to open
    pub fn with_slow_device(api: FakeApi, transcriber: FakeTranscriber, delay: Duration) -> Self {
        Self::build(
            api,
            transcriber,
            room_info("cand-1", UserType::Candidate),
            Some(SlowBackend::factory(delay)),
        )
    }

    fn build(api: FakeApi, transcriber: FakeTranscriber, room: RoomInfo, backends: Option<BackendFactory>) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let wav = speech_wav(dir.path());

        let api = Arc::new(api);
        let transcriber = Arc::new(transcriber);
        let subjects = RoomSubjects::new(&room.room_id, &room.user_id);

        let config = RecordingConfig {
            source: AudioSource::File(wav),
            backend: AudioBackendConfig::default(),
            transcription_timeout: Duration::from_secs(5),
        };
        let pipeline = match backends {
            Some(backends) => RecordingPipeline::with_backends(config, transcriber.clone(), backends),
            None => RecordingPipeline::new(config, transcriber.clone()),
        };

        let session = InterviewSession::new(room, session_config(), api.clone(), Arc::new(pipeline));

        Self {
            session,
            api,
            connector: Arc::new(MemoryConnector::default()),
            transcriber,
            subjects,
            dir,
        }
    }

    /// Open the session and wait until both room subscriptions are live
    pub async fn open(&self) {
        self.session
            .open(self.connector.clone(), channel_config())
            .await
            .unwrap();

        let transport = self.connector.transport.clone();
        let events = self.subjects.events.clone();
        wait_until(|| transport.subscriber_count(&events) > 0).await;
    }

    pub fn transport(&self) -> &MemoryTransport {
        &self.connector.transport
    }

    /// Broadcast a room event and give the session time to apply it
    pub async fn broadcast(&self, event: Value) {
        self.transport().push(&self.subjects.events, event);
        settle().await;
    }

    pub async fn view(&self) -> SessionView {
        self.session.view().await
    }

    /// Wait for a view matching `predicate`
    pub async fn wait_for_view(&self, predicate: impl Fn(&SessionView) -> bool) -> SessionView {
        for _ in 0..500 {
            let view = self.session.view().await;
            if predicate(&view) {
                return view;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("session never reached the expected view: {:?}", self.session.view().await);
    }
}

/// Let spawned tasks run; advances paused time by a few milliseconds at most
pub async fn settle() {
    for _ in 0..5 {
        tokio::time::sleep(Duration::from_millis(1)).await;
        tokio::task::yield_now().await;
    }
}

pub async fn wait_until(condition: impl Fn() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition never became true");
}
