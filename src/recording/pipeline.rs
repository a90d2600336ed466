use super::transcriber::Transcriber;
use crate::audio::{encode_wav, process_frame, AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFrame, AudioSource};
use crate::error::SessionError;
use anyhow::Result;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

/// Configuration for answer recording
#[derive(Debug, Clone)]
pub struct RecordingConfig {
    pub source: AudioSource,
    pub backend: AudioBackendConfig,
    pub transcription_timeout: Duration,
}

/// Builds the capture backend for one recording
pub type BackendFactory =
    Arc<dyn Fn(&AudioSource, AudioBackendConfig) -> Result<Box<dyn AudioBackend>> + Send + Sync>;

/// Audio accumulated during one capture, already in the target format
#[derive(Debug, Clone, Default)]
pub struct CapturedAudio {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl CapturedAudio {
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn duration_secs(&self) -> f64 {
        if self.sample_rate == 0 || self.channels == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / (self.sample_rate as f64 * self.channels as f64)
    }

    fn push(&mut self, frame: AudioFrame) {
        if self.samples.is_empty() {
            self.sample_rate = frame.sample_rate;
            self.channels = frame.channels;
        }
        self.samples.extend_from_slice(&frame.samples);
    }
}

/// Join a transcript onto the typed answer with a single separating space
pub fn append_transcript(buffer: &str, transcript: &str) -> String {
    if transcript.is_empty() {
        buffer.to_string()
    } else if buffer.is_empty() {
        transcript.to_string()
    } else {
        format!("{} {}", buffer, transcript)
    }
}

/// A device acquisition plus the task collecting its frames
struct ActiveCapture {
    backend: Box<dyn AudioBackend>,
    stop_tx: Option<oneshot::Sender<()>>,
    collector: JoinHandle<CapturedAudio>,
}

impl ActiveCapture {
    /// Stop collecting and release the device, returning what was captured
    ///
    /// The device is released even when the collector task failed.
    async fn release(mut self) -> CapturedAudio {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }

        let captured = match (&mut self.collector).await {
            Ok(captured) => captured,
            Err(e) => {
                error!("Capture collector failed: {}", e);
                CapturedAudio::default()
            }
        };

        if let Err(e) = self.backend.stop().await {
            error!("Failed to release {} capture: {}", self.backend.name(), e);
        }

        captured
    }
}

impl Drop for ActiveCapture {
    fn drop(&mut self) {
        self.collector.abort();
    }
}

/// Clears a flag when dropped, whichever way the scope is left
struct FlagGuard<'a>(&'a AtomicBool);

impl<'a> FlagGuard<'a> {
    fn raise(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for FlagGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Captures audio for the current answer and turns it into text
pub struct RecordingPipeline {
    config: RecordingConfig,
    transcriber: Arc<dyn Transcriber>,
    backends: BackendFactory,
    active: Mutex<Option<ActiveCapture>>,
    recording: AtomicBool,
    transcribing: AtomicBool,
}

impl RecordingPipeline {
    pub fn new(config: RecordingConfig, transcriber: Arc<dyn Transcriber>) -> Self {
        Self::with_backends(config, transcriber, Arc::new(AudioBackendFactory::create))
    }

    /// Pipeline whose capture devices come from `backends`
    pub fn with_backends(config: RecordingConfig, transcriber: Arc<dyn Transcriber>, backends: BackendFactory) -> Self {
        Self {
            config,
            transcriber,
            backends,
            active: Mutex::new(None),
            recording: AtomicBool::new(false),
            transcribing: AtomicBool::new(false),
        }
    }

    /// Acquire the capture device and start accumulating audio
    ///
    /// Fails with [`SessionError::AlreadyRecording`] while a capture is active
    /// and with [`SessionError::Media`] when the device cannot be acquired.
    pub async fn start(&self) -> Result<()> {
        let mut active = self.active.lock().await;
        if active.is_some() {
            return Err(SessionError::AlreadyRecording.into());
        }

        let mut backend = (self.backends)(&self.config.source, self.config.backend.clone())
            .map_err(|e| SessionError::Media(format!("{:#}", e)))?;

        let audio_rx = backend
            .start()
            .await
            .map_err(|e| SessionError::Media(format!("{:#}", e)))?;

        let (stop_tx, stop_rx) = oneshot::channel();
        let collector = tokio::spawn(collect(
            audio_rx,
            stop_rx,
            self.config.backend.target_sample_rate,
            self.config.backend.target_channels,
        ));

        info!("Recording started ({})", backend.name());

        *active = Some(ActiveCapture {
            backend,
            stop_tx: Some(stop_tx),
            collector,
        });
        self.recording.store(true, Ordering::SeqCst);

        Ok(())
    }

    /// Stop capturing, release the device and transcribe what was captured
    ///
    /// Returns `Ok(None)` when nothing was recording or nothing was captured.
    /// Transcription failures and timeouts come back as
    /// [`SessionError::Transcription`]; the device is released before the
    /// upload, so it is freed on every path.
    pub async fn stop(&self) -> Result<Option<String>> {
        let capture = self.active.lock().await.take();
        let Some(capture) = capture else {
            return Ok(None);
        };

        let _transcribing = FlagGuard::raise(&self.transcribing);
        self.recording.store(false, Ordering::SeqCst);

        let captured = capture.release().await;
        info!("Recording stopped ({:.1}s captured)", captured.duration_secs());

        if captured.is_empty() {
            info!("No audio data captured");
            return Ok(None);
        }

        let wav = encode_wav(&captured.samples, captured.sample_rate, captured.channels)
            .map_err(|e| SessionError::Transcription(format!("{:#}", e)))?;

        match tokio::time::timeout(self.config.transcription_timeout, self.transcriber.transcribe(wav)).await {
            Ok(Ok(text)) => {
                info!("Transcription returned {} chars", text.len());
                Ok(Some(text).filter(|t| !t.is_empty()))
            }
            Ok(Err(e)) => Err(SessionError::Transcription(format!("{:#}", e)).into()),
            Err(_) => Err(SessionError::Transcription(format!(
                "timed out after {}s",
                self.config.transcription_timeout.as_secs()
            ))
            .into()),
        }
    }

    /// Drop the active capture without transcribing it
    pub async fn cancel(&self) {
        let capture = self.active.lock().await.take();
        if let Some(capture) = capture {
            self.recording.store(false, Ordering::SeqCst);
            let captured = capture.release().await;
            warn!("Recording discarded ({:.1}s)", captured.duration_secs());
        }
    }

    /// Drop the active capture in the background
    ///
    /// `is_recording` is false as soon as this returns.
    pub fn discard(self: &Arc<Self>) {
        if !self.recording.swap(false, Ordering::SeqCst) {
            return;
        }
        let pipeline = Arc::clone(self);
        tokio::spawn(async move {
            pipeline.cancel().await;
        });
    }

    pub fn is_recording(&self) -> bool {
        self.recording.load(Ordering::SeqCst)
    }

    pub fn is_transcribing(&self) -> bool {
        self.transcribing.load(Ordering::SeqCst)
    }
}

async fn collect(
    mut audio_rx: mpsc::Receiver<AudioFrame>,
    mut stop_rx: oneshot::Receiver<()>,
    target_sample_rate: u32,
    target_channels: u16,
) -> CapturedAudio {
    let mut captured = CapturedAudio::default();

    loop {
        tokio::select! {
            _ = &mut stop_rx => break,
            frame = audio_rx.recv() => match frame {
                Some(frame) => captured.push(process_frame(frame, target_sample_rate, target_channels)),
                None => {
                    // Source exhausted; hold the audio until stop is requested
                    let _ = (&mut stop_rx).await;
                    return captured;
                }
            },
        }
    }

    // Frames delivered before the stop signal still belong to the answer
    while let Ok(frame) = audio_rx.try_recv() {
        captured.push(process_frame(frame, target_sample_rate, target_channels));
    }

    captured
}
