use anyhow::{bail, Context, Result};
use hound::WavReader;
use std::path::{Path, PathBuf};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::backend::{AudioBackend, AudioBackendConfig, AudioFrame};

pub struct AudioFile {
    pub path: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
    pub channels: u16,
    pub samples: Vec<i16>,
}

impl AudioFile {
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening audio file: {}", path.display());

        let reader = WavReader::open(path)
            .context("Failed to open WAV file")?;

        let spec = reader.spec();
        if spec.bits_per_sample != 16 || spec.sample_format != hound::SampleFormat::Int {
            bail!(
                "Unsupported WAV format: {} bit {:?} (expected 16 bit PCM)",
                spec.bits_per_sample,
                spec.sample_format
            );
        }

        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<Vec<_>, _>>()
            .context("Failed to read audio samples")?;

        let duration_seconds = samples.len() as f64 /
            (spec.sample_rate as f64 * spec.channels as f64);

        Ok(Self {
            path: path.display().to_string(),
            duration_seconds,
            sample_rate: spec.sample_rate,
            channels: spec.channels,
            samples,
        })
    }

    /// Split the file into frames of `frame_ms` each
    pub fn frames(&self, frame_ms: u64) -> Vec<AudioFrame> {
        // Whole sample groups per frame so channels stay interleaved
        let channels = self.channels.max(1) as u64;
        let per_frame = ((self.sample_rate as u64 * frame_ms / 1000).max(1) * channels) as usize;

        self.samples
            .chunks(per_frame)
            .enumerate()
            .map(|(i, chunk)| AudioFrame {
                samples: chunk.to_vec(),
                sample_rate: self.sample_rate,
                channels: self.channels,
                timestamp_ms: i as u64 * frame_ms,
            })
            .collect()
    }
}

/// Replays a WAV file through the capture interface
///
/// The whole file is emitted as soon as capture starts; the frame channel
/// closes once the file is exhausted.
pub struct FileBackend {
    path: PathBuf,
    config: AudioBackendConfig,
    task: Option<JoinHandle<()>>,
    capturing: bool,
}

impl FileBackend {
    pub fn new(path: PathBuf, config: AudioBackendConfig) -> Self {
        Self {
            path,
            config,
            task: None,
            capturing: false,
        }
    }
}

#[async_trait::async_trait]
impl AudioBackend for FileBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.capturing {
            bail!("Already capturing");
        }

        let audio = AudioFile::open(&self.path)?;
        let frames = audio.frames(self.config.buffer_duration_ms);

        info!(
            "Replaying {} ({:.1}s, {} frames)",
            audio.path,
            audio.duration_seconds,
            frames.len()
        );

        let (tx, rx) = mpsc::channel(frames.len().max(1));
        self.task = Some(tokio::spawn(async move {
            for frame in frames {
                if tx.send(frame).await.is_err() {
                    warn!("Capture consumer dropped before file replay finished");
                    break;
                }
            }
        }));
        self.capturing = true;

        Ok(rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.capturing = false;
        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.capturing
    }

    fn name(&self) -> &str {
        "file"
    }
}
