use anyhow::Result;
use std::path::PathBuf;
use tokio::sync::mpsc;

/// Audio sample data (16-bit PCM, interleaved)
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Raw audio samples (i16 PCM, interleaved)
    pub samples: Vec<i16>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Number of channels
    pub channels: u16,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// Configuration for audio backend
#[derive(Debug, Clone)]
pub struct AudioBackendConfig {
    /// Target sample rate (will resample if needed)
    pub target_sample_rate: u32,
    /// Target channel count (1 = mono, 2 = stereo)
    pub target_channels: u16,
    /// Buffer size in milliseconds (affects latency)
    pub buffer_duration_ms: u64,
}

impl Default for AudioBackendConfig {
    fn default() -> Self {
        Self {
            target_sample_rate: 16000, // 16kHz for speech-to-text
            target_channels: 1,        // Mono
            buffer_duration_ms: 100,   // 100ms buffers
        }
    }
}

/// Audio capture backend trait
///
/// Implementations:
/// - Microphone: cpal default input device (feature `microphone`)
/// - File: replay a WAV file as if it were captured live
#[async_trait::async_trait]
pub trait AudioBackend: Send + Sync {
    /// Acquire the device and start capturing
    ///
    /// Returns a channel receiver that will receive audio frames
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>>;

    /// Stop capturing and release the device
    async fn stop(&mut self) -> Result<()>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Audio source type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AudioSource {
    /// Default input device
    Microphone,
    /// WAV file replay (headless runs, tests)
    File(PathBuf),
}

impl AudioSource {
    /// "microphone" selects the input device, anything else is a WAV path
    pub fn parse(raw: &str) -> Self {
        match raw.trim() {
            "microphone" | "mic" => Self::Microphone,
            path => Self::File(PathBuf::from(path)),
        }
    }
}

/// Audio backend factory
pub struct AudioBackendFactory;

impl AudioBackendFactory {
    /// Create a fresh backend for one capture
    pub fn create(
        source: &AudioSource,
        config: AudioBackendConfig,
    ) -> Result<Box<dyn AudioBackend>> {
        match source {
            AudioSource::Microphone => {
                #[cfg(feature = "microphone")]
                {
                    let backend = super::microphone::MicrophoneBackend::new(config);
                    Ok(Box::new(backend))
                }

                #[cfg(not(feature = "microphone"))]
                {
                    let _ = config;
                    anyhow::bail!("Microphone capture requires the `microphone` feature")
                }
            }

            AudioSource::File(path) => {
                let backend = super::file::FileBackend::new(path.clone(), config);
                Ok(Box::new(backend))
            }
        }
    }
}
