// Microphone backend using cpal's default input device

use anyhow::{anyhow, bail, Context, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::sync::mpsc as std_mpsc;
use std::thread::JoinHandle;
use std::time::Instant;
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use super::backend::{AudioBackend, AudioBackendConfig, AudioFrame};

/// Captures the default input device
///
/// cpal streams are not `Send`, so the stream lives on a dedicated thread that
/// owns it until the stop signal arrives (or the backend is dropped, which
/// closes the signal channel). The device is released when that thread exits.
pub struct MicrophoneBackend {
    config: AudioBackendConfig,
    stop_tx: Option<std_mpsc::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl MicrophoneBackend {
    pub fn new(config: AudioBackendConfig) -> Self {
        Self {
            config,
            stop_tx: None,
            thread: None,
        }
    }
}

fn build_stream(frame_tx: mpsc::Sender<AudioFrame>) -> Result<cpal::Stream> {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .ok_or_else(|| anyhow!("No input device available"))?;

    let supported = device
        .default_input_config()
        .context("Failed to get default input config")?;
    let sample_rate = supported.sample_rate().0;
    let channels = supported.channels();
    let started = Instant::now();

    info!(
        "Microphone: {} ({}Hz, {} channels, {:?})",
        device.name().unwrap_or_else(|_| "unknown".to_string()),
        sample_rate,
        channels,
        supported.sample_format()
    );

    let err_fn = |err| error!("Microphone stream error: {}", err);
    let stream_config: cpal::StreamConfig = supported.clone().into();

    let stream = match supported.sample_format() {
        cpal::SampleFormat::I16 => device.build_input_stream(
            &stream_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                let _ = frame_tx.try_send(AudioFrame {
                    samples: data.to_vec(),
                    sample_rate,
                    channels,
                    timestamp_ms: started.elapsed().as_millis() as u64,
                });
            },
            err_fn,
            None,
        ),
        cpal::SampleFormat::F32 => device.build_input_stream(
            &stream_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let samples = data
                    .iter()
                    .map(|&s| (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16)
                    .collect();
                let _ = frame_tx.try_send(AudioFrame {
                    samples,
                    sample_rate,
                    channels,
                    timestamp_ms: started.elapsed().as_millis() as u64,
                });
            },
            err_fn,
            None,
        ),
        other => bail!("Unsupported input sample format: {:?}", other),
    }
    .context("Failed to build input stream")?;

    stream.play().context("Failed to start audio stream")?;
    Ok(stream)
}

#[async_trait::async_trait]
impl AudioBackend for MicrophoneBackend {
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>> {
        if self.thread.is_some() {
            bail!("Already capturing");
        }

        let capacity = (10_000 / self.config.buffer_duration_ms.max(1)).max(16) as usize;
        let (frame_tx, frame_rx) = mpsc::channel(capacity);
        let (ready_tx, ready_rx) = oneshot::channel::<Result<()>>();
        let (stop_tx, stop_rx) = std_mpsc::channel::<()>();

        let thread = std::thread::spawn(move || {
            let stream = match build_stream(frame_tx) {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };
            let _ = ready_tx.send(Ok(()));

            // Blocks until stop() or until the backend is dropped
            let _ = stop_rx.recv();
            drop(stream);
            info!("Microphone released");
        });

        ready_rx
            .await
            .context("Microphone thread exited before starting")??;

        self.stop_tx = Some(stop_tx);
        self.thread = Some(thread);

        Ok(frame_rx)
    }

    async fn stop(&mut self) -> Result<()> {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }

        if let Some(thread) = self.thread.take() {
            tokio::task::spawn_blocking(move || {
                if thread.join().is_err() {
                    warn!("Microphone thread panicked");
                }
            })
            .await
            .context("Failed to join microphone thread")?;
        }

        Ok(())
    }

    fn is_capturing(&self) -> bool {
        self.thread.is_some()
    }

    fn name(&self) -> &str {
        "microphone"
    }
}
