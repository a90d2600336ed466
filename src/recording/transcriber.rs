use anyhow::{bail, Context, Result};
use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

/// Opaque speech-to-text service: WAV bytes in, text out
#[async_trait::async_trait]
pub trait Transcriber: Send + Sync {
    async fn transcribe(&self, wav: Vec<u8>) -> Result<String>;
}

#[derive(Debug, Deserialize)]
struct TranscribeResponse {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// POSTs the audio as multipart `file` to `<base_url>/transcribe`
#[derive(Clone)]
pub struct HttpTranscriber {
    client: Client,
    url: String,
}

impl HttpTranscriber {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            url: format!("{}/transcribe", base_url.trim_end_matches('/')),
        })
    }
}

#[async_trait::async_trait]
impl Transcriber for HttpTranscriber {
    async fn transcribe(&self, wav: Vec<u8>) -> Result<String> {
        debug!("Uploading {} bytes for transcription", wav.len());

        let part = Part::bytes(wav)
            .file_name("audio.wav")
            .mime_str("audio/wav")
            .context("Invalid audio mime type")?;
        let form = Form::new().part("file", part);

        let response = self
            .client
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .context("Failed to reach transcription service")?
            .error_for_status()
            .context("Transcription request rejected")?
            .json::<TranscribeResponse>()
            .await
            .context("Malformed transcription response")?;

        // The service reports failures in-band with a 200
        if let Some(error) = response.error {
            bail!("Transcription service error: {}", error);
        }

        Ok(response.text.unwrap_or_default().trim().to_string())
    }
}
