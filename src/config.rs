use anyhow::Result;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub api: ApiConfig,
    pub channel: ChannelSettings,
    #[serde(default)]
    pub timing: TimingConfig,
    pub audio: AudioConfig,
}

#[derive(Debug, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub http: HttpConfig,
}

#[derive(Debug, Deserialize)]
pub struct HttpConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    /// REST backend, e.g. "http://localhost:8000"
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct ChannelSettings {
    pub nats_url: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_initial_backoff_ms")]
    pub initial_backoff_ms: u64,
    #[serde(default = "default_max_backoff_ms")]
    pub max_backoff_ms: u64,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
}

/// Phase durations and the timeouts around the three suspension points
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub reading_secs: u64,
    pub answering_secs: u64,
    pub tick_ms: u64,
    pub submit_cooldown_ms: u64,
    pub transcription_timeout_secs: u64,
    pub submission_timeout_secs: u64,
    pub poll_interval_secs: u64,
    pub submission_retries: u32,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            reading_secs: 8,
            answering_secs: 30,
            tick_ms: 100,
            submit_cooldown_ms: 1000,
            transcription_timeout_secs: 30,
            submission_timeout_secs: 15,
            poll_interval_secs: 5,
            submission_retries: 3,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct AudioConfig {
    /// "microphone" or a path to a WAV file to replay
    pub source: String,
    pub sample_rate: u32,
    pub channels: u16,
    #[serde(default = "default_buffer_ms")]
    pub buffer_ms: u64,
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_max_retries() -> u32 {
    10
}

fn default_initial_backoff_ms() -> u64 {
    1000
}

fn default_max_backoff_ms() -> u64 {
    16_000
}

fn default_connect_timeout_secs() -> u64 {
    20
}

fn default_buffer_ms() -> u64 {
    100
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path))
            .add_source(config::Environment::with_prefix("INTERVIEW_SYNC").separator("__"))
            .build()?;

        Ok(settings.try_deserialize()?)
    }
}
