use crate::config::TimingConfig;
use std::time::Duration;

/// Timing of one interview session
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Reading phase length
    /// Default: 8 seconds
    pub reading_secs: u64,

    /// Answering phase length
    /// Default: 30 seconds
    pub answering_secs: u64,

    /// Phase timer tick granularity
    pub tick: Duration,

    /// How long duplicate submission triggers are absorbed after a submit
    pub submit_cooldown: Duration,

    /// Bound on one submit-answer request
    pub submission_timeout: Duration,

    /// Extra delivery attempts while the room channel is lost
    pub submission_retries: u32,

    /// State polling interval once the room channel is lost
    pub poll_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from(&TimingConfig::default())
    }
}

impl From<&TimingConfig> for SessionConfig {
    fn from(timing: &TimingConfig) -> Self {
        Self {
            reading_secs: timing.reading_secs,
            answering_secs: timing.answering_secs,
            tick: Duration::from_millis(timing.tick_ms.max(1)),
            submit_cooldown: Duration::from_millis(timing.submit_cooldown_ms),
            submission_timeout: Duration::from_secs(timing.submission_timeout_secs),
            submission_retries: timing.submission_retries,
            poll_interval: Duration::from_secs(timing.poll_interval_secs.max(1)),
        }
    }
}
