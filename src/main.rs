use anyhow::{Context, Result};
use clap::Parser;
use interview_sync::audio::{AudioBackendConfig, AudioSource};
use interview_sync::channel::{ChannelConfig, NatsConnector};
use interview_sync::{
    create_router, resolve_room, AppState, Config, HttpInterviewApi, HttpTranscriber, InterviewSession,
    RecordingConfig, RecordingPipeline, SessionConfig,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Join a live interview room and drive its question cycle
#[derive(Debug, Parser)]
#[command(name = "interview-sync", version)]
struct Args {
    /// Config file, without extension
    #[arg(short, long, default_value = "config/interview-sync")]
    config: String,

    /// Interview to join
    #[arg(long)]
    interview: String,

    /// Local user id; must be the interview's HR or candidate id
    #[arg(long)]
    user_id: String,

    /// Display name announced to the room
    #[arg(long)]
    user_name: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let cfg = Config::load(&args.config)?;

    info!("Interview Sync v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);

    let request_timeout = Duration::from_secs(cfg.api.request_timeout_secs);
    let api = Arc::new(HttpInterviewApi::new(cfg.api.base_url.clone(), request_timeout)?);

    let room = resolve_room(api.as_ref(), &args.interview, &args.user_id, &args.user_name).await?;

    let session_config = SessionConfig::from(&cfg.timing);
    let transcriber = Arc::new(HttpTranscriber::new(
        &cfg.api.base_url,
        Duration::from_secs(cfg.timing.transcription_timeout_secs),
    )?);
    let recorder = Arc::new(RecordingPipeline::new(
        RecordingConfig {
            source: AudioSource::parse(&cfg.audio.source),
            backend: AudioBackendConfig {
                target_sample_rate: cfg.audio.sample_rate,
                target_channels: cfg.audio.channels,
                buffer_duration_ms: cfg.audio.buffer_ms,
            },
            transcription_timeout: Duration::from_secs(cfg.timing.transcription_timeout_secs),
        },
        transcriber,
    ));

    let session = InterviewSession::new(room, session_config, api, recorder);

    let channel_config = ChannelConfig {
        max_retries: cfg.channel.max_retries,
        initial_backoff: Duration::from_millis(cfg.channel.initial_backoff_ms),
        max_backoff: Duration::from_millis(cfg.channel.max_backoff_ms),
        connect_timeout: Duration::from_secs(cfg.channel.connect_timeout_secs),
        ..ChannelConfig::default()
    };
    session
        .open(Arc::new(NatsConnector::new(cfg.channel.nats_url.clone())), channel_config)
        .await?;

    let app = create_router(AppState::new(session.clone()));
    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("HTTP server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
        })
        .await?;

    session.leave_room().await;

    Ok(())
}
