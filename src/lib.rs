pub mod api;
pub mod audio;
pub mod channel;
pub mod config;
pub mod error;
pub mod http;
pub mod recording;
pub mod roster;
pub mod session;
pub mod timer;

pub use api::{HttpInterviewApi, InterviewApi, Question};
pub use audio::{AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFile, AudioFrame, AudioSource};
pub use channel::{ChannelClient, ChannelConfig, ChannelEvent, NatsConnector, RoomEvent, RoomInfo};
pub use config::Config;
pub use error::SessionError;
pub use http::{create_router, AppState};
pub use recording::{HttpTranscriber, RecordingConfig, RecordingPipeline, Transcriber};
pub use roster::{Participant, ParticipantRegistry, UserType};
pub use session::{
    resolve_room, InterviewSession, Phase, SessionConfig, SessionStatus, SessionView, SubmitOutcome,
};
pub use timer::{PhaseTag, PhaseTimer};
