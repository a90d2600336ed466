pub mod backend;
pub mod convert;
pub mod file;

#[cfg(feature = "microphone")]
pub mod microphone;

pub use backend::{AudioBackend, AudioBackendConfig, AudioBackendFactory, AudioFrame, AudioSource};
pub use convert::{encode_wav, process_frame};
pub use file::{AudioFile, FileBackend};
