//! Answer recording and transcription
//!
//! Audio is only captured during the answering phase. Stopping a capture
//! releases the device first, then uploads the audio to the transcription
//! service; the resulting text is appended to the answer buffer by the session.

mod pipeline;
mod transcriber;

pub use pipeline::{append_transcript, BackendFactory, CapturedAudio, RecordingConfig, RecordingPipeline};
pub use transcriber::{HttpTranscriber, Transcriber};
