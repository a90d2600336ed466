// Tests for answer recording, audio conversion and transcript handling

mod common;

use anyhow::Result;
use common::{recorder, speech_wav, write_wav, FakeTranscriber};
use interview_sync::audio::{
    encode_wav, process_frame, AudioBackendConfig, AudioBackendFactory, AudioFile, AudioFrame, AudioSource,
};
use interview_sync::error::SessionError;
use interview_sync::recording::append_transcript;
use interview_sync::session::{answer_payload, NO_ANSWER};
use std::io::Cursor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_append_transcript_to_empty_buffer() {
    assert_eq!(append_transcript("", "hello there"), "hello there");
}

#[test]
fn test_append_transcript_to_typed_text() {
    assert_eq!(append_transcript("I would", "use a queue"), "I would use a queue");
}

#[test]
fn test_append_empty_transcript_keeps_buffer() {
    assert_eq!(append_transcript("typed", ""), "typed");
}

#[test]
fn test_empty_answer_becomes_sentinel() {
    assert_eq!(answer_payload(""), NO_ANSWER);
    assert_eq!(answer_payload("   \n"), NO_ANSWER);
    assert_eq!(answer_payload("  a queue "), "a queue");
}

#[test]
fn test_audio_source_parse() {
    assert_eq!(AudioSource::parse("microphone"), AudioSource::Microphone);
    assert_eq!(
        AudioSource::parse("fixtures/answer.wav"),
        AudioSource::File(PathBuf::from("fixtures/answer.wav"))
    );
}

#[test]
fn test_stereo_48k_frame_becomes_mono_16k() {
    // 6 stereo sample pairs at 48kHz
    let frame = AudioFrame {
        samples: vec![100, 300, 100, 300, 100, 300, 200, 400, 200, 400, 200, 400],
        sample_rate: 48000,
        channels: 2,
        timestamp_ms: 0,
    };

    let processed = process_frame(frame, 16000, 1);

    assert_eq!(processed.channels, 1);
    assert_eq!(processed.sample_rate, 16000);
    assert_eq!(processed.samples, vec![200, 300]);
}

#[test]
fn test_encode_wav_reads_back() -> Result<()> {
    let samples: Vec<i16> = vec![0, 1000, -1000, 32000];
    let wav = encode_wav(&samples, 16000, 1)?;

    let reader = hound::WavReader::new(Cursor::new(wav))?;
    assert_eq!(reader.spec().sample_rate, 16000);
    assert_eq!(reader.spec().channels, 1);
    let decoded: Vec<i16> = reader.into_samples::<i16>().collect::<Result<_, _>>()?;
    assert_eq!(decoded, samples);

    Ok(())
}

#[test]
fn test_audio_file_frames_keep_channels_interleaved() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let samples: Vec<i16> = (0..3200).collect();
    let path = write_wav(dir.path(), "stereo.wav", &samples, 16000, 2);

    let audio = AudioFile::open(&path)?;
    assert_eq!(audio.channels, 2);
    assert!((audio.duration_seconds - 0.1).abs() < 1e-9);

    let frames = audio.frames(50);
    assert_eq!(frames.len(), 2);
    assert!(frames.iter().all(|f| f.samples.len() % 2 == 0));
    assert_eq!(frames[1].timestamp_ms, 50);

    Ok(())
}

#[test]
fn test_audio_file_nonexistent() {
    assert!(AudioFile::open("/nonexistent/path/to/audio.wav").is_err());
}

#[cfg(not(feature = "microphone"))]
#[test]
fn test_microphone_needs_feature() {
    let result = AudioBackendFactory::create(&AudioSource::Microphone, AudioBackendConfig::default());
    assert!(result.is_err());
}

#[tokio::test]
async fn test_record_and_transcribe() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let transcriber = Arc::new(FakeTranscriber::replying("a hash map"));
    let pipeline = recorder(
        AudioSource::File(speech_wav(dir.path())),
        transcriber.clone(),
        Duration::from_secs(5),
    );

    pipeline.start().await?;
    assert!(pipeline.is_recording());
    tokio::time::sleep(Duration::from_millis(50)).await;

    let transcript = pipeline.stop().await?;

    assert_eq!(transcript.as_deref(), Some("a hash map"));
    assert!(!pipeline.is_recording());
    assert!(!pipeline.is_transcribing());

    // The whole half second reached the transcriber as one WAV upload
    let uploads = transcriber.uploads.lock().unwrap().clone();
    assert_eq!(uploads.len(), 1);
    let reader = hound::WavReader::new(Cursor::new(uploads[0].clone()))?;
    assert_eq!(reader.len(), 8000);

    Ok(())
}

#[tokio::test]
async fn test_second_start_is_rejected() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let pipeline = recorder(
        AudioSource::File(speech_wav(dir.path())),
        Arc::new(FakeTranscriber::replying("x")),
        Duration::from_secs(5),
    );

    pipeline.start().await?;
    let err = pipeline.start().await.unwrap_err();
    assert!(matches!(err.downcast_ref::<SessionError>(), Some(SessionError::AlreadyRecording)));

    pipeline.cancel().await;
    assert!(!pipeline.is_recording());

    // The device is free again after a cancel
    pipeline.start().await?;
    pipeline.cancel().await;

    Ok(())
}

#[tokio::test]
async fn test_stop_without_recording_is_noop() -> Result<()> {
    let transcriber = Arc::new(FakeTranscriber::replying("unused"));
    let pipeline = recorder(
        AudioSource::File(PathBuf::from("/nonexistent.wav")),
        transcriber.clone(),
        Duration::from_secs(5),
    );

    assert_eq!(pipeline.stop().await?, None);
    assert_eq!(transcriber.upload_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_empty_capture_skips_transcription() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let silent = write_wav(dir.path(), "empty.wav", &[], 16000, 1);
    let transcriber = Arc::new(FakeTranscriber::replying("ghost"));
    let pipeline = recorder(AudioSource::File(silent), transcriber.clone(), Duration::from_secs(5));

    pipeline.start().await?;
    assert_eq!(pipeline.stop().await?, None);
    assert_eq!(transcriber.upload_count(), 0);

    Ok(())
}

#[tokio::test]
async fn test_missing_device_is_a_media_error() {
    let pipeline = recorder(
        AudioSource::File(PathBuf::from("/nonexistent.wav")),
        Arc::new(FakeTranscriber::replying("x")),
        Duration::from_secs(5),
    );

    let err = pipeline.start().await.unwrap_err();
    assert!(matches!(err.downcast_ref::<SessionError>(), Some(SessionError::Media(_))));
    assert!(!pipeline.is_recording());
}

#[tokio::test]
async fn test_transcription_failure_is_reported() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let pipeline = recorder(
        AudioSource::File(speech_wav(dir.path())),
        Arc::new(FakeTranscriber::failing("model overloaded")),
        Duration::from_secs(5),
    );

    pipeline.start().await?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    let err = pipeline.stop().await.unwrap_err();

    assert!(matches!(err.downcast_ref::<SessionError>(), Some(SessionError::Transcription(_))));
    assert!(!pipeline.is_recording(), "Device must be released even when transcription fails");
    assert!(!pipeline.is_transcribing());

    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_transcription_timeout() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let pipeline = recorder(
        AudioSource::File(speech_wav(dir.path())),
        Arc::new(FakeTranscriber::replying("too late").with_delay(Duration::from_secs(60))),
        Duration::from_secs(2),
    );

    pipeline.start().await?;
    tokio::time::sleep(Duration::from_millis(50)).await;
    let err = pipeline.stop().await.unwrap_err();

    match err.downcast_ref::<SessionError>() {
        Some(SessionError::Transcription(message)) => assert!(message.contains("timed out")),
        other => panic!("unexpected error {:?}", other),
    }

    Ok(())
}
