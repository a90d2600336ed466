use anyhow::{Context, Result};
use std::io::Cursor;

use super::backend::AudioFrame;

/// Bring a captured frame to the target rate and channel layout
pub fn process_frame(frame: AudioFrame, target_sample_rate: u32, target_channels: u16) -> AudioFrame {
    let mut processed = frame;

    if processed.channels != target_channels && target_channels == 1 {
        processed = to_mono(processed);
    }

    if processed.sample_rate != target_sample_rate {
        processed = downsample(processed, target_sample_rate);
    }

    processed
}

/// Downsample by decimation; upsampling is left to the transcription service
fn downsample(frame: AudioFrame, target_rate: u32) -> AudioFrame {
    if target_rate == 0 || frame.sample_rate <= target_rate {
        return frame;
    }

    let ratio = (frame.sample_rate / target_rate) as usize;
    if ratio <= 1 {
        return frame;
    }

    let channels = frame.channels.max(1) as usize;
    let samples = frame
        .samples
        .chunks_exact(channels)
        .step_by(ratio)
        .flatten()
        .copied()
        .collect();

    AudioFrame {
        samples,
        sample_rate: frame.sample_rate / ratio as u32,
        ..frame
    }
}

/// Average interleaved channels into one
fn to_mono(frame: AudioFrame) -> AudioFrame {
    let channels = frame.channels as usize;
    if channels <= 1 {
        return frame;
    }

    let samples = frame
        .samples
        .chunks_exact(channels)
        .map(|group| {
            let sum: i32 = group.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect();

    AudioFrame {
        samples,
        channels: 1,
        ..frame
    }
}

/// Encode interleaved 16-bit PCM into an in-memory WAV file
pub fn encode_wav(samples: &[i16], sample_rate: u32, channels: u16) -> Result<Vec<u8>> {
    let spec = hound::WavSpec {
        channels,
        sample_rate,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec)
            .context("Failed to create WAV writer")?;
        for &sample in samples {
            writer.write_sample(sample)
                .context("Failed to write sample to WAV")?;
        }
        writer.finalize()
            .context("Failed to finalize WAV")?;
    }

    Ok(cursor.into_inner())
}
