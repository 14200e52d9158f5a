use crate::presets::Stage;
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::path::Path;
use thiserror::Error;
use tracing::debug;

/// Errors from the enhancement engine
#[derive(Debug, Error)]
pub enum EnhanceError {
    #[error("failed to decode input audio: {0}")]
    Decode(hound::Error),
    #[error("failed to encode output audio: {0}")]
    Encode(hound::Error),
    #[error("input has no audio channels")]
    NoChannels,
}

/// Peak level targeted by normalization, just below full scale
const NORMALIZE_PEAK: f32 = 0.99;

/// Decode a WAV file, run the enhancement chain over it and write the result
/// as 16-bit PCM at the source sample rate and channel count.
pub fn enhance_file(
    input_path: &Path,
    output_path: &Path,
    chain: &[Stage],
) -> Result<(), EnhanceError> {
    let (spec, mut samples) = decode_wav(input_path)?;

    if spec.channels == 0 {
        return Err(EnhanceError::NoChannels);
    }

    for stage in chain {
        apply_stage(&mut samples, spec.channels as usize, spec.sample_rate, *stage);
    }

    debug!(
        input = %input_path.display(),
        output = %output_path.display(),
        stages = chain.len(),
        samples = samples.len(),
        "Enhancement chain applied"
    );

    encode_wav(output_path, &spec, &samples)
}

/// Read any supported WAV into interleaved f32 samples in [-1, 1]
fn decode_wav(path: &Path) -> Result<(WavSpec, Vec<f32>), EnhanceError> {
    let mut reader = WavReader::open(path).map_err(EnhanceError::Decode)?;
    let spec = reader.spec();

    let samples = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<Vec<f32>, _>>()
            .map_err(EnhanceError::Decode)?,
        SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<Result<Vec<f32>, _>>()
                .map_err(EnhanceError::Decode)?
        }
    };

    Ok((spec, samples))
}

/// Write interleaved f32 samples as a 16-bit PCM WAV
fn encode_wav(path: &Path, spec: &WavSpec, samples: &[f32]) -> Result<(), EnhanceError> {
    let out_spec = WavSpec {
        channels: spec.channels,
        sample_rate: spec.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, out_spec).map_err(EnhanceError::Encode)?;
    for &sample in samples {
        let value = (sample.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
        writer.write_sample(value).map_err(EnhanceError::Encode)?;
    }
    writer.finalize().map_err(EnhanceError::Encode)
}

/// Apply one enhancement stage in place
pub fn apply_stage(samples: &mut [f32], channels: usize, sample_rate: u32, stage: Stage) {
    match stage {
        Stage::Normalize => normalize(samples),
        Stage::LowPass(cutoff) => low_pass(samples, channels, sample_rate, cutoff),
        Stage::HighPass(cutoff) => high_pass(samples, channels, sample_rate, cutoff),
        Stage::Reverse => reverse_frames(samples, channels),
    }
}

/// Scale the signal so its peak sits at [`NORMALIZE_PEAK`]
fn normalize(samples: &mut [f32]) {
    let peak = samples.iter().fold(0.0f32, |acc, s| acc.max(s.abs()));
    if peak > 0.0 {
        let gain = NORMALIZE_PEAK / peak;
        for sample in samples.iter_mut() {
            *sample *= gain;
        }
    }
}

/// One-pole low-pass with independent state per channel
fn low_pass(samples: &mut [f32], channels: usize, sample_rate: u32, cutoff: f32) {
    let alpha = smoothing_factor(sample_rate, cutoff);
    let mut state = vec![0.0f32; channels];

    for frame in samples.chunks_mut(channels) {
        for (sample, prev) in frame.iter_mut().zip(state.iter_mut()) {
            *prev += alpha * (*sample - *prev);
            *sample = *prev;
        }
    }
}

/// One-pole high-pass with independent state per channel
fn high_pass(samples: &mut [f32], channels: usize, sample_rate: u32, cutoff: f32) {
    let alpha = 1.0 - smoothing_factor(sample_rate, cutoff);
    let mut prev_input = vec![0.0f32; channels];
    let mut prev_output = vec![0.0f32; channels];

    for frame in samples.chunks_mut(channels) {
        for (ch, sample) in frame.iter_mut().enumerate() {
            let output = alpha * (prev_output[ch] + *sample - prev_input[ch]);
            prev_input[ch] = *sample;
            prev_output[ch] = output;
            *sample = output;
        }
    }
}

/// Reverse frame order, keeping channel interleaving intact
fn reverse_frames(samples: &mut [f32], channels: usize) {
    let frames = samples.len() / channels;
    for i in 0..frames / 2 {
        let j = frames - 1 - i;
        for ch in 0..channels {
            samples.swap(i * channels + ch, j * channels + ch);
        }
    }
}

/// Smoothing factor for a one-pole filter at the given cutoff
fn smoothing_factor(sample_rate: u32, cutoff: f32) -> f32 {
    let rc = 1.0 / (2.0 * std::f32::consts::PI * cutoff);
    let dt = 1.0 / sample_rate as f32;
    dt / (rc + dt)
}
