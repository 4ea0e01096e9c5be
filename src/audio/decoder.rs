// Decoder - WAV bytes/files to mono float waveforms
//
// Uploaded recordings arrive as raw bytes, training sources as files on disk.
// Both go through the same hound reader: integer PCM is scaled to [-1, 1],
// multichannel audio is averaged down to mono, and the result is resampled
// to the requested rate.

use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::Path;

use crate::audio::resampler::Resampler;
use crate::audio::Waveform;
use crate::error::AudioError;

/// Decode an in-memory WAV stream at its native sample rate, forced to mono.
pub fn decode_wav_bytes(bytes: &[u8]) -> Result<Waveform, AudioError> {
    let reader = hound::WavReader::new(Cursor::new(bytes))?;
    decode_reader(reader, "upload")
}

/// Decode an in-memory WAV stream and resample it to `target_rate`.
pub fn decode_wav_bytes_at(bytes: &[u8], target_rate: u32) -> Result<Vec<f32>, AudioError> {
    let waveform = decode_wav_bytes(bytes)?;
    Resampler::resample(&waveform.samples, waveform.sample_rate, target_rate)
}

/// Load a WAV file from disk as mono samples at `target_rate`.
pub fn load_wav_file(path: &Path, target_rate: u32) -> Result<Vec<f32>, AudioError> {
    let file = File::open(path).map_err(|err| AudioError::Io {
        path: path.display().to_string(),
        reason: err.to_string(),
    })?;
    let reader = hound::WavReader::new(BufReader::new(file)).map_err(|err| {
        AudioError::DecodeFailed {
            reason: format!("{}: {err}", path.display()),
        }
    })?;
    let waveform = decode_reader(reader, &path.display().to_string())?;
    Resampler::resample(&waveform.samples, waveform.sample_rate, target_rate)
}

fn decode_reader<R: Read>(
    mut reader: hound::WavReader<R>,
    origin: &str,
) -> Result<Waveform, AudioError> {
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(AudioError::EmptyInput);
    }

    let read_error = |err: hound::Error| AudioError::DecodeFailed {
        reason: format!("error reading {origin}: {err}"),
    };

    let samples = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .map(|sample| sample.map_err(read_error))
            .collect::<Result<Vec<f32>, _>>()?,
        hound::SampleFormat::Int => match spec.bits_per_sample {
            8 | 16 => {
                let scale = (1i32 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i16>()
                    .map(|sample| sample.map(|v| v as f32 / scale).map_err(read_error))
                    .collect::<Result<Vec<f32>, _>>()?
            }
            24 | 32 => {
                let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
                reader
                    .samples::<i32>()
                    .map(|sample| sample.map(|v| v as f32 / scale).map_err(read_error))
                    .collect::<Result<Vec<f32>, _>>()?
            }
            bits => {
                return Err(AudioError::DecodeFailed {
                    reason: format!("unsupported bits_per_sample={} for {}", bits, origin),
                })
            }
        },
    };

    Ok(Waveform::new(
        downmix(samples, spec.channels as usize),
        spec.sample_rate,
    ))
}

/// Average interleaved frames down to a single channel.
fn downmix(samples: Vec<f32>, channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples;
    }

    samples
        .chunks(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}
