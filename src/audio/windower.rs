// Windower - fixed-length overlapping clip segmentation
//
// Algorithm:
// 1. Decode the upload and resample to the canonical rate (mono)
// 2. If the waveform is shorter than one window, it is the only clip
// 3. Otherwise cut windows of `window_samples` starting at 0, advancing by
//    `step_samples = window_samples * (1 - overlap)`, truncating the tail
// 4. Stop once the start position reaches the end of the waveform
//
// Clip i starts at `i * step_samples / sample_rate` seconds; the inference
// driver uses that offset for event start/end reporting.

use std::time::Duration;

use crate::audio::decoder::decode_wav_bytes_at;
use crate::error::AudioError;

/// Window geometry derived from clip length, overlap, and sample rate
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WindowingParams {
    pub sample_rate: u32,
    pub window_samples: usize,
    pub step_samples: usize,
    pub clip_length_secs: u32,
}

impl WindowingParams {
    /// Build params for `clip_length_secs` windows overlapping by `overlap` (0 <= overlap < 1)
    ///
    /// The step never drops below one sample, so segmentation always terminates.
    pub fn new(sample_rate: u32, clip_length_secs: u32, overlap: f64) -> Self {
        let window_samples = sample_rate as usize * clip_length_secs as usize;
        let step_samples = ((window_samples as f64) * (1.0 - overlap)) as usize;
        Self {
            sample_rate,
            window_samples,
            step_samples: step_samples.max(1),
            clip_length_secs,
        }
    }

    /// Offset of clip `index` from the start of the recording
    pub fn clip_start(&self, index: usize) -> Duration {
        let offset_secs = (index * self.step_samples) as f64 / self.sample_rate as f64;
        Duration::from_secs_f64(offset_secs)
    }

    /// Nominal end of clip `index` (start + canonical clip length, even for a truncated tail)
    pub fn clip_end(&self, index: usize) -> Duration {
        self.clip_start(index) + Duration::from_secs(self.clip_length_secs as u64)
    }
}

/// One analysis window, an owned copy of its slice of the source
#[derive(Debug, Clone, PartialEq)]
pub struct Clip {
    pub index: usize,
    pub start_sample: usize,
    pub samples: Vec<f32>,
}

impl Clip {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// Decode raw upload bytes and cut them into ordered clips
pub fn build_clip_set(raw_audio: &[u8], params: &WindowingParams) -> Result<Vec<Clip>, AudioError> {
    let samples = decode_wav_bytes_at(raw_audio, params.sample_rate)?;
    let clips = split_into_clips(&samples, params);

    tracing::info!(
        "[Windower] {} samples -> {} clips (window={}, step={})",
        samples.len(),
        clips.len(),
        params.window_samples,
        params.step_samples
    );

    Ok(clips)
}

/// Cut an already-decoded waveform into ordered clips without touching the source
pub fn split_into_clips(samples: &[f32], params: &WindowingParams) -> Vec<Clip> {
    let total = samples.len();

    if total < params.window_samples {
        return vec![Clip {
            index: 0,
            start_sample: 0,
            samples: samples.to_vec(),
        }];
    }

    let mut clips = Vec::with_capacity(total.div_ceil(params.step_samples));
    let mut position = 0usize;
    while position < total {
        let end = (position + params.window_samples).min(total);
        clips.push(Clip {
            index: clips.len(),
            start_sample: position,
            samples: samples[position..end].to_vec(),
        });
        position += params.step_samples;
    }

    clips
}
