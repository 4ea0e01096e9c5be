// Audio module - decoding, resampling, windowing, and training-data augmentation

pub mod decoder;
pub mod mixer;
pub mod resampler;
pub mod windower;

// Re-export commonly used types for convenience
pub use decoder::{decode_wav_bytes, load_wav_file};
pub use mixer::{layer_sounds, normalize_length, random_subset, Mixer, SampleCache, SourceCatalog};
pub use resampler::Resampler;
pub use windower::{build_clip_set, split_into_clips, Clip, WindowingParams};

/// Canonical sample rate every waveform is resampled to before analysis
pub const SAMPLE_RATE: u32 = 48_000;

/// Decoded mono audio at a known sample rate
#[derive(Debug, Clone, PartialEq)]
pub struct Waveform {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl Waveform {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}
