// Spectrogram module - transform kernels and PNG rendering of clips
//
// `SpectrogramRenderer::compute` turns a clip into a `Plot` for the chosen
// transform; `render` rasterizes it and delivers PNG bytes to a file, a
// buffer, both, or neither.

pub mod cepstral;
pub mod cqt;
pub mod hpss;
pub mod mel;
pub mod raster;
pub mod reassigned;
pub mod scale;
pub mod stft;
pub mod transform;

use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};

use crate::error::RenderError;
use cepstral::CepstralVariant;
use cqt::ConstantQ;
use mel::{MelFilterBank, N_MELS};
use raster::{Plot, YAxis};
use stft::{Stft, HOP_LENGTH, N_FFT};

pub use transform::Transform;

/// Frequency range shown on frequency-axis plots
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrequencyBand {
    pub min_hz: f32,
    pub max_hz: f32,
}

impl FrequencyBand {
    pub const fn new(min_hz: f32, max_hz: f32) -> Self {
        Self { min_hz, max_hz }
    }
}

/// Display band where alarm tones live
pub const FREQ_LIMIT: FrequencyBand = FrequencyBand::new(1_000.0, 4_000.0);

/// Output image size in pixels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderOptions {
    pub width: u32,
    pub height: u32,
}

impl Default for RenderOptions {
    /// 16 x 8 inches at 120 dpi
    fn default() -> Self {
        Self {
            width: 1920,
            height: 960,
        }
    }
}

/// Where rendered PNG bytes go
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RenderTarget {
    pub file: Option<PathBuf>,
    pub buffer: bool,
}

impl RenderTarget {
    pub fn file(path: impl Into<PathBuf>) -> Self {
        Self {
            file: Some(path.into()),
            buffer: false,
        }
    }

    pub fn buffer() -> Self {
        Self {
            file: None,
            buffer: true,
        }
    }

    /// Pixels are computed but nothing is written
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.file.is_none() && !self.buffer
    }
}

/// Renders clips at one sample rate; transform kernels are built on first use
pub struct SpectrogramRenderer {
    sample_rate: u32,
    band: FrequencyBand,
    options: RenderOptions,
    stft: Stft,
    mel: OnceCell<MelFilterBank>,
    cqt: OnceCell<ConstantQ>,
}

impl SpectrogramRenderer {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            band: FREQ_LIMIT,
            options: RenderOptions::default(),
            stft: Stft::new(N_FFT, HOP_LENGTH),
            mel: OnceCell::new(),
            cqt: OnceCell::new(),
        }
    }

    pub fn with_band(mut self, band: FrequencyBand) -> Self {
        self.band = band;
        self
    }

    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn band(&self) -> FrequencyBand {
        self.band
    }

    pub fn options(&self) -> RenderOptions {
        self.options
    }

    fn mel_bank(&self) -> &MelFilterBank {
        self.mel.get_or_init(|| {
            MelFilterBank::new(N_FFT, N_MELS, self.sample_rate, 0.0, self.sample_rate as f32 / 2.0)
        })
    }

    fn constant_q(&self) -> &ConstantQ {
        self.cqt.get_or_init(|| ConstantQ::new(self.sample_rate))
    }

    /// Compute the plot for `transform` without rasterizing it
    pub fn compute(&self, samples: &[f32], transform: Transform) -> Plot {
        let band = transform.applies_frequency_band().then_some(self.band);
        let log_hz = YAxis::LogHz {
            bin_hz: self.stft.bin_hz(self.sample_rate),
        };

        match transform {
            Transform::Standard => {
                let magnitude = self.stft.magnitude(samples);
                let reference = scale::max_value(&magnitude);
                Plot::Heatmap {
                    values: scale::amplitude_to_db(&magnitude, reference),
                    axis: log_hz,
                    band,
                }
            }
            Transform::Mel => {
                let bank = self.mel_bank();
                let power = bank.apply(&self.stft.power(samples));
                let reference = scale::max_value(&power);
                Plot::Heatmap {
                    values: scale::power_to_db(&power, reference),
                    axis: YAxis::Mel {
                        fmin: bank.fmin(),
                        fmax: bank.fmax(),
                    },
                    band,
                }
            }
            // the note axis has the same geometry once labels are dropped
            Transform::ConstantQFrequency | Transform::ConstantQNote => {
                let cqt = self.constant_q();
                let magnitude = cqt.magnitude(samples);
                let reference = scale::max_value(&magnitude);
                Plot::Heatmap {
                    values: scale::amplitude_to_db(&magnitude, reference),
                    axis: YAxis::ConstantQ {
                        fmin: cqt.fmin(),
                        bins_per_octave: cqt.bins_per_octave(),
                    },
                    band,
                }
            }
            Transform::Chroma => {
                let cqt = self.constant_q();
                Plot::Heatmap {
                    values: cqt.chroma(&cqt.magnitude(samples)),
                    axis: YAxis::Index,
                    band,
                }
            }
            Transform::Mfcc | Transform::MfccRastamat | Transform::MfccHtk => {
                let variant = match transform {
                    Transform::MfccRastamat => CepstralVariant::RASTAMAT,
                    Transform::MfccHtk => CepstralVariant::HTK,
                    _ => CepstralVariant::MFCC,
                };
                Plot::Heatmap {
                    values: cepstral::mfcc(samples, self.sample_rate, variant),
                    axis: YAxis::Index,
                    band,
                }
            }
            Transform::Reassigned => Plot::Scatter {
                points: reassigned::reassign(samples, self.sample_rate),
                band,
                nyquist: self.sample_rate as f32 / 2.0,
            },
            Transform::Harmonic | Transform::Percussive => {
                let parts = hpss::separate(samples);
                let component = if transform == Transform::Harmonic {
                    parts.harmonic
                } else {
                    parts.percussive
                };
                Plot::Heatmap {
                    values: scale::amplitude_to_db(&component, parts.reference),
                    axis: log_hz,
                    band,
                }
            }
            Transform::Wave => Plot::Line {
                samples: samples.to_vec(),
            },
        }
    }

    /// Render a clip and deliver the PNG to `target`
    ///
    /// Returns the PNG bytes when `target.buffer` is set. With an empty
    /// target the pixels are computed and then dropped.
    pub fn render(
        &self,
        samples: &[f32],
        transform: Transform,
        target: &RenderTarget,
    ) -> Result<Option<Vec<u8>>, RenderError> {
        let plot = self.compute(samples, transform);
        let pixmap = raster::rasterize(&plot, self.options.width, self.options.height)?;

        if target.is_empty() {
            tracing::debug!("[Renderer] {} rendered with no target", transform);
            return Ok(None);
        }

        let png = raster::encode_png(&pixmap)?;
        if let Some(path) = &target.file {
            write_png(path, &png)?;
        }

        Ok(target.buffer.then_some(png))
    }

    /// Render a clip to in-memory PNG bytes
    pub fn render_to_buffer(&self, samples: &[f32], transform: Transform) -> Result<Vec<u8>, RenderError> {
        let plot = self.compute(samples, transform);
        let pixmap = raster::rasterize(&plot, self.options.width, self.options.height)?;
        raster::encode_png(&pixmap)
    }

    /// Render a clip to a PNG file
    pub fn render_to_file(&self, samples: &[f32], transform: Transform, path: &Path) -> Result<(), RenderError> {
        let png = self.render_to_buffer(samples, transform)?;
        write_png(path, &png)
    }
}

fn write_png(path: &Path, png: &[u8]) -> Result<(), RenderError> {
    std::fs::write(path, png).map_err(|e| RenderError::WriteFailed {
        path: path.display().to_string(),
        reason: e.to_string(),
    })
}
