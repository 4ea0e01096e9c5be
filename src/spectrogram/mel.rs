// Mel module - triangular mel filterbank over STFT power spectra

/// Number of mel bands
pub const N_MELS: usize = 128;

/// Triangular filters mapping `n_fft / 2 + 1` STFT bins onto mel bands
pub struct MelFilterBank {
    filters: Vec<Vec<f32>>,
    fmin: f32,
    fmax: f32,
}

impl MelFilterBank {
    /// Create `n_mels` filters spaced evenly on the mel scale between `fmin` and `fmax`
    pub fn new(n_fft: usize, n_mels: usize, sample_rate: u32, fmin: f32, fmax: f32) -> Self {
        let n_freqs = n_fft / 2 + 1;
        let freq_bins: Vec<f32> = (0..n_freqs)
            .map(|i| i as f32 * sample_rate as f32 / n_fft as f32)
            .collect();

        let mel_min = hz_to_mel(fmin);
        let mel_max = hz_to_mel(fmax);
        let mel_points: Vec<f32> = (0..n_mels + 2)
            .map(|i| mel_to_hz(mel_min + (mel_max - mel_min) * i as f32 / (n_mels + 1) as f32))
            .collect();

        let mut filters = vec![vec![0.0; n_freqs]; n_mels];
        for (i, filter) in filters.iter_mut().enumerate() {
            let left = mel_points[i];
            let center = mel_points[i + 1];
            let right = mel_points[i + 2];

            for (j, &freq) in freq_bins.iter().enumerate() {
                if freq >= left && freq <= center && center > left {
                    filter[j] = (freq - left) / (center - left);
                } else if freq > center && freq <= right && right > center {
                    filter[j] = (right - freq) / (right - center);
                }
            }
        }

        Self {
            filters,
            fmin,
            fmax,
        }
    }

    pub fn n_mels(&self) -> usize {
        self.filters.len()
    }

    pub fn fmin(&self) -> f32 {
        self.fmin
    }

    pub fn fmax(&self) -> f32 {
        self.fmax
    }

    /// Apply the filterbank to a `[bin][frame]` power spectrogram, giving `[mel][frame]`
    pub fn apply(&self, power: &[Vec<f32>]) -> Vec<Vec<f32>> {
        let frames = power.first().map(Vec::len).unwrap_or(0);
        self.filters
            .iter()
            .map(|filter| {
                (0..frames)
                    .map(|frame| {
                        filter
                            .iter()
                            .zip(power.iter())
                            .filter(|(weight, _)| **weight > 0.0)
                            .map(|(weight, bin)| weight * bin[frame])
                            .sum()
                    })
                    .collect()
            })
            .collect()
    }
}

/// Hz to mel (HTK formula)
pub fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

/// Mel to Hz (HTK formula)
pub fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10.0_f32.powf(mel / 2595.0) - 1.0)
}
