// Constant-Q module - log-frequency transform via spectral kernels
//
// Each of the 84 bins (7 octaves from C1, 12 per octave) is a Hann-windowed
// complex exponential whose length is Q * sr / f_k, so every bin spans the
// same number of cycles. The kernels are moved into the frequency domain
// once (Brown-Puckette), thresholded into sparse form, and correlated with
// the FFT of each centered frame.
//
// Chroma folds the 84 bins onto 12 pitch classes and normalizes every frame
// by its loudest class.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

use crate::spectrogram::stft::HOP_LENGTH;

/// Lowest bin frequency (C1)
pub const FMIN_HZ: f32 = 32.703_197;

/// Number of constant-Q bins
pub const N_BINS: usize = 84;

/// Bins per octave
pub const BINS_PER_OCTAVE: usize = 12;

/// Pitch classes in a chromagram
pub const N_CHROMA: usize = 12;

/// Spectral kernel entries below this fraction of the kernel peak are dropped
const SPARSITY_THRESHOLD: f32 = 0.005;

struct SparseKernel {
    entries: Vec<(usize, Complex<f32>)>,
}

/// Constant-Q transform for one sample rate
pub struct ConstantQ {
    fmin: f32,
    bins_per_octave: usize,
    hop: usize,
    fft_len: usize,
    kernels: Vec<SparseKernel>,
    fft: Arc<dyn Fft<f32>>,
}

impl ConstantQ {
    /// Standard layout: 84 bins from C1, 12 per octave, hop 512
    pub fn new(sample_rate: u32) -> Self {
        Self::with_layout(sample_rate, FMIN_HZ, N_BINS, BINS_PER_OCTAVE, HOP_LENGTH)
    }

    pub fn with_layout(
        sample_rate: u32,
        fmin: f32,
        n_bins: usize,
        bins_per_octave: usize,
        hop: usize,
    ) -> Self {
        let sr = sample_rate as f32;
        let q = 1.0 / (2.0f32.powf(1.0 / bins_per_octave as f32) - 1.0);
        let frequencies: Vec<f32> = (0..n_bins)
            .map(|k| fmin * 2.0f32.powf(k as f32 / bins_per_octave as f32))
            .collect();
        let lengths: Vec<usize> = frequencies
            .iter()
            .map(|f| (q * sr / f).ceil().max(1.0) as usize)
            .collect();
        let fft_len = lengths.iter().copied().max().unwrap_or(1).next_power_of_two();

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(fft_len);

        let kernels = frequencies
            .iter()
            .zip(lengths.iter())
            .map(|(&freq, &len)| {
                let mut buffer = vec![Complex::new(0.0f32, 0.0); fft_len];
                let start = (fft_len - len) / 2;
                for n in 0..len {
                    let window = 0.5 * (1.0 - (2.0 * PI * n as f32 / len as f32).cos());
                    let phase = 2.0 * PI * freq * (n as f32 - len as f32 / 2.0) / sr;
                    buffer[start + n] = Complex::from_polar(window / len as f32, phase);
                }
                fft.process(&mut buffer);

                let peak = buffer.iter().map(|c| c.norm()).fold(0.0f32, f32::max);
                let entries = buffer
                    .iter()
                    .enumerate()
                    .filter(|(_, c)| c.norm() >= peak * SPARSITY_THRESHOLD)
                    .map(|(j, c)| (j, c.conj() / fft_len as f32))
                    .collect();
                SparseKernel { entries }
            })
            .collect();

        Self {
            fmin,
            bins_per_octave,
            hop: hop.max(1),
            fft_len,
            kernels,
            fft,
        }
    }

    pub fn n_bins(&self) -> usize {
        self.kernels.len()
    }

    pub fn fmin(&self) -> f32 {
        self.fmin
    }

    pub fn bins_per_octave(&self) -> usize {
        self.bins_per_octave
    }

    /// Center frequency of bin `k`
    pub fn bin_frequency(&self, k: usize) -> f32 {
        self.fmin * 2.0f32.powf(k as f32 / self.bins_per_octave as f32)
    }

    /// Constant-Q magnitudes laid out as `[bin][frame]`
    pub fn magnitude(&self, audio: &[f32]) -> Vec<Vec<f32>> {
        let frames = 1 + audio.len() / self.hop;
        let half = (self.fft_len / 2) as isize;
        let mut output = vec![vec![0.0f32; frames]; self.kernels.len()];
        let mut buffer = vec![Complex::new(0.0f32, 0.0); self.fft_len];

        for frame in 0..frames {
            let start = (frame * self.hop) as isize - half;
            for (j, slot) in buffer.iter_mut().enumerate() {
                let idx = start + j as isize;
                let sample = if idx >= 0 && (idx as usize) < audio.len() {
                    audio[idx as usize]
                } else {
                    0.0
                };
                *slot = Complex::new(sample, 0.0);
            }
            self.fft.process(&mut buffer);

            for (bin, kernel) in self.kernels.iter().enumerate() {
                let value: Complex<f32> = kernel
                    .entries
                    .iter()
                    .map(|(j, k)| buffer[*j] * k)
                    .sum();
                output[bin][frame] = value.norm();
            }
        }

        output
    }

    /// Fold constant-Q magnitudes onto 12 pitch classes, max-normalized per frame
    ///
    /// Row 0 is the pitch class of `fmin` (C for the standard layout).
    pub fn chroma(&self, cqt: &[Vec<f32>]) -> Vec<Vec<f32>> {
        let frames = cqt.first().map(Vec::len).unwrap_or(0);
        let per_class = (self.bins_per_octave / N_CHROMA).max(1);
        let mut chroma = vec![vec![0.0f32; frames]; N_CHROMA];

        for (bin, row) in cqt.iter().enumerate() {
            let class = (bin / per_class) % N_CHROMA;
            for (frame, value) in row.iter().enumerate() {
                chroma[class][frame] += value;
            }
        }

        for frame in 0..frames {
            let peak = (0..N_CHROMA)
                .map(|class| chroma[class][frame])
                .fold(0.0f32, f32::max);
            if peak > f32::MIN_POSITIVE {
                for row in chroma.iter_mut() {
                    row[frame] /= peak;
                }
            }
        }

        chroma
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(sample_rate: u32, frequency: f32, len: usize) -> Vec<f32> {
        (0..len)
            .map(|i| (2.0 * PI * frequency * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    fn loudest_bin(matrix: &[Vec<f32>], frame: usize) -> usize {
        (0..matrix.len())
            .max_by(|a, b| matrix[*a][frame].total_cmp(&matrix[*b][frame]))
            .unwrap()
    }

    #[test]
    fn test_bin_frequencies_double_per_octave() {
        let cqt = ConstantQ::with_layout(8_000, 110.0, 24, 12, 256);
        assert!((cqt.bin_frequency(12) - 220.0).abs() < 0.01);
        assert_eq!(cqt.n_bins(), 24);
    }

    #[test]
    fn test_a4_tone_peaks_at_a4_bin() {
        let sample_rate = 8_000;
        let cqt = ConstantQ::with_layout(sample_rate, 110.0, 36, 12, 256);
        let audio = sine(sample_rate, 440.0, sample_rate as usize);
        let magnitude = cqt.magnitude(&audio);

        let middle = magnitude[0].len() / 2;
        assert_eq!(loudest_bin(&magnitude, middle), 24);
    }

    #[test]
    fn test_chroma_folds_octaves_and_normalizes() {
        let sample_rate = 8_000;
        let cqt = ConstantQ::with_layout(sample_rate, 110.0, 36, 12, 256);
        let audio = sine(sample_rate, 440.0, sample_rate as usize);
        let chroma = cqt.chroma(&cqt.magnitude(&audio));

        assert_eq!(chroma.len(), N_CHROMA);
        let middle = chroma[0].len() / 2;
        // fmin is an A, so the A pitch class is row 0 in this layout
        assert_eq!(loudest_bin(&chroma, middle), 0);
        assert!((chroma[0][middle] - 1.0).abs() < 1e-6);
        assert!(chroma.iter().flatten().all(|v| *v >= 0.0 && *v <= 1.0 + 1e-6));
    }
}
