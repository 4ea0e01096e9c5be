// STFT module - centered short-time Fourier transform
//
// Frames are centered on multiples of the hop size: the signal is zero padded
// by n_fft / 2 on both sides, which gives `1 + len / hop` frames and lets
// clips shorter than one FFT still produce a frame.

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use std::f32::consts::PI;
use std::sync::Arc;

/// FFT size for the standard, mel, and HPSS transforms
pub const N_FFT: usize = 2048;

/// Hop between frames in samples
pub const HOP_LENGTH: usize = 512;

/// Complex STFT laid out as `[frame][bin]`, bins `0..=n_fft/2`
pub type ComplexFrames = Vec<Vec<Complex<f32>>>;

/// Short-time Fourier transform with a fixed analysis window
pub struct Stft {
    n_fft: usize,
    hop: usize,
    window: Vec<f32>,
    fft: Arc<dyn Fft<f32>>,
}

impl Stft {
    /// Create an STFT with a periodic Hann window
    pub fn new(n_fft: usize, hop: usize) -> Self {
        Self::with_window(n_fft, hop, hann_window(n_fft))
    }

    /// Create an STFT with a caller-supplied window of length `n_fft`
    pub fn with_window(n_fft: usize, hop: usize, window: Vec<f32>) -> Self {
        let fft = FftPlanner::new().plan_fft_forward(n_fft);
        Self {
            n_fft,
            hop: hop.max(1),
            window,
            fft,
        }
    }

    pub fn n_fft(&self) -> usize {
        self.n_fft
    }

    pub fn hop(&self) -> usize {
        self.hop
    }

    pub fn bin_count(&self) -> usize {
        self.n_fft / 2 + 1
    }

    /// Width of one frequency bin in Hz
    pub fn bin_hz(&self, sample_rate: u32) -> f32 {
        sample_rate as f32 / self.n_fft as f32
    }

    pub fn frame_count(&self, len: usize) -> usize {
        1 + len / self.hop
    }

    /// Compute the complex spectrum of every centered frame
    pub fn compute(&self, audio: &[f32]) -> ComplexFrames {
        let half = (self.n_fft / 2) as isize;
        let frames = self.frame_count(audio.len());
        let mut buffer = vec![Complex::new(0.0, 0.0); self.n_fft];
        let mut output = Vec::with_capacity(frames);

        for frame in 0..frames {
            let start = (frame * self.hop) as isize - half;
            for (j, slot) in buffer.iter_mut().enumerate() {
                let idx = start + j as isize;
                let sample = if idx >= 0 && (idx as usize) < audio.len() {
                    audio[idx as usize]
                } else {
                    0.0
                };
                *slot = Complex::new(sample * self.window[j], 0.0);
            }

            self.fft.process(&mut buffer);
            output.push(buffer[..self.bin_count()].to_vec());
        }

        output
    }

    /// Magnitude spectrogram laid out as `[bin][frame]`
    pub fn magnitude(&self, audio: &[f32]) -> Vec<Vec<f32>> {
        transpose_map(&self.compute(audio), |c| c.norm())
    }

    /// Power spectrogram laid out as `[bin][frame]`
    pub fn power(&self, audio: &[f32]) -> Vec<Vec<f32>> {
        transpose_map(&self.compute(audio), |c| c.norm_sqr())
    }
}

/// Convert `[frame][bin]` complex frames into a `[bin][frame]` real matrix
pub fn transpose_map(frames: &ComplexFrames, f: impl Fn(&Complex<f32>) -> f32) -> Vec<Vec<f32>> {
    let bins = frames.first().map(Vec::len).unwrap_or(0);
    (0..bins)
        .map(|bin| frames.iter().map(|frame| f(&frame[bin])).collect())
        .collect()
}

/// Periodic Hann window (the DFT-even form used for spectral analysis)
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / size as f32).cos()))
        .collect()
}
