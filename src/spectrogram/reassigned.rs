// Reassigned module - time-frequency reassignment of a short STFT
//
// Three STFTs share the frame grid: the plain Hann window h, its derivative
// dh, and the time-weighted window th. Each cell is moved to
//   f = bin_hz - Im(S_dh / S_h) * sr / 2pi
//   t = center + Re(S_th / S_h) / sr
// and kept as a scatter point with its dB level.

use std::f32::consts::PI;

use crate::spectrogram::scale::power_to_db_flat;
use crate::spectrogram::stft::{hann_window, Stft};

/// FFT size for reassignment
pub const REASSIGN_N_FFT: usize = 64;

/// Hop between reassignment frames
pub const REASSIGN_HOP: usize = 16;

/// Cells quieter than this magnitude are dropped
const MIN_MAGNITUDE: f32 = 1e-3;

/// Scatter points produced by reassignment
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ReassignedPoints {
    /// Seconds from the clip start
    pub times: Vec<f32>,
    /// Hz
    pub freqs: Vec<f32>,
    /// dB relative to the loudest point
    pub levels: Vec<f32>,
    /// Clip duration in seconds
    pub duration: f32,
}

impl ReassignedPoints {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

pub fn reassign(audio: &[f32], sample_rate: u32) -> ReassignedPoints {
    reassign_with(audio, sample_rate, REASSIGN_N_FFT, REASSIGN_HOP)
}

pub fn reassign_with(audio: &[f32], sample_rate: u32, n_fft: usize, hop: usize) -> ReassignedPoints {
    let sr = sample_rate as f32;
    let nyquist = sr / 2.0;
    let duration = audio.len() as f32 / sr;

    let window = hann_window(n_fft);
    let derivative = cyclic_gradient(&window);
    let half = n_fft as f32 / 2.0;
    let time_weighted: Vec<f32> = window
        .iter()
        .enumerate()
        .map(|(j, w)| (j as f32 - half) * w)
        .collect();

    let plain = Stft::with_window(n_fft, hop, window);
    let bin_hz = plain.bin_hz(sample_rate);
    let hop = plain.hop();
    let s_h = plain.compute(audio);
    let s_dh = Stft::with_window(n_fft, hop, derivative).compute(audio);
    let s_th = Stft::with_window(n_fft, hop, time_weighted).compute(audio);

    let mut points = ReassignedPoints {
        duration,
        ..Default::default()
    };
    let mut powers = Vec::new();

    for (frame, bins) in s_h.iter().enumerate() {
        let center = (frame * hop) as f32 / sr;
        for (bin, &value) in bins.iter().enumerate() {
            let magnitude = value.norm();
            if magnitude < MIN_MAGNITUDE {
                continue;
            }
            let freq_shift = (s_dh[frame][bin] / value).im * sr / (2.0 * PI);
            let time_shift = (s_th[frame][bin] / value).re / sr;

            points
                .freqs
                .push((bin as f32 * bin_hz - freq_shift).clamp(0.0, nyquist));
            points
                .times
                .push((center + time_shift).clamp(0.0, duration));
            powers.push(magnitude * magnitude);
        }
    }

    let peak = powers.iter().copied().fold(0.0f32, f32::max);
    points.levels = power_to_db_flat(&powers, peak);
    points
}

/// Central difference with wraparound at the window edges
fn cyclic_gradient(window: &[f32]) -> Vec<f32> {
    let n = window.len();
    (0..n)
        .map(|i| (window[(i + 1) % n] - window[(i + n - 1) % n]) / 2.0)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tone_between_bins_is_pulled_to_true_frequency() {
        let sample_rate = 8_000;
        let tone = 1_060.0f32;
        let audio: Vec<f32> = (0..4_000)
            .map(|i| (2.0 * PI * tone * i as f32 / sample_rate as f32).sin())
            .collect();

        let points = reassign(&audio, sample_rate);
        assert!(!points.is_empty());

        // the loudest points sit on the tone, not on the 125 Hz bin grid
        let loud: Vec<f32> = points
            .freqs
            .iter()
            .zip(points.levels.iter())
            .filter(|(_, level)| **level > -3.0)
            .map(|(f, _)| *f)
            .collect();
        assert!(!loud.is_empty());
        let mean = loud.iter().sum::<f32>() / loud.len() as f32;
        assert!((mean - tone).abs() < 30.0, "mean reassigned frequency {}", mean);
    }

    #[test]
    fn test_points_stay_inside_clip() {
        let audio: Vec<f32> = (0..1_000).map(|i| if i % 97 == 0 { 1.0 } else { 0.0 }).collect();
        let points = reassign(&audio, 8_000);

        assert_eq!(points.times.len(), points.freqs.len());
        assert_eq!(points.levels.len(), points.len());
        assert!(points.times.iter().all(|t| *t >= 0.0 && *t <= points.duration));
        assert!(points.freqs.iter().all(|f| *f >= 0.0 && *f <= 4_000.0));
        assert!(points.levels.iter().all(|l| *l <= 1e-4));
    }

    #[test]
    fn test_silence_has_no_points() {
        assert!(reassign(&[0.0; 512], 48_000).is_empty());
    }
}
