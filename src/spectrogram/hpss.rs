// HPSS module - harmonic/percussive separation by median filtering
//
// Harmonic energy is smooth along time, percussive energy is smooth along
// frequency. Median filtering the magnitude spectrogram in each direction
// gives two estimates that are turned into soft masks.

use crate::spectrogram::scale::max_value;
use crate::spectrogram::stft::{Stft, HOP_LENGTH, N_FFT};

/// Median filter length in frames (harmonic) and bins (percussive)
pub const KERNEL_SIZE: usize = 31;

/// Exponent of the soft masks
const MASK_POWER: i32 = 2;

/// Separated magnitude spectrograms, `[bin][frame]`
#[derive(Debug, Clone)]
pub struct HpssComponents {
    pub harmonic: Vec<Vec<f32>>,
    pub percussive: Vec<Vec<f32>>,
    /// Peak magnitude of the unseparated spectrogram
    pub reference: f32,
}

/// Separate a clip with the standard STFT layout
pub fn separate(audio: &[f32]) -> HpssComponents {
    let magnitude = Stft::new(N_FFT, HOP_LENGTH).magnitude(audio);
    separate_magnitude(&magnitude, KERNEL_SIZE)
}

/// Separate an existing `[bin][frame]` magnitude spectrogram
pub fn separate_magnitude(magnitude: &[Vec<f32>], kernel: usize) -> HpssComponents {
    let bins = magnitude.len();
    let frames = magnitude.first().map(Vec::len).unwrap_or(0);

    let along_time: Vec<Vec<f32>> = magnitude
        .iter()
        .map(|row| median_filter(row, kernel))
        .collect();

    let mut along_freq = vec![vec![0.0f32; frames]; bins];
    let mut column = vec![0.0f32; bins];
    for frame in 0..frames {
        for (bin, value) in column.iter_mut().enumerate() {
            *value = magnitude[bin][frame];
        }
        for (bin, value) in median_filter(&column, kernel).into_iter().enumerate() {
            along_freq[bin][frame] = value;
        }
    }

    let mut harmonic = vec![vec![0.0f32; frames]; bins];
    let mut percussive = vec![vec![0.0f32; frames]; bins];
    for bin in 0..bins {
        for frame in 0..frames {
            let (h_mask, p_mask) = soft_masks(along_time[bin][frame], along_freq[bin][frame]);
            harmonic[bin][frame] = magnitude[bin][frame] * h_mask;
            percussive[bin][frame] = magnitude[bin][frame] * p_mask;
        }
    }

    HpssComponents {
        harmonic,
        percussive,
        reference: max_value(magnitude),
    }
}

fn soft_masks(harmonic: f32, percussive: f32) -> (f32, f32) {
    let h = harmonic.powi(MASK_POWER);
    let p = percussive.powi(MASK_POWER);
    let total = h + p;
    if total <= f32::MIN_POSITIVE {
        return (0.0, 0.0);
    }
    (h / total, p / total)
}

/// Sliding median with mirrored edges (`d c b a | a b c d | d c b a`)
fn median_filter(values: &[f32], kernel: usize) -> Vec<f32> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }
    let half = (kernel / 2) as isize;
    let mut window = Vec::with_capacity(kernel);

    (0..n as isize)
        .map(|center| {
            window.clear();
            for offset in -half..=half {
                window.push(values[reflect_index(center + offset, n)]);
            }
            window.sort_by(f32::total_cmp);
            window[window.len() / 2]
        })
        .collect()
}

fn reflect_index(index: isize, len: usize) -> usize {
    let len = len as isize;
    let period = 2 * len;
    let mut i = index.rem_euclid(period);
    if i >= len {
        i = period - 1 - i;
    }
    i as usize
}
