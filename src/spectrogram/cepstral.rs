// Cepstral module - mel-frequency cepstral coefficients
//
// Coefficients are a DCT over the log-mel spectrum of each frame. The three
// variants differ in coefficient count and DCT type.

use std::f32::consts::PI;

use crate::spectrogram::mel::{MelFilterBank, N_MELS};
use crate::spectrogram::scale::{max_value, power_to_db};
use crate::spectrogram::stft::{Stft, HOP_LENGTH, N_FFT};

/// Which DCT turns the log-mel spectrum into coefficients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DctKind {
    /// Orthonormal DCT-II
    TypeII,
    /// Orthonormal DCT-III (inverse of type II)
    TypeIII,
}

/// Cepstral variant: coefficient count and DCT type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CepstralVariant {
    pub n_mfcc: usize,
    pub dct: DctKind,
}

impl CepstralVariant {
    /// Plain MFCC: 40 coefficients, DCT-II
    pub const MFCC: Self = Self {
        n_mfcc: 40,
        dct: DctKind::TypeII,
    };

    /// Rastamat-style: 20 coefficients, DCT-II
    pub const RASTAMAT: Self = Self {
        n_mfcc: 20,
        dct: DctKind::TypeII,
    };

    /// HTK-style: 20 coefficients, DCT-III
    pub const HTK: Self = Self {
        n_mfcc: 20,
        dct: DctKind::TypeIII,
    };
}

/// Compute `[coefficient][frame]` MFCCs for the given variant
pub fn mfcc(audio: &[f32], sample_rate: u32, variant: CepstralVariant) -> Vec<Vec<f32>> {
    let stft = Stft::new(N_FFT, HOP_LENGTH);
    let bank = MelFilterBank::new(N_FFT, N_MELS, sample_rate, 0.0, sample_rate as f32 / 2.0);
    let mel = bank.apply(&stft.power(audio));
    let log_mel = power_to_db(&mel, max_value(&mel));
    dct_columns(&log_mel, variant.n_mfcc, variant.dct)
}

/// Apply an orthonormal DCT down each column of a `[row][frame]` matrix,
/// keeping the first `n_out` outputs
pub fn dct_columns(matrix: &[Vec<f32>], n_out: usize, kind: DctKind) -> Vec<Vec<f32>> {
    let n = matrix.len();
    let frames = matrix.first().map(Vec::len).unwrap_or(0);
    if n == 0 {
        return Vec::new();
    }
    let basis = dct_basis(n, n_out.min(n), kind);

    basis
        .iter()
        .map(|weights| {
            (0..frames)
                .map(|frame| {
                    weights
                        .iter()
                        .zip(matrix.iter())
                        .map(|(w, row)| w * row[frame])
                        .sum()
                })
                .collect()
        })
        .collect()
}

fn dct_basis(n: usize, n_out: usize, kind: DctKind) -> Vec<Vec<f32>> {
    let nf = n as f32;
    let scale0 = (1.0 / nf).sqrt();
    let scale = (2.0 / nf).sqrt();

    (0..n_out)
        .map(|k| {
            (0..n)
                .map(|i| match kind {
                    DctKind::TypeII => {
                        let s = if k == 0 { scale0 } else { scale };
                        s * (PI * k as f32 * (2 * i + 1) as f32 / (2.0 * nf)).cos()
                    }
                    DctKind::TypeIII => {
                        let s = if i == 0 { scale0 } else { scale };
                        s * (PI * i as f32 * (2 * k + 1) as f32 / (2.0 * nf)).cos()
                    }
                })
                .collect()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dct_ii_of_constant_is_dc_only() {
        let matrix = vec![vec![2.0]; 8];
        let out = dct_columns(&matrix, 8, DctKind::TypeII);
        // orthonormal DC term is sum / sqrt(n)
        assert!((out[0][0] - 2.0 * 8.0f32.sqrt()).abs() < 1e-4);
        assert!(out[1..].iter().all(|row| row[0].abs() < 1e-4));
    }

    #[test]
    fn test_dct_iii_inverts_dct_ii() {
        let column: Vec<f32> = vec![0.5, -1.0, 3.0, 2.0, 0.0, -0.25];
        let matrix: Vec<Vec<f32>> = column.iter().map(|v| vec![*v]).collect();
        let forward = dct_columns(&matrix, 6, DctKind::TypeII);
        let back = dct_columns(&forward, 6, DctKind::TypeIII);
        for (orig, restored) in column.iter().zip(back.iter()) {
            assert!((orig - restored[0]).abs() < 1e-4);
        }
    }

    #[test]
    fn test_variant_coefficient_counts() {
        let audio: Vec<f32> = (0..4800).map(|i| ((i % 48) as f32 / 48.0) - 0.5).collect();
        assert_eq!(mfcc(&audio, 48_000, CepstralVariant::MFCC).len(), 40);
        assert_eq!(mfcc(&audio, 48_000, CepstralVariant::RASTAMAT).len(), 20);

        let htk = mfcc(&audio, 48_000, CepstralVariant::HTK);
        assert_eq!(htk.len(), 20);
        assert_eq!(htk[0].len(), 1 + 4800 / HOP_LENGTH);
    }
}
