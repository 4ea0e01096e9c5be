// Transform - closed set of spectrogram representations
//
// Selectors are parsed from their historical string names ("Std", "Mel",
// "QPlot-freq", ...). Unknown names are rejected at parse time, so every
// renderable value is handled exhaustively by the renderer.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::RenderError;

/// Spectrogram representation used to render a clip
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Transform {
    /// Log-magnitude STFT on a log frequency axis
    #[default]
    #[serde(rename = "Std")]
    Standard,
    /// Mel-scaled power spectrogram
    #[serde(rename = "Mel")]
    Mel,
    /// Constant-Q transform on a frequency axis
    #[serde(rename = "QPlot-freq")]
    ConstantQFrequency,
    /// Constant-Q transform on a musical note axis
    #[serde(rename = "QPlot-axis")]
    ConstantQNote,
    /// 12-bin pitch class profile
    #[serde(rename = "Chroma")]
    Chroma,
    /// MFCC, orthonormal DCT-II, 40 coefficients
    #[serde(rename = "mfcc")]
    Mfcc,
    /// MFCC, orthonormal DCT-II, 20 coefficients
    #[serde(rename = "mfcc-rast")]
    MfccRastamat,
    /// MFCC, orthonormal DCT-III, 20 coefficients
    #[serde(rename = "mfcc-htk")]
    MfccHtk,
    /// Reassigned spectrogram scatter (short 64-point transform)
    #[serde(rename = "reassigned")]
    Reassigned,
    /// Harmonic part of harmonic-percussive separation
    #[serde(rename = "harmonic")]
    Harmonic,
    /// Percussive part of harmonic-percussive separation
    #[serde(rename = "percussive")]
    Percussive,
    /// Time-domain waveform plot
    #[serde(rename = "wave")]
    Wave,
}

impl Transform {
    pub const ALL: [Transform; 12] = [
        Transform::Standard,
        Transform::Mel,
        Transform::ConstantQFrequency,
        Transform::ConstantQNote,
        Transform::Chroma,
        Transform::Mfcc,
        Transform::MfccRastamat,
        Transform::MfccHtk,
        Transform::Reassigned,
        Transform::Harmonic,
        Transform::Percussive,
        Transform::Wave,
    ];

    /// Selector name, also used as the training folder name
    pub fn as_str(&self) -> &'static str {
        match self {
            Transform::Standard => "Std",
            Transform::Mel => "Mel",
            Transform::ConstantQFrequency => "QPlot-freq",
            Transform::ConstantQNote => "QPlot-axis",
            Transform::Chroma => "Chroma",
            Transform::Mfcc => "mfcc",
            Transform::MfccRastamat => "mfcc-rast",
            Transform::MfccHtk => "mfcc-htk",
            Transform::Reassigned => "reassigned",
            Transform::Harmonic => "harmonic",
            Transform::Percussive => "percussive",
            Transform::Wave => "wave",
        }
    }

    /// Whether the display is clipped to the configured frequency band
    pub fn applies_frequency_band(&self) -> bool {
        !matches!(
            self,
            Transform::Chroma
                | Transform::Mfcc
                | Transform::MfccRastamat
                | Transform::MfccHtk
                | Transform::Wave
        )
    }
}

impl fmt::Display for Transform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Transform {
    type Err = RenderError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Transform::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| RenderError::UnsupportedTransform {
                name: s.to_string(),
            })
    }
}
