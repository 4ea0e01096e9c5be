// Audio error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Audio error code constants
///
/// Error code range: 1001-1005
pub struct AudioErrorCodes {}

impl AudioErrorCodes {
    /// Input bytes are not a decodable WAV stream
    pub const DECODE_FAILED: i32 = 1001;

    /// Decoded stream carries no channels or no samples where some are required
    pub const EMPTY_INPUT: i32 = 1002;

    /// Resampler could not be built or failed mid-stream
    pub const RESAMPLE_FAILED: i32 = 1003;

    /// Source file could not be read
    pub const IO_FAILED: i32 = 1004;

    /// Source catalog has no usable `.wav` files
    pub const EMPTY_CATALOG: i32 = 1005;
}

/// Log an audio error with structured context
///
/// This function logs audio errors with structured fields including:
/// - error_code: Numeric error code for programmatic handling
/// - component: The component where the error occurred
/// - message: Human-readable error message
/// - context: Additional contextual information
pub fn log_audio_error(err: &AudioError, context: &str) {
    error!(
        "Audio error in {}: code={}, component=AudioDecoder, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Audio-related errors
///
/// These errors cover decoding raw uploads, resampling to the canonical
/// rate, and loading source clips for training data.
#[derive(Debug, Clone, PartialEq)]
pub enum AudioError {
    /// Input could not be parsed as audio
    DecodeFailed { reason: String },

    /// Input contains no channels
    EmptyInput,

    /// Resampling failed
    ResampleFailed { reason: String },

    /// Reading a source file failed
    Io { path: String, reason: String },

    /// No source files were found in a catalog directory
    EmptyCatalog { directory: String },
}

impl ErrorCode for AudioError {
    fn code(&self) -> i32 {
        match self {
            AudioError::DecodeFailed { .. } => AudioErrorCodes::DECODE_FAILED,
            AudioError::EmptyInput => AudioErrorCodes::EMPTY_INPUT,
            AudioError::ResampleFailed { .. } => AudioErrorCodes::RESAMPLE_FAILED,
            AudioError::Io { .. } => AudioErrorCodes::IO_FAILED,
            AudioError::EmptyCatalog { .. } => AudioErrorCodes::EMPTY_CATALOG,
        }
    }

    fn message(&self) -> String {
        match self {
            AudioError::DecodeFailed { reason } => {
                format!("Failed to decode audio: {}", reason)
            }
            AudioError::EmptyInput => "Audio stream has no channels".to_string(),
            AudioError::ResampleFailed { reason } => {
                format!("Failed to resample audio: {}", reason)
            }
            AudioError::Io { path, reason } => {
                format!("Failed to read {}: {}", path, reason)
            }
            AudioError::EmptyCatalog { directory } => {
                format!("No .wav files found in {}", directory)
            }
        }
    }
}

impl fmt::Display for AudioError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "AudioError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for AudioError {}

impl From<hound::Error> for AudioError {
    fn from(err: hound::Error) -> Self {
        AudioError::DecodeFailed {
            reason: err.to_string(),
        }
    }
}
