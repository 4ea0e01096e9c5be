// Error types for the alarm finder pipeline
//
// This module defines custom error types for audio decoding, spectrogram
// rendering, external service calls, and detection orchestration, providing
// structured error handling with stable numeric codes for logs and CLI output.

mod audio;
mod config;
mod detection;
mod render;
mod service;

pub use audio::{log_audio_error, AudioError, AudioErrorCodes};
pub use config::{ConfigError, ConfigErrorCodes};
pub use detection::{log_detection_error, DetectionError, DetectionErrorCodes};
pub use render::{RenderError, RenderErrorCodes};
pub use service::{ServiceError, ServiceErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent reporting from both
/// binaries and library callers.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}
