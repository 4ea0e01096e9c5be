// Spectrogram rendering error types

use crate::error::ErrorCode;
use std::fmt;

/// Render error code constants
///
/// Error code range: 2001-2004
pub struct RenderErrorCodes {}

impl RenderErrorCodes {
    /// Transform selector is not one of the known names
    pub const UNSUPPORTED_TRANSFORM: i32 = 2001;

    /// Canvas could not be allocated for the requested size
    pub const CANVAS_FAILED: i32 = 2002;

    /// PNG encoding failed
    pub const ENCODE_FAILED: i32 = 2003;

    /// Writing the image file failed
    pub const WRITE_FAILED: i32 = 2004;
}

/// Errors raised while turning a waveform window into an image
#[derive(Debug, Clone, PartialEq)]
pub enum RenderError {
    /// Selector string did not name a supported transform
    UnsupportedTransform { name: String },

    /// Requested image dimensions are unusable
    CanvasFailed { width: u32, height: u32 },

    /// PNG encoding failed
    EncodeFailed { reason: String },

    /// Image file could not be written
    WriteFailed { path: String, reason: String },
}

impl ErrorCode for RenderError {
    fn code(&self) -> i32 {
        match self {
            RenderError::UnsupportedTransform { .. } => RenderErrorCodes::UNSUPPORTED_TRANSFORM,
            RenderError::CanvasFailed { .. } => RenderErrorCodes::CANVAS_FAILED,
            RenderError::EncodeFailed { .. } => RenderErrorCodes::ENCODE_FAILED,
            RenderError::WriteFailed { .. } => RenderErrorCodes::WRITE_FAILED,
        }
    }

    fn message(&self) -> String {
        match self {
            RenderError::UnsupportedTransform { name } => {
                format!("Unsupported spectrogram transform: {}", name)
            }
            RenderError::CanvasFailed { width, height } => {
                format!("Cannot allocate a {}x{} canvas", width, height)
            }
            RenderError::EncodeFailed { reason } => {
                format!("PNG encoding failed: {}", reason)
            }
            RenderError::WriteFailed { path, reason } => {
                format!("Failed to write {}: {}", path, reason)
            }
        }
    }
}

impl fmt::Display for RenderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "RenderError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for RenderError {}
