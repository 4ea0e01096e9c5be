// Detection pipeline error types
//
// DetectionError is the error type of the inference path. It wraps audio,
// render, and service failures so `?` composes across the whole pipeline.

use crate::error::{AudioError, ErrorCode, RenderError, ServiceError};
use log::error;
use std::fmt;

/// Detection error code constants
///
/// Error code range: 4001-4002. Wrapped errors report their own codes.
pub struct DetectionErrorCodes {}

impl DetectionErrorCodes {
    /// Classifier response did not contain the expected label
    pub const LABEL_MISSING: i32 = 4001;

    /// Upload event payload could not be parsed
    pub const INVALID_EVENT: i32 = 4002;
}

/// Log a detection error with structured context
pub fn log_detection_error(err: &DetectionError, context: &str) {
    error!(
        "Detection error in {}: code={}, component=InferenceDriver, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors that abort processing of one uploaded file
#[derive(Debug, Clone, PartialEq)]
pub enum DetectionError {
    Audio(AudioError),
    Render(RenderError),
    Service(ServiceError),

    /// The classifier taxonomy no longer contains the expected label
    LabelMissing { label: String, available: Vec<String> },

    /// Trigger payload was not a recognizable upload event
    InvalidEvent { reason: String },
}

impl ErrorCode for DetectionError {
    fn code(&self) -> i32 {
        match self {
            DetectionError::Audio(err) => err.code(),
            DetectionError::Render(err) => err.code(),
            DetectionError::Service(err) => err.code(),
            DetectionError::LabelMissing { .. } => DetectionErrorCodes::LABEL_MISSING,
            DetectionError::InvalidEvent { .. } => DetectionErrorCodes::INVALID_EVENT,
        }
    }

    fn message(&self) -> String {
        match self {
            DetectionError::Audio(err) => err.message(),
            DetectionError::Render(err) => err.message(),
            DetectionError::Service(err) => err.message(),
            DetectionError::LabelMissing { label, available } => {
                format!(
                    "Classifier response has no '{}' label (got: {})",
                    label,
                    available.join(", ")
                )
            }
            DetectionError::InvalidEvent { reason } => {
                format!("Invalid upload event: {}", reason)
            }
        }
    }
}

impl fmt::Display for DetectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DetectionError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for DetectionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            DetectionError::Audio(err) => Some(err),
            DetectionError::Render(err) => Some(err),
            DetectionError::Service(err) => Some(err),
            _ => None,
        }
    }
}

impl From<AudioError> for DetectionError {
    fn from(err: AudioError) -> Self {
        DetectionError::Audio(err)
    }
}

impl From<RenderError> for DetectionError {
    fn from(err: RenderError) -> Self {
        DetectionError::Render(err)
    }
}

impl From<ServiceError> for DetectionError {
    fn from(err: ServiceError) -> Self {
        DetectionError::Service(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AudioErrorCodes, ServiceErrorCodes};

    #[test]
    fn test_wrapped_errors_keep_their_codes() {
        let err: DetectionError = AudioError::EmptyInput.into();
        assert_eq!(err.code(), AudioErrorCodes::EMPTY_INPUT);

        let err: DetectionError = ServiceError::fatal("storage", "NoSuchKey").into();
        assert_eq!(err.code(), ServiceErrorCodes::FATAL);
    }

    #[test]
    fn test_label_missing_lists_available_labels() {
        let err = DetectionError::LabelMissing {
            label: "alarm".to_string(),
            available: vec!["siren".to_string(), "speech".to_string()],
        };
        assert_eq!(err.code(), DetectionErrorCodes::LABEL_MISSING);
        assert!(err.message().contains("siren, speech"));
    }

    #[test]
    fn test_error_propagation() {
        fn decode() -> Result<(), AudioError> {
            Err(AudioError::EmptyInput)
        }

        fn pipeline() -> Result<(), DetectionError> {
            decode()?;
            Ok(())
        }

        assert!(matches!(
            pipeline(),
            Err(DetectionError::Audio(AudioError::EmptyInput))
        ));
    }
}
