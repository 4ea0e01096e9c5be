// External collaborator error types (storage, classifier, notification)

use crate::error::ErrorCode;
use std::fmt;

/// Service error code constants
///
/// Error code range: 3001-3004
pub struct ServiceErrorCodes {}

impl ServiceErrorCodes {
    /// Throttling or connectivity problem, safe to retry
    pub const TRANSIENT: i32 = 3001;

    /// Request rejected, retrying will not help
    pub const FATAL: i32 = 3002;

    /// Retry budget spent without a successful call
    pub const RETRY_EXHAUSTED: i32 = 3003;

    /// Response body could not be understood
    pub const MALFORMED_RESPONSE: i32 = 3004;
}

/// Errors returned by external service collaborators
#[derive(Debug, Clone, PartialEq)]
pub enum ServiceError {
    /// Throttling, timeouts, or connection failures
    Transient { service: String, reason: String },

    /// Non-retryable rejection (bad request, missing object, auth)
    Fatal { service: String, reason: String },

    /// Transient failures continued past the retry budget
    RetryExhausted {
        attempts: u32,
        last: Box<ServiceError>,
    },

    /// Service answered with a body we cannot parse
    MalformedResponse { service: String, reason: String },
}

impl ServiceError {
    pub fn transient(service: &str, reason: impl Into<String>) -> Self {
        ServiceError::Transient {
            service: service.to_string(),
            reason: reason.into(),
        }
    }

    pub fn fatal(service: &str, reason: impl Into<String>) -> Self {
        ServiceError::Fatal {
            service: service.to_string(),
            reason: reason.into(),
        }
    }

    /// Only transient failures are worth another attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, ServiceError::Transient { .. })
    }
}

impl ErrorCode for ServiceError {
    fn code(&self) -> i32 {
        match self {
            ServiceError::Transient { .. } => ServiceErrorCodes::TRANSIENT,
            ServiceError::Fatal { .. } => ServiceErrorCodes::FATAL,
            ServiceError::RetryExhausted { .. } => ServiceErrorCodes::RETRY_EXHAUSTED,
            ServiceError::MalformedResponse { .. } => ServiceErrorCodes::MALFORMED_RESPONSE,
        }
    }

    fn message(&self) -> String {
        match self {
            ServiceError::Transient { service, reason } => {
                format!("{} temporarily unavailable: {}", service, reason)
            }
            ServiceError::Fatal { service, reason } => {
                format!("{} rejected the request: {}", service, reason)
            }
            ServiceError::RetryExhausted { attempts, last } => {
                format!(
                    "Gave up after {} attempts, last error: {}",
                    attempts,
                    last.message()
                )
            }
            ServiceError::MalformedResponse { service, reason } => {
                format!("{} returned an unreadable response: {}", service, reason)
            }
        }
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ServiceError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for ServiceError {}
