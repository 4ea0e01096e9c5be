// Configuration error types

use crate::error::ErrorCode;
use std::fmt;

/// Config error code constants
///
/// Error code range: 5001-5002
pub struct ConfigErrorCodes {}

impl ConfigErrorCodes {
    /// A value parsed but is outside its allowed range
    pub const INVALID_VALUE: i32 = 5001;

    /// A value could not be parsed at all
    pub const UNPARSABLE: i32 = 5002;
}

/// Errors raised while building configuration from the environment or CLI
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// Value out of its documented range
    InvalidValue { key: String, value: String, expected: String },

    /// Value could not be parsed into the expected type
    Unparsable { key: String, value: String },
}

impl ErrorCode for ConfigError {
    fn code(&self) -> i32 {
        match self {
            ConfigError::InvalidValue { .. } => ConfigErrorCodes::INVALID_VALUE,
            ConfigError::Unparsable { .. } => ConfigErrorCodes::UNPARSABLE,
        }
    }

    fn message(&self) -> String {
        match self {
            ConfigError::InvalidValue {
                key,
                value,
                expected,
            } => format!("{}={} is invalid, expected {}", key, value, expected),
            ConfigError::Unparsable { key, value } => {
                format!("{}={} could not be parsed", key, value)
            }
        }
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ConfigError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for ConfigError {}
