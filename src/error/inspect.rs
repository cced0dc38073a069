// Inspection error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;

/// Inspection error code constants
///
/// Error code range: 4001-4003
pub struct InspectErrorCodes {}

impl InspectErrorCodes {
    /// Inspect command exited non-zero
    pub const EXIT_CODE: i32 = 4001;

    /// Stdout was not a JSON array of the expected record type
    pub const DECODE: i32 = 4002;

    /// Result set did not hold exactly one record
    pub const CARDINALITY: i32 = 4003;
}

/// Log an inspection error with structured context
pub fn log_inspect_error(err: &InspectError, context: &str) {
    error!(
        "Inspect error in {}: code={}, component=Inspect, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised while decoding an inspect sub-command result
///
/// Every variant carries `info`: the command line plus raw stdout/stderr,
/// so the failure report shows exactly what the backend printed.
///
/// Error code range: 4001-4003
#[derive(Debug, Clone, PartialEq)]
pub enum InspectError {
    /// The inspect command did not exit 0
    ExitCode { code: i32, info: String },

    /// Output could not be decoded
    Decode { reason: String, info: String },

    /// Output decoded but held zero or several records
    Cardinality { found: usize, info: String },
}

impl InspectError {
    /// Raw command diagnostics attached to the error.
    pub fn info(&self) -> &str {
        match self {
            InspectError::ExitCode { info, .. }
            | InspectError::Decode { info, .. }
            | InspectError::Cardinality { info, .. } => info,
        }
    }
}

impl ErrorCode for InspectError {
    fn code(&self) -> i32 {
        match self {
            InspectError::ExitCode { .. } => InspectErrorCodes::EXIT_CODE,
            InspectError::Decode { .. } => InspectErrorCodes::DECODE,
            InspectError::Cardinality { .. } => InspectErrorCodes::CARDINALITY,
        }
    }

    fn message(&self) -> String {
        match self {
            InspectError::ExitCode { code, info } => {
                format!("Inspect exited with code {}\n{}", code, info)
            }
            InspectError::Decode { reason, info } => {
                format!("Unable to unmarshal output: {}\n{}", reason, info)
            }
            InspectError::Cardinality { found, info } => {
                format!("Expected exactly one result, got {}\n{}", found, info)
            }
        }
    }
}

impl fmt::Display for InspectError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "InspectError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for InspectError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inspect_error_codes() {
        assert_eq!(
            InspectError::ExitCode {
                code: 1,
                info: String::new()
            }
            .code(),
            InspectErrorCodes::EXIT_CODE
        );
        assert_eq!(
            InspectError::Decode {
                reason: "eof".to_string(),
                info: String::new()
            }
            .code(),
            InspectErrorCodes::DECODE
        );
        assert_eq!(
            InspectError::Cardinality {
                found: 0,
                info: String::new()
            }
            .code(),
            InspectErrorCodes::CARDINALITY
        );
    }

    #[test]
    fn test_messages_carry_raw_output() {
        let err = InspectError::Cardinality {
            found: 2,
            info: "stdout: [{},{}]".to_string(),
        };
        assert!(err.message().contains("got 2"));
        assert!(err.message().contains("stdout: [{},{}]"));
        assert_eq!(err.info(), "stdout: [{},{}]");
    }
}
