// Environment probe error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;
use std::path::PathBuf;

/// Probe error code constants
///
/// Error code range: 5001-5002
pub struct ProbeErrorCodes {}

impl ProbeErrorCodes {
    /// No buildkitd socket could be located
    pub const BUILDKIT_NOT_FOUND: i32 = 5001;

    /// Unknown backend identifier
    pub const INVALID_TARGET: i32 = 5002;
}

/// Log a probe error with structured context
pub fn log_probe_error(err: &ProbeError, context: &str) {
    error!(
        "Probe error in {}: code={}, component=Environment, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors raised while probing the ambient execution environment
///
/// Error code range: 5001-5002
#[derive(Debug, Clone, PartialEq)]
pub enum ProbeError {
    /// None of the candidate buildkitd sockets exist
    BuildkitNotFound {
        namespace: String,
        tried: Vec<PathBuf>,
    },

    /// A target name did not match a known backend
    InvalidTarget { value: String },
}

impl ErrorCode for ProbeError {
    fn code(&self) -> i32 {
        match self {
            ProbeError::BuildkitNotFound { .. } => ProbeErrorCodes::BUILDKIT_NOT_FOUND,
            ProbeError::InvalidTarget { .. } => ProbeErrorCodes::INVALID_TARGET,
        }
    }

    fn message(&self) -> String {
        match self {
            ProbeError::BuildkitNotFound { namespace, tried } => {
                let tried = tried
                    .iter()
                    .map(|path| path.display().to_string())
                    .collect::<Vec<_>>()
                    .join(", ");
                format!(
                    "no buildkit host is available for namespace {}, tried [{}]",
                    namespace, tried
                )
            }
            ProbeError::InvalidTarget { value } => {
                format!("unknown target {:?} (expected nerdctl or docker)", value)
            }
        }
    }
}

impl fmt::Display for ProbeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ProbeError (code {}): {}", self.code(), self.message())
    }
}

impl std::error::Error for ProbeError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_buildkit_message_lists_candidates() {
        let err = ProbeError::BuildkitNotFound {
            namespace: "nerdctl-test".to_string(),
            tried: vec![
                PathBuf::from("/run/buildkit-nerdctl-test/buildkitd.sock"),
                PathBuf::from("/run/buildkit/buildkitd.sock"),
            ],
        };
        assert_eq!(err.code(), ProbeErrorCodes::BUILDKIT_NOT_FOUND);
        let message = err.message();
        assert!(message.contains("nerdctl-test"));
        assert!(message.contains("/run/buildkit/buildkitd.sock"));
    }

    #[test]
    fn test_invalid_target_message() {
        let err = ProbeError::InvalidTarget {
            value: "podman".to_string(),
        };
        assert!(err.message().contains("podman"));
        assert!(format!("{err}").contains("code 5002"));
    }
}
