// Error types for the fixture engine
//
// This module defines the error families raised while building test fixtures,
// decoding inspect output and probing the ambient environment. Each family
// carries stable numeric codes so harness logs can be grepped reliably.

mod inspect;
mod probe;
mod setup;

pub use inspect::{log_inspect_error, InspectError, InspectErrorCodes};
pub use probe::{log_probe_error, ProbeError, ProbeErrorCodes};
pub use setup::{log_setup_error, SetupError, SetupErrorCodes};

/// Error codes for structured error reporting
///
/// This trait provides a standard way to get error codes and messages
/// from custom error types, enabling consistent reporting in skip and
/// failure diagnostics.
pub trait ErrorCode {
    /// Get the numeric error code
    fn code(&self) -> i32;

    /// Get the human-readable error message
    fn message(&self) -> String;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_error_code_trait() {
        let setup_err: &dyn ErrorCode = &SetupError::ConfigWrite {
            path: PathBuf::from("/tmp/nerdctl.toml"),
            reason: "denied".to_string(),
        };
        assert_eq!(setup_err.code(), 3001);

        let inspect_err: &dyn ErrorCode = &InspectError::Cardinality {
            found: 2,
            info: String::new(),
        };
        assert_eq!(inspect_err.code(), 4003);

        let probe_err: &dyn ErrorCode = &ProbeError::InvalidTarget {
            value: "podman".to_string(),
        };
        assert_eq!(probe_err.code(), 5002);
    }

    #[test]
    fn test_error_propagation() {
        fn may_fail() -> Result<(), SetupError> {
            Err(SetupError::TempDir {
                reason: "disk full".to_string(),
            })
        }

        fn caller() -> Result<(), SetupError> {
            may_fail()?;
            Ok(())
        }

        assert!(caller().is_err());
    }
}
