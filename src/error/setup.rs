// Fixture setup error types and constants

use crate::error::ErrorCode;
use log::error;
use std::fmt;
use std::path::PathBuf;

/// Setup error code constants
///
/// Error code range: 3001-3003
pub struct SetupErrorCodes {}

impl SetupErrorCodes {
    /// Custom nerdctl.toml could not be written into the test temp dir
    pub const CONFIG_WRITE: i32 = 3001;

    /// Temp directory for the test case could not be provisioned
    pub const TEMP_DIR: i32 = 3002;

    /// Test name leaves nothing usable as a namespace identifier
    pub const INVALID_NAME: i32 = 3003;
}

/// Log a setup error with structured context
///
/// The logging is non-blocking and will not panic on failure.
pub fn log_setup_error(err: &SetupError, context: &str) {
    error!(
        "Setup error in {}: code={}, component=FixtureSetup, message={}",
        context,
        err.code(),
        err.message()
    );
}

/// Errors that abort fixture setup for a single test
///
/// These are fatal to the test being prepared (it fails, it is not skipped)
/// but never to the rest of the run.
///
/// Error code range: 3001-3003
#[derive(Debug, Clone, PartialEq)]
pub enum SetupError {
    /// Writing the custom client config file failed
    ConfigWrite { path: PathBuf, reason: String },

    /// Temp directory provisioning failed
    TempDir { reason: String },

    /// Test name has no characters usable in an identifier
    InvalidName { name: String },
}

impl ErrorCode for SetupError {
    fn code(&self) -> i32 {
        match self {
            SetupError::ConfigWrite { .. } => SetupErrorCodes::CONFIG_WRITE,
            SetupError::TempDir { .. } => SetupErrorCodes::TEMP_DIR,
            SetupError::InvalidName { .. } => SetupErrorCodes::INVALID_NAME,
        }
    }

    fn message(&self) -> String {
        match self {
            SetupError::ConfigWrite { path, reason } => {
                format!(
                    "failed to write custom nerdctl toml file for test at {}: {}",
                    path.display(),
                    reason
                )
            }
            SetupError::TempDir { reason } => {
                format!("failed to provision test temp directory: {}", reason)
            }
            SetupError::InvalidName { name } => {
                format!("test name {:?} yields an empty identifier", name)
            }
        }
    }
}

impl fmt::Display for SetupError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SetupError::{:?} (code {}): {}",
            self,
            self.code(),
            self.message()
        )
    }
}

impl std::error::Error for SetupError {}
