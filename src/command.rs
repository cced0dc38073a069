//! Backend-aware command objects.
//!
//! A [`BackendCommand`] is the generic executable invocation (binary, args,
//! env, temp dir) plus the [`Target`] it talks to. The two targets behave the
//! same except in one place: against docker, expected-error assertions are
//! dropped before the run, since the suite does not own docker's error wording.
//! Spawning and expectation comparison live behind [`CommandRunner`].

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::ProbeError;

/// Backend under test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    /// The native client.
    #[default]
    Nerdctl,
    /// The reference client it must stay compatible with.
    Docker,
}

impl Target {
    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Nerdctl => "nerdctl",
            Target::Docker => "docker",
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self, Target::Nerdctl)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Target {
    type Err = ProbeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "nerdctl" => Ok(Target::Nerdctl),
            "docker" => Ok(Target::Docker),
            _ => Err(ProbeError::InvalidTarget {
                value: value.to_string(),
            }),
        }
    }
}

/// Mutable state of a single executable invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    pub binary: PathBuf,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub temp_dir: Option<PathBuf>,
}

impl Invocation {
    /// `binary arg1 arg2 ...`, for diagnostics.
    pub fn command_line(&self) -> String {
        std::iter::once(self.binary.display().to_string())
            .chain(self.args.iter().cloned())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Callback handed raw stdout plus a diagnostics blob describing the run.
pub type OutputCheck = Arc<dyn Fn(&str, &str) + Send + Sync>;

/// What a run is expected to produce.
#[derive(Clone, Default)]
pub struct Expected {
    pub exit_code: i32,
    /// Substrings the runner must find on stderr.
    pub errors: Vec<String>,
    pub output: Option<OutputCheck>,
}

impl Expected {
    pub fn exit_code(exit_code: i32) -> Self {
        Self {
            exit_code,
            ..Self::default()
        }
    }

    pub fn with_errors<I, S>(mut self, errors: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.errors.extend(errors.into_iter().map(Into::into));
        self
    }

    pub fn with_output<F>(mut self, check: F) -> Self
    where
        F: Fn(&str, &str) + Send + Sync + 'static,
    {
        self.output = Some(Arc::new(check));
        self
    }
}

impl fmt::Debug for Expected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expected")
            .field("exit_code", &self.exit_code)
            .field("errors", &self.errors)
            .field("output", &self.output.as_ref().map(|_| "<check>"))
            .finish()
    }
}

/// Captured result of a run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(stdout: impl Into<String>) -> Self {
        Self {
            exit_code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failure(exit_code: i32, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

/// Execution primitive supplied by the surrounding test framework.
///
/// Implementations spawn the invocation, enforce `expected` when present
/// (failing the current test on mismatch) and return what was captured.
pub trait CommandRunner: Send + Sync {
    fn run(&self, invocation: &Invocation, expected: Option<&Expected>) -> CommandOutput;
}

/// Command bound to one backend.
///
/// `Clone` yields an independent copy of the argument list and environment
/// map; only the runner handle is shared. Cleanup code relies on this to
/// append arguments to a clone without touching the test's own command.
#[derive(Clone)]
pub struct BackendCommand {
    invocation: Invocation,
    target: Target,
    runner: Arc<dyn CommandRunner>,
}

impl BackendCommand {
    pub fn new(target: Target, binary: impl Into<PathBuf>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            invocation: Invocation {
                binary: binary.into(),
                ..Invocation::default()
            },
            target,
            runner,
        }
    }

    pub fn with_args<I, S>(&mut self, args: I) -> &mut Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.invocation
            .args
            .extend(args.into_iter().map(Into::into));
        self
    }

    pub fn with_env<I, K, V>(&mut self, env: I) -> &mut Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.invocation
            .env
            .extend(env.into_iter().map(|(k, v)| (k.into(), v.into())));
        self
    }

    pub fn with_temp_dir(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.invocation.temp_dir = Some(dir.into());
        self
    }

    pub fn target(&self) -> Target {
        self.target
    }

    pub fn invocation(&self) -> &Invocation {
        &self.invocation
    }

    pub fn binary(&self) -> &Path {
        &self.invocation.binary
    }

    pub fn args(&self) -> &[String] {
        &self.invocation.args
    }

    pub fn env(&self) -> &BTreeMap<String, String> {
        &self.invocation.env
    }

    /// Run through the framework runner.
    ///
    /// Against docker any expected errors are discarded first; exit code and
    /// output checks still apply.
    pub fn run(&self, expected: Option<Expected>) -> CommandOutput {
        let expected = expected.map(|mut expected| {
            if !self.target.is_native() && !expected.errors.is_empty() {
                tracing::debug!(
                    target = %self.target,
                    dropped = expected.errors.len(),
                    "ignoring expected errors for reference backend"
                );
                expected.errors.clear();
            }
            expected
        });

        tracing::debug!(command = %self.invocation.command_line(), "running");
        self.runner.run(&self.invocation, expected.as_ref())
    }
}

impl fmt::Debug for BackendCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendCommand")
            .field("target", &self.target)
            .field("invocation", &self.invocation)
            .finish()
    }
}
