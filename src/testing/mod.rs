//! Test doubles for the execution seam.
//!
//! [`RecordingRunner`] stands in for the framework's process runner: it records
//! every invocation together with the expectation it received, replays queued
//! outputs in FIFO order and feeds stdout to any output check.

use std::collections::VecDeque;
use std::sync::Mutex;

use crate::command::{CommandOutput, CommandRunner, Expected, Invocation};

/// One recorded call to [`CommandRunner::run`].
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub invocation: Invocation,
    pub expected: Option<Expected>,
}

impl RecordedCall {
    /// True when the invocation's args end with `suffix`.
    pub fn ends_with(&self, suffix: &[&str]) -> bool {
        let args = &self.invocation.args;
        args.len() >= suffix.len()
            && args[args.len() - suffix.len()..]
                .iter()
                .zip(suffix)
                .all(|(arg, want)| arg == want)
    }
}

/// Runner that never spawns anything.
#[derive(Debug, Default)]
pub struct RecordingRunner {
    calls: Mutex<Vec<RecordedCall>>,
    outputs: Mutex<VecDeque<CommandOutput>>,
}

impl RecordingRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the output returned by the next unanswered run.
    pub fn push_output(&self, output: CommandOutput) {
        self.outputs
            .lock()
            .expect("outputs poisoned")
            .push_back(output);
    }

    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().expect("calls poisoned").clone()
    }

    /// Calls whose args end with `suffix`.
    pub fn calls_ending_with(&self, suffix: &[&str]) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|call| call.ends_with(suffix))
            .collect()
    }
}

impl CommandRunner for RecordingRunner {
    fn run(&self, invocation: &Invocation, expected: Option<&Expected>) -> CommandOutput {
        self.calls
            .lock()
            .expect("calls poisoned")
            .push(RecordedCall {
                invocation: invocation.clone(),
                expected: expected.cloned(),
            });

        let output = self
            .outputs
            .lock()
            .expect("outputs poisoned")
            .pop_front()
            .unwrap_or_default();

        if let Some(check) = expected.and_then(|expected| expected.output.as_ref()) {
            let info = format!(
                "command: {}\nstdout: {}\nstderr: {}",
                invocation.command_line(),
                output.stdout,
                output.stderr
            );
            check(&output.stdout, &info);
        }

        output
    }
}
