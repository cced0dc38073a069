//! Inspection helpers
//!
//! Run an `inspect` sub-command through the test's helpers and decode the
//! single record it must print. The plain helpers fail the current test
//! (panic) on any mismatch, carrying the command line and raw output in the
//! message; [`try_inspect`] returns an [`InspectError`] instead.

mod types;

pub use types::{
    Container, ContainerConfig, ContainerState, EndpointSettings, Ipam, IpamConfig, MountPoint,
    Network, NetworkSettings, Volume,
};

use serde::de::DeserializeOwned;

use crate::command::{CommandOutput, Expected};
use crate::error::{log_inspect_error, InspectError};
use crate::harness::Helpers;

/// `container inspect <name>`.
pub fn inspect_container(helpers: &Helpers, name: &str) -> Container {
    or_fail("inspect_container", try_inspect(helpers, &["container", "inspect", name]))
}

/// `volume inspect <args..> <name>`.
pub fn inspect_volume(helpers: &Helpers, name: &str, args: &[&str]) -> Volume {
    or_fail(
        "inspect_volume",
        try_inspect(helpers, &inspect_args("volume", name, args)),
    )
}

/// `network inspect <args..> <name>`.
pub fn inspect_network(helpers: &Helpers, name: &str, args: &[&str]) -> Network {
    or_fail(
        "inspect_network",
        try_inspect(helpers, &inspect_args("network", name, args)),
    )
}

/// Run `args` expecting exit code 0 and decode exactly one `T` from stdout.
pub fn try_inspect<T: DeserializeOwned>(helpers: &Helpers, args: &[&str]) -> Result<T, InspectError> {
    let command = helpers.command(args.iter().copied());
    let output = command.run(Some(Expected::exit_code(0)));
    decode_single(&command.invocation().command_line(), &output)
}

/// Decode a JSON array holding exactly one record.
pub fn decode_single<T: DeserializeOwned>(
    command_line: &str,
    output: &CommandOutput,
) -> Result<T, InspectError> {
    let info = describe(command_line, output);
    if output.exit_code != 0 {
        return Err(InspectError::ExitCode {
            code: output.exit_code,
            info,
        });
    }

    // `null` is an empty result set, not malformed output
    let records: Vec<T> = serde_json::from_str::<Option<Vec<T>>>(&output.stdout)
        .map_err(|err| InspectError::Decode {
            reason: err.to_string(),
            info: info.clone(),
        })?
        .unwrap_or_default();

    let found = records.len();
    let mut records = records.into_iter();
    match (records.next(), found) {
        (Some(record), 1) => Ok(record),
        _ => Err(InspectError::Cardinality { found, info }),
    }
}

fn inspect_args<'a>(kind: &'a str, name: &'a str, args: &[&'a str]) -> Vec<&'a str> {
    let mut all = Vec::with_capacity(args.len() + 3);
    all.push(kind);
    all.push("inspect");
    all.extend_from_slice(args);
    all.push(name);
    all
}

fn describe(command_line: &str, output: &CommandOutput) -> String {
    format!(
        "command: {}\nexit code: {}\nstdout:\n{}\nstderr:\n{}",
        command_line, output.exit_code, output.stdout, output.stderr
    )
}

fn or_fail<T>(context: &str, result: Result<T, InspectError>) -> T {
    match result {
        Ok(record) => record,
        Err(err) => {
            log_inspect_error(&err, context);
            panic!("{err}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;

    use crate::command::{BackendCommand, Target};
    use crate::error::ErrorCode;
    use crate::testing::RecordingRunner;

    fn helpers(runner: &Arc<RecordingRunner>) -> Helpers {
        let mut base = BackendCommand::new(Target::Nerdctl, "nerdctl", runner.clone());
        base.with_args(["--namespace=nerdctl-test"]);
        Helpers::new(base)
    }

    fn queue_json(runner: &RecordingRunner, value: serde_json::Value) {
        runner.push_output(CommandOutput::success(value.to_string()));
    }

    #[test]
    fn container_is_decoded() {
        let runner = Arc::new(RecordingRunner::new());
        queue_json(
            &runner,
            json!([{
                "Id": "abc123",
                "Name": "web",
                "State": {"Status": "running", "Running": true, "Pid": 42},
                "Mounts": [{"Type": "volume", "Name": "data", "Destination": "/data", "RW": true}],
                "Config": {"Labels": {"tier": "front"}, "Cmd": null},
                "NetworkSettings": {
                    "IPAddress": "10.4.0.2",
                    "Networks": {"bridge": {"IPAddress": "10.4.0.2", "IPPrefixLen": 24}}
                },
                "SomethingNew": 1
            }]),
        );

        let container = inspect_container(&helpers(&runner), "web");

        assert_eq!(container.id, "abc123");
        assert!(container.state.running);
        assert_eq!(container.state.pid, 42);
        assert_eq!(container.mounts[0].kind, "volume");
        assert!(container.mounts[0].rw);
        assert_eq!(container.config.labels["tier"], "front");
        assert!(container.config.cmd.is_empty());
        assert_eq!(container.network_settings.networks["bridge"].ip_prefix_len, 24);

        let call = &runner.calls()[0];
        assert_eq!(
            call.invocation.args,
            ["--namespace=nerdctl-test", "container", "inspect", "web"]
        );
        assert_eq!(call.expected.as_ref().unwrap().exit_code, 0);
    }

    #[test]
    fn volume_args_go_before_the_name() {
        let runner = Arc::new(RecordingRunner::new());
        queue_json(
            &runner,
            json!([{"Name": "data", "Mountpoint": "/var/lib/x", "Labels": null, "Size": 4096}]),
        );

        let volume = inspect_volume(&helpers(&runner), "data", &["--size"]);

        assert_eq!(volume.size, 4096);
        assert!(volume.labels.is_empty());
        assert!(runner.calls()[0].ends_with(&["volume", "inspect", "--size", "data"]));
    }

    #[test]
    fn network_is_decoded() {
        let runner = Arc::new(RecordingRunner::new());
        queue_json(
            &runner,
            json!([{
                "Name": "testnet",
                "Id": "f00",
                "IPAM": {"Config": [{"Subnet": "10.5.0.0/24", "Gateway": "10.5.0.1"}]},
                "Labels": {"a": "b"}
            }]),
        );

        let network = inspect_network(&helpers(&runner), "testnet", &[]);

        assert_eq!(network.id, "f00");
        assert_eq!(network.ipam.config[0].subnet, "10.5.0.0/24");
        assert_eq!(network.labels["a"], "b");
        assert!(runner.calls()[0].ends_with(&["network", "inspect", "testnet"]));
    }

    #[test]
    fn empty_result_set_is_a_cardinality_error() {
        let runner = Arc::new(RecordingRunner::new());
        queue_json(&runner, json!([]));

        let err = try_inspect::<Volume>(&helpers(&runner), &["volume", "inspect", "gone"])
            .unwrap_err();
        assert!(matches!(err, InspectError::Cardinality { found: 0, .. }));
        assert_eq!(err.code(), 4003);
    }

    #[test]
    fn null_result_set_is_a_cardinality_error() {
        let runner = Arc::new(RecordingRunner::new());
        runner.push_output(CommandOutput::success("null"));

        let err = try_inspect::<Network>(&helpers(&runner), &["network", "inspect", "gone"])
            .unwrap_err();
        assert!(matches!(err, InspectError::Cardinality { found: 0, .. }));
    }

    #[test]
    fn multiple_results_are_a_cardinality_error() {
        let runner = Arc::new(RecordingRunner::new());
        queue_json(&runner, json!([{"Name": "a"}, {"Name": "b"}]));

        let err = try_inspect::<Volume>(&helpers(&runner), &["volume", "inspect", "a", "b"])
            .unwrap_err();
        assert!(matches!(err, InspectError::Cardinality { found: 2, .. }));
        assert!(err.info().contains("nerdctl --namespace=nerdctl-test volume inspect a b"));
    }

    #[test]
    fn malformed_output_is_a_decode_error() {
        let runner = Arc::new(RecordingRunner::new());
        runner.push_output(CommandOutput::success("not json"));

        let err = try_inspect::<Network>(&helpers(&runner), &["network", "inspect", "n"])
            .unwrap_err();
        assert!(matches!(err, InspectError::Decode { .. }));
        assert!(err.info().contains("not json"));
    }

    #[test]
    fn non_zero_exit_is_reported() {
        let runner = Arc::new(RecordingRunner::new());
        runner.push_output(CommandOutput::failure(1, "no such object"));

        let err = try_inspect::<Container>(&helpers(&runner), &["container", "inspect", "x"])
            .unwrap_err();
        assert_eq!(
            err,
            InspectError::ExitCode {
                code: 1,
                info: err.info().to_string()
            }
        );
        assert!(err.info().contains("no such object"));
    }

    #[test]
    #[should_panic(expected = "Expected exactly one result, got 0")]
    fn helper_fails_the_test_on_empty_output() {
        let runner = Arc::new(RecordingRunner::new());
        queue_json(&runner, json!([]));
        inspect_container(&helpers(&runner), "missing");
    }

    #[test]
    #[should_panic(expected = "stdout:\nnope")]
    fn helper_failure_carries_raw_output() {
        let runner = Arc::new(RecordingRunner::new());
        runner.push_output(CommandOutput::success("nope"));
        inspect_network(&helpers(&runner), "x", &[]);
    }
}
