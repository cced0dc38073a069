//! Minimal test lifecycle the fixture engine plugs into.
//!
//! The surrounding framework owns scheduling and reporting; this module only
//! models what fixture setup needs from it: a per-test identifier and temp
//! directory, an environment map, the configuration store, a parallelism flag,
//! and cleanup registration. [`run_case`] strings the phases together:
//! requirements, then the registered [`CommandFactory`], then the body, then
//! teardown.

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

use tempfile::TempDir;

use crate::command::{BackendCommand, CommandOutput, Expected};
use crate::environment::Environment;
use crate::error::{log_setup_error, SetupError};
use crate::requirement::{GateDecision, RequirementSet};
use crate::store::ConfigStore;

/// Deferred teardown action.
pub type Cleanup = Box<dyn FnOnce() + Send>;

/// Per-test data context.
pub struct TestData {
    identifier: String,
    temp_dir: TempDir,
    config: ConfigStore,
}

impl TestData {
    fn provision(identifier: String, config: ConfigStore) -> Result<Self, SetupError> {
        let temp_dir = tempfile::Builder::new()
            .prefix(&format!("{identifier}-"))
            .tempdir()
            .map_err(|err| SetupError::TempDir {
                reason: err.to_string(),
            })?;
        Ok(Self {
            identifier,
            temp_dir,
            config,
        })
    }

    /// Unique, namespace-safe identifier for this test.
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn temp_dir(&self) -> &Path {
        self.temp_dir.path()
    }

    pub fn config(&self) -> &ConfigStore {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut ConfigStore {
        &mut self.config
    }
}

/// One test case as seen by fixture setup.
pub struct TestCase {
    pub name: String,
    pub data: TestData,
    /// Environment for every command the test runs.
    pub env: BTreeMap<String, String>,
    /// Set when the test must not run concurrently with others.
    pub no_parallel: bool,
    cleanups: Vec<Cleanup>,
}

impl TestCase {
    pub fn new(name: &str) -> Result<Self, SetupError> {
        Ok(Self {
            name: name.to_string(),
            data: TestData::provision(identifier_for(name)?, ConfigStore::new())?,
            env: BTreeMap::new(),
            no_parallel: false,
            cleanups: Vec::new(),
        })
    }

    /// Nested case: inherits the parent's configuration and environment,
    /// gets its own identifier and temp directory.
    pub fn child(&self, name: &str) -> Result<Self, SetupError> {
        let identifier = format!("{}-{}", self.data.identifier, identifier_for(name)?);
        Ok(Self {
            name: format!("{}/{}", self.name, name),
            data: TestData::provision(identifier, self.data.config.inherit())?,
            env: self.env.clone(),
            no_parallel: false,
            cleanups: Vec::new(),
        })
    }

    pub fn config(&self) -> &ConfigStore {
        self.data.config()
    }

    pub fn config_mut(&mut self) -> &mut ConfigStore {
        self.data.config_mut()
    }

    pub fn register_cleanup(&mut self, cleanup: Cleanup) {
        self.cleanups.push(cleanup);
    }

    pub fn cleanup_count(&self) -> usize {
        self.cleanups.len()
    }

    /// Run registered cleanups, last registered first. Idempotent.
    pub fn teardown(&mut self) {
        while let Some(cleanup) = self.cleanups.pop() {
            cleanup();
        }
    }
}

impl Drop for TestCase {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for TestCase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestCase")
            .field("name", &self.name)
            .field("identifier", &self.data.identifier)
            .field("config", &self.data.config)
            .field("env", &self.env)
            .field("no_parallel", &self.no_parallel)
            .field("cleanups", &self.cleanups.len())
            .finish()
    }
}

/// Result of fixture setup.
#[derive(Debug)]
pub enum SetupOutcome {
    Ready(BackendCommand),
    Skipped { reason: String },
}

/// Custom command factory installed into the lifecycle.
pub trait CommandFactory: Send + Sync {
    /// Build the command for `case`, registering any cleanup on it.
    fn setup(&self, case: &mut TestCase) -> Result<SetupOutcome, SetupError>;
}

/// Command builders handed to a test body.
#[derive(Debug, Clone)]
pub struct Helpers {
    base: BackendCommand,
}

impl Helpers {
    pub fn new(base: BackendCommand) -> Self {
        Self { base }
    }

    pub fn base(&self) -> &BackendCommand {
        &self.base
    }

    /// Fresh copy of the base command with `args` appended.
    pub fn command<I, S>(&self, args: I) -> BackendCommand
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut command = self.base.clone();
        command.with_args(args);
        command
    }

    /// Run `args` expecting success.
    pub fn ensure<I, S>(&self, args: I) -> CommandOutput
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.command(args).run(Some(Expected::exit_code(0)))
    }
}

/// How a case ended, when it did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CaseResult {
    Passed,
    Skipped { reason: String },
}

/// Gate, set up, run and tear down one case.
///
/// The body receives the case itself, so nested cases built with
/// [`TestCase::child`] run and finish before this case's cleanups. Setup
/// errors are returned after teardown so the caller can fail the test.
pub fn run_case<F>(
    case: &mut TestCase,
    env: &dyn Environment,
    requirements: &RequirementSet,
    factory: &dyn CommandFactory,
    body: F,
) -> Result<CaseResult, SetupError>
where
    F: FnOnce(&mut TestCase, &Helpers),
{
    if let GateDecision::Skip {
        requirement,
        reason,
    } = requirements.evaluate(env, case.config_mut())
    {
        tracing::info!(case = %case.name, %requirement, %reason, "skipping");
        return Ok(CaseResult::Skipped { reason });
    }

    let command = match factory.setup(case) {
        Ok(SetupOutcome::Ready(command)) => command,
        Ok(SetupOutcome::Skipped { reason }) => {
            tracing::info!(case = %case.name, %reason, "skipping");
            case.teardown();
            return Ok(CaseResult::Skipped { reason });
        }
        Err(err) => {
            log_setup_error(&err, &case.name);
            case.teardown();
            return Err(err);
        }
    };

    let helpers = Helpers::new(command);
    body(case, &helpers);
    case.teardown();
    Ok(CaseResult::Passed)
}

/// Namespace-safe identifier for `name`; names with nothing left after
/// sanitizing are rejected.
fn identifier_for(name: &str) -> Result<String, SetupError> {
    let identifier = sanitize_identifier(name);
    if identifier.is_empty() {
        return Err(SetupError::InvalidName {
            name: name.to_string(),
        });
    }
    Ok(identifier)
}

/// Lower-case, with every run of characters outside `[a-z0-9]` collapsed to `-`.
pub fn sanitize_identifier(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for ch in name.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_alphanumeric() {
            out.push(ch);
        } else if !out.is_empty() && !out.ends_with('-') {
            out.push('-');
        }
    }
    while out.ends_with('-') {
        out.pop();
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use crate::command::Target;
    use crate::config::SuiteConfig;
    use crate::requirement;
    use crate::store::Mode;
    use crate::testing::RecordingRunner;

    struct StaticFactory {
        runner: Arc<RecordingRunner>,
        skip: Option<String>,
    }

    impl CommandFactory for StaticFactory {
        fn setup(&self, _case: &mut TestCase) -> Result<SetupOutcome, SetupError> {
            if let Some(reason) = &self.skip {
                return Ok(SetupOutcome::Skipped {
                    reason: reason.clone(),
                });
            }
            Ok(SetupOutcome::Ready(BackendCommand::new(
                Target::Nerdctl,
                "nerdctl",
                self.runner.clone(),
            )))
        }
    }

    struct CleanupFactory {
        runner: Arc<RecordingRunner>,
        order: Arc<Mutex<Vec<String>>>,
    }

    impl CommandFactory for CleanupFactory {
        fn setup(&self, case: &mut TestCase) -> Result<SetupOutcome, SetupError> {
            let order = self.order.clone();
            let label = format!("cleanup {}", case.data.identifier());
            case.register_cleanup(Box::new(move || order.lock().unwrap().push(label)));
            Ok(SetupOutcome::Ready(BackendCommand::new(
                Target::Nerdctl,
                "nerdctl",
                self.runner.clone(),
            )))
        }
    }

    #[test]
    fn identifiers_are_sanitized() {
        assert_eq!(sanitize_identifier("TestRun/With Spaces"), "testrun-with-spaces");
        assert_eq!(sanitize_identifier("--a__b--"), "a-b");
    }

    #[test]
    fn child_inherits_config_and_env() {
        let mut parent = TestCase::new("TestParent").unwrap();
        parent.config_mut().set_mode(Mode::Private).set_namespace("testparent");
        parent.env.insert("DOCKER_CONFIG".into(), "/tmp/x".into());

        let mut child = parent.child("Sub Test").unwrap();
        assert_eq!(child.data.identifier(), "testparent-sub-test");
        assert_eq!(child.name, "TestParent/Sub Test");
        assert_eq!(child.config().namespace(), Some("testparent"));
        assert_eq!(child.env["DOCKER_CONFIG"], "/tmp/x");
        assert_ne!(child.data.temp_dir(), parent.data.temp_dir());

        child.config_mut().set_namespace("other");
        assert_eq!(parent.config().namespace(), Some("testparent"));
    }

    #[test]
    fn names_without_identifier_characters_are_rejected() {
        for name in ["???", "/", ""] {
            match TestCase::new(name) {
                Err(SetupError::InvalidName { name: rejected }) => assert_eq!(rejected, name),
                other => panic!("expected InvalidName for {name:?}, got {other:?}"),
            }
        }

        let parent = TestCase::new("TestParent").unwrap();
        assert!(matches!(
            parent.child("--"),
            Err(SetupError::InvalidName { .. })
        ));
    }

    #[test]
    fn nested_cases_finish_before_parent_cleanup() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let factory = CleanupFactory {
            runner: Arc::new(RecordingRunner::new()),
            order: order.clone(),
        };
        let env = SuiteConfig::default();
        let mut parent = TestCase::new("TestOuter").unwrap();

        let result = run_case(
            &mut parent,
            &env,
            &RequirementSet::new(),
            &factory,
            |case, _| {
                let mut child = case.child("inner").unwrap();
                let inner = run_case(
                    &mut child,
                    &env,
                    &RequirementSet::new(),
                    &factory,
                    |case, _| order.lock().unwrap().push(format!("body {}", case.name)),
                )
                .unwrap();
                assert_eq!(inner, CaseResult::Passed);
            },
        )
        .unwrap();

        assert_eq!(result, CaseResult::Passed);
        assert_eq!(
            *order.lock().unwrap(),
            vec![
                "body TestOuter/inner".to_string(),
                "cleanup testouter-inner".to_string(),
                "cleanup testouter".to_string(),
            ]
        );
    }

    #[test]
    fn teardown_runs_cleanups_in_reverse_once() {
        let order = Arc::new(Mutex::new(Vec::new()));
        let mut case = TestCase::new("cleanup-order").unwrap();
        for idx in 0..3 {
            let order = order.clone();
            case.register_cleanup(Box::new(move || order.lock().unwrap().push(idx)));
        }
        assert_eq!(case.cleanup_count(), 3);

        case.teardown();
        case.teardown();
        assert_eq!(*order.lock().unwrap(), vec![2, 1, 0]);
    }

    #[test]
    fn dropping_a_case_runs_cleanups() {
        let ran = Arc::new(Mutex::new(false));
        {
            let mut case = TestCase::new("drop-cleanup").unwrap();
            let ran = ran.clone();
            case.register_cleanup(Box::new(move || *ran.lock().unwrap() = true));
        }
        assert!(*ran.lock().unwrap());
    }

    #[test]
    fn run_case_skips_on_failed_requirement_without_setup() {
        let runner = Arc::new(RecordingRunner::new());
        let factory = StaticFactory {
            runner: runner.clone(),
            skip: None,
        };
        let mut case = TestCase::new("needs-docker").unwrap();
        let requirements = RequirementSet::new().with(requirement::docker());

        let mut body_ran = false;
        let result = run_case(
            &mut case,
            &SuiteConfig::default(),
            &requirements,
            &factory,
            |_, _| body_ran = true,
        )
        .unwrap();

        assert_eq!(
            result,
            CaseResult::Skipped {
                reason: "current target is not docker".to_string()
            }
        );
        assert!(!body_ran);
        assert!(runner.calls().is_empty());
    }

    #[test]
    fn run_case_reports_setup_skip() {
        let factory = StaticFactory {
            runner: Arc::new(RecordingRunner::new()),
            skip: Some("not today".to_string()),
        };
        let mut case = TestCase::new("setup-skip").unwrap();
        let result = run_case(
            &mut case,
            &SuiteConfig::default(),
            &RequirementSet::new(),
            &factory,
            |_, _| panic!("body must not run"),
        )
        .unwrap();
        assert_eq!(
            result,
            CaseResult::Skipped {
                reason: "not today".to_string()
            }
        );
    }

    #[test]
    fn helpers_build_independent_commands() {
        let runner = Arc::new(RecordingRunner::new());
        let factory = StaticFactory {
            runner: runner.clone(),
            skip: None,
        };
        let mut case = TestCase::new("helpers").unwrap();

        let result = run_case(
            &mut case,
            &SuiteConfig::default(),
            &RequirementSet::new(),
            &factory,
            |_, helpers| {
                let ps = helpers.command(["ps", "-a"]);
                assert_eq!(ps.args(), ["ps", "-a"]);
                assert!(helpers.base().args().is_empty());
                helpers.ensure(["info"]);
            },
        )
        .unwrap();

        assert_eq!(result, CaseResult::Passed);
        let calls = runner.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].invocation.args, vec!["info".to_string()]);
        assert_eq!(calls[0].expected.as_ref().unwrap().exit_code, 0);
    }
}
