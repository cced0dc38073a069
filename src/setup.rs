//! Fixture setup: turns a test's configuration store into a ready command.
//!
//! [`NerdctlSetup`] is the [`CommandFactory`] the lifecycle calls before each
//! test body. It decides whether the case must be skipped because of its IPv6
//! tagging, resolves which namespace the case lives in, materializes a custom
//! `nerdctl.toml`, assembles the backend command and, when the case created its
//! own namespace, arranges for that namespace to be removed.

use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use crate::command::{BackendCommand, CommandRunner, Target};
use crate::config;
use crate::environment::{Base, Environment};
use crate::error::SetupError;
use crate::harness::{CommandFactory, SetupOutcome, TestCase};
use crate::store::{IpFamilyMode, Mode};

/// File name of the per-test client configuration.
pub const NERDCTL_TOML_FILE: &str = "nerdctl.toml";

/// Reason given when a non-IPv6 test meets an IPv6 runner.
pub const IPV6_EXCLUSION_REASON: &str =
    "runner skips non-IPv6 compatible tests in the IPv6 environment";

/// Which namespace a case runs in, and who owns it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Isolation {
    /// Private namespace created for this case; this case removes it.
    Fresh(String),
    /// Private namespace created by an ancestor; left alone.
    Inherited(String),
    /// Not private. `None` means the ambient namespace.
    Shared(Option<String>),
}

impl Isolation {
    /// Explicit namespace, if any.
    pub fn namespace(&self) -> Option<&str> {
        match self {
            Isolation::Fresh(ns) | Isolation::Inherited(ns) => Some(ns),
            Isolation::Shared(ns) => ns.as_deref(),
        }
    }
}

/// Best-effort removal of a namespace created by a test.
#[derive(Debug, Clone)]
pub struct NamespaceCleanup {
    command: BackendCommand,
    namespace: String,
}

impl NamespaceCleanup {
    pub fn new(command: &BackendCommand, namespace: impl Into<String>) -> Self {
        Self {
            command: command.clone(),
            namespace: namespace.into(),
        }
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Run `namespace remove <ns>` on a copy of the command. The outcome is
    /// ignored: the namespace may not exist yet.
    pub fn run(&self) {
        let mut command = self.command.clone();
        command.with_args(["namespace", "remove", self.namespace.as_str()]);
        let output = command.run(None);
        tracing::debug!(
            namespace = %self.namespace,
            exit_code = output.exit_code,
            "namespace cleanup"
        );
    }
}

/// Default fixture setup for the backend suite.
pub struct NerdctlSetup {
    environment: Arc<dyn Environment>,
    runner: Arc<dyn CommandRunner>,
}

impl NerdctlSetup {
    pub fn new(environment: Arc<dyn Environment>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            environment,
            runner,
        }
    }

    /// Setup bound to the process-wide [`config::suite`].
    pub fn from_suite(runner: Arc<dyn CommandRunner>) -> Self {
        Self::new(Arc::new(config::suite().clone()), runner)
    }

    /// Decide the case's namespace, provisioning a fresh one when asked for
    /// privacy without an inherited namespace.
    pub fn resolve_isolation(&self, case: &mut TestCase) -> Isolation {
        let namespace = case.config().namespace().map(str::to_string);
        if case.config().mode() != Mode::Private {
            return Isolation::Shared(namespace);
        }
        if let Some(namespace) = namespace {
            return Isolation::Inherited(namespace);
        }

        let namespace = case.data.identifier().to_string();
        let temp_dir = case.data.temp_dir().to_path_buf();
        case.config_mut()
            .set_namespace(namespace.clone())
            .set_hosts_dir(&temp_dir)
            .set_data_root(&temp_dir);
        case.env
            .insert("DOCKER_CONFIG".to_string(), temp_dir.display().to_string());
        case.env.insert(
            "NERDCTL_TOML".to_string(),
            temp_dir.join(NERDCTL_TOML_FILE).display().to_string(),
        );
        if self.environment.target() == Target::Docker {
            case.no_parallel = true;
        }
        Isolation::Fresh(namespace)
    }

    fn write_custom_config(&self, case: &mut TestCase) -> Result<(), SetupError> {
        if !self.environment.target().is_native() {
            return Ok(());
        }
        let Some(contents) = case.config().nerdctl_toml().map(str::to_string) else {
            return Ok(());
        };

        let path = case.data.temp_dir().join(NERDCTL_TOML_FILE);
        write_read_only(&path, contents.as_bytes()).map_err(|err| SetupError::ConfigWrite {
            path: path.clone(),
            reason: err.to_string(),
        })?;
        tracing::debug!(path = %path.display(), "wrote custom nerdctl.toml");
        case.env
            .insert("NERDCTL_TOML".to_string(), path.display().to_string());
        Ok(())
    }

    fn assemble(&self, case: &TestCase, isolation: &Isolation) -> BackendCommand {
        let env = self.environment.as_ref();
        let base = match isolation.namespace() {
            Some(namespace) => Base::with_namespace(env, namespace),
            None => Base::new(env),
        };

        let mut command = BackendCommand::new(base.target, base.binary, self.runner.clone());
        command
            .with_args(base.args)
            .with_env(case.env.clone())
            .with_temp_dir(case.data.temp_dir());

        if base.target.is_native() {
            if let Some(dir) = case.config().hosts_dir() {
                command.with_args([format!("--hosts-dir={}", dir.display())]);
            }
            if let Some(dir) = case.config().data_root() {
                command.with_args([format!("--data-root={}", dir.display())]);
            }
        }
        command
    }
}

impl CommandFactory for NerdctlSetup {
    fn setup(&self, case: &mut TestCase) -> Result<SetupOutcome, SetupError> {
        if case.config().ip_family() != IpFamilyMode::Only && self.environment.ipv6_enabled() {
            return Ok(SetupOutcome::Skipped {
                reason: IPV6_EXCLUSION_REASON.to_string(),
            });
        }

        let isolation = self.resolve_isolation(case);
        tracing::debug!(case = %case.name, ?isolation, "resolved isolation");

        self.write_custom_config(case)?;
        let command = self.assemble(case, &isolation);

        if let (Target::Nerdctl, Isolation::Fresh(namespace)) = (command.target(), &isolation) {
            let cleanup = NamespaceCleanup::new(&command, namespace.as_str());
            // Leftovers from an interrupted earlier run.
            cleanup.run();
            case.register_cleanup(Box::new(move || cleanup.run()));
        }

        Ok(SetupOutcome::Ready(command))
    }
}

cfg_if::cfg_if! {
    if #[cfg(unix)] {
        fn write_read_only(path: &Path, contents: &[u8]) -> std::io::Result<()> {
            use std::os::unix::fs::OpenOptionsExt;

            let mut file = fs::OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .mode(0o400)
                .open(path)?;
            file.write_all(contents)
        }
    } else {
        fn write_read_only(path: &Path, contents: &[u8]) -> std::io::Result<()> {
            let mut file = fs::File::create(path)?;
            file.write_all(contents)?;
            let mut permissions = file.metadata()?.permissions();
            permissions.set_readonly(true);
            fs::set_permissions(path, permissions)
        }
    }
}
