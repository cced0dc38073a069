//! Ambient environment probes and the per-target base invocation.

use std::path::PathBuf;

use crate::command::Target;
use crate::error::ProbeError;

/// Namespace used by tests that do not ask for isolation.
pub const DEFAULT_NAMESPACE: &str = "nerdctl-test";

/// Facts about the machine the suite runs on.
pub trait Environment: Send + Sync {
    /// Backend under test.
    fn target(&self) -> Target;

    fn ipv6_enabled(&self) -> bool;

    /// True when running unprivileged.
    fn rootless(&self) -> bool;

    /// Ambient namespace for non-private tests.
    fn namespace(&self) -> &str;

    /// Binary implementing `target`.
    fn binary(&self, target: Target) -> PathBuf;

    /// Address of a buildkitd serving `namespace`.
    fn buildkit_host(&self, namespace: &str) -> Result<String, ProbeError>;
}

/// Binary and leading arguments every command of a test starts with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Base {
    pub target: Target,
    pub binary: PathBuf,
    pub args: Vec<String>,
}

impl Base {
    /// Base bound to the ambient namespace.
    pub fn new(env: &dyn Environment) -> Self {
        Self::with_namespace(env, env.namespace())
    }

    /// Base bound to `namespace`. Docker has no namespaces, so it gets no
    /// leading arguments.
    pub fn with_namespace(env: &dyn Environment, namespace: &str) -> Self {
        let target = env.target();
        let args = match target {
            Target::Nerdctl => vec![format!("--namespace={namespace}")],
            Target::Docker => Vec::new(),
        };
        Self {
            target,
            binary: env.binary(target),
            args,
        }
    }
}
