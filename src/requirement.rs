//! Composable preconditions gating whether a test runs.
//!
//! A requirement has two separately callable parts: a pure `check` over the
//! environment and the test's [`ConfigStore`], and an optional `apply` that
//! records intent into the store for fixture setup to pick up later.
//! [`Requirement::evaluate`] runs both, and the store write happens whatever
//! the outcome. [`RequirementSet`] chains requirements with AND semantics and
//! stops at the first failure.

use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::command::Target;
use crate::environment::Environment;
use crate::store::{ConfigStore, IpFamilyMode, Mode};

/// Result of checking one requirement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RequirementOutcome {
    pub pass: bool,
    /// Skip diagnostic on failure, informational on success.
    pub message: String,
}

impl RequirementOutcome {
    pub fn pass(message: impl Into<String>) -> Self {
        Self {
            pass: true,
            message: message.into(),
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self {
            pass: false,
            message: message.into(),
        }
    }
}

type CheckFn = dyn Fn(&dyn Environment, &ConfigStore) -> RequirementOutcome + Send + Sync;
type ApplyFn = dyn Fn(&mut ConfigStore) + Send + Sync;

/// Named precondition with an optional configuration side effect.
#[derive(Clone)]
pub struct Requirement {
    name: String,
    check: Arc<CheckFn>,
    apply: Option<Arc<ApplyFn>>,
}

impl Requirement {
    pub fn new<F>(name: impl Into<String>, check: F) -> Self
    where
        F: Fn(&dyn Environment, &ConfigStore) -> RequirementOutcome + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            check: Arc::new(check),
            apply: None,
        }
    }

    /// Attach the store write performed on every evaluation.
    pub fn with_side_effect<F>(mut self, apply: F) -> Self
    where
        F: Fn(&mut ConfigStore) + Send + Sync + 'static,
    {
        self.apply = Some(Arc::new(apply));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn check(&self, env: &dyn Environment, store: &ConfigStore) -> RequirementOutcome {
        (self.check)(env, store)
    }

    pub fn apply(&self, store: &mut ConfigStore) {
        if let Some(apply) = &self.apply {
            apply(store);
        }
    }

    /// `check`, then `apply` regardless of the outcome.
    pub fn evaluate(&self, env: &dyn Environment, store: &mut ConfigStore) -> RequirementOutcome {
        let outcome = self.check(env, store);
        self.apply(store);
        outcome
    }
}

impl fmt::Debug for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Requirement")
            .field("name", &self.name)
            .field("side_effect", &self.apply.is_some())
            .finish()
    }
}

/// Passes only in an IPv6-enabled environment; always tags the test IPv6-only.
pub fn only_ipv6() -> Requirement {
    Requirement::new("only-ipv6", |env, _| {
        if env.ipv6_enabled() {
            RequirementOutcome::pass("")
        } else {
            RequirementOutcome::fail(
                "runner skips IPv6 compatible tests in the non-IPv6 environment",
            )
        }
    })
    .with_side_effect(|store| {
        store.set_ip_family(IpFamilyMode::Only);
    })
}

/// Always passes; asks fixture setup for an isolated namespace.
pub fn private() -> Requirement {
    Requirement::new("private", |_, _| RequirementOutcome::pass("")).with_side_effect(|store| {
        store.set_mode(Mode::Private);
    })
}

/// Passes when `target` is the backend under test.
pub fn target(target: Target) -> Requirement {
    Requirement::new(target.as_str(), move |env, _| {
        if env.target() == target {
            RequirementOutcome::pass(format!("current target is {target}"))
        } else {
            RequirementOutcome::fail(format!("current target is not {target}"))
        }
    })
}

pub fn docker() -> Requirement {
    target(Target::Docker)
}

pub fn nerdctl() -> Requirement {
    target(Target::Nerdctl)
}

pub fn rootless() -> Requirement {
    Requirement::new("rootless", |env, _| {
        if env.rootless() {
            RequirementOutcome::pass("environment is rootless")
        } else {
            RequirementOutcome::fail("environment is rootful")
        }
    })
}

/// Passes unless the native client is under test and no buildkitd is reachable.
pub fn build() -> Requirement {
    Requirement::new("build", |env, _| {
        if env.target().is_native() {
            if let Err(err) = env.buildkit_host(env.namespace()) {
                return RequirementOutcome::fail(format!("test requires buildkitd: {err}"));
            }
        }
        RequirementOutcome::pass("")
    })
}

/// Inverts `inner`'s outcome and keeps its side effect.
pub fn not(inner: Requirement) -> Requirement {
    let check = Arc::clone(&inner.check);
    let mut negated = Requirement::new(format!("not-{}", inner.name()), move |env, store| {
        let outcome = check(env, store);
        RequirementOutcome {
            pass: !outcome.pass,
            message: outcome.message,
        }
    });
    negated.apply = inner.apply;
    negated
}

/// Names accepted by [`by_name`].
pub const KNOWN_REQUIREMENTS: [&str; 6] =
    ["only-ipv6", "private", "docker", "nerdctl", "rootless", "build"];

/// Resolve a built-in requirement by name; a `not-` prefix negates it.
pub fn by_name(name: &str) -> Option<Requirement> {
    if let Some(inner) = name.strip_prefix("not-") {
        return by_name(inner).map(not);
    }
    match name {
        "only-ipv6" => Some(only_ipv6()),
        "private" => Some(private()),
        "docker" => Some(docker()),
        "nerdctl" => Some(nerdctl()),
        "rootless" => Some(rootless()),
        "build" => Some(build()),
        _ => None,
    }
}

/// Whether a gated test should run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum GateDecision {
    Run,
    Skip { requirement: String, reason: String },
}

impl GateDecision {
    pub fn is_run(&self) -> bool {
        matches!(self, GateDecision::Run)
    }
}

/// Requirements chained with AND semantics.
#[derive(Debug, Clone, Default)]
pub struct RequirementSet {
    requirements: Vec<Requirement>,
}

impl RequirementSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, requirement: Requirement) -> Self {
        self.requirements.push(requirement);
        self
    }

    pub fn len(&self) -> usize {
        self.requirements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    /// Evaluate in order. The first failing requirement still applies its
    /// side effect; those after it are neither checked nor applied.
    pub fn evaluate(&self, env: &dyn Environment, store: &mut ConfigStore) -> GateDecision {
        for requirement in &self.requirements {
            let outcome = requirement.evaluate(env, store);
            if !outcome.pass {
                log::debug!(
                    "[Gate] {} failed: {}",
                    requirement.name(),
                    outcome.message
                );
                return GateDecision::Skip {
                    requirement: requirement.name().to_string(),
                    reason: outcome.message,
                };
            }
        }
        GateDecision::Run
    }
}

impl FromIterator<Requirement> for RequirementSet {
    fn from_iter<I: IntoIterator<Item = Requirement>>(iter: I) -> Self {
        Self {
            requirements: iter.into_iter().collect(),
        }
    }
}
