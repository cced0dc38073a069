//! Suite configuration
//!
//! This module loads the ambient facts the fixture engine gates on (which
//! backend is under test, IPv6 availability, rootless mode, where buildkitd
//! listens) from an optional JSON file, then lets a handful of environment
//! variables override it so CI jobs can flip targets without editing files.

use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::command::Target;
use crate::environment::{Environment, DEFAULT_NAMESPACE};
use crate::error::ProbeError;

/// Variable naming the JSON config file read by [`SuiteConfig::load`].
pub const CONFIG_PATH_VAR: &str = "NERDTEST_CONFIG";

/// Process-wide configuration, loaded on first access.
static SUITE: Lazy<SuiteConfig> = Lazy::new(SuiteConfig::load);

/// Access the process-wide suite configuration.
pub fn suite() -> &'static SuiteConfig {
    &SUITE
}

/// Complete suite configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct SuiteConfig {
    /// Backend under test
    pub target: Target,
    /// Path or name of the native client binary
    pub nerdctl_binary: PathBuf,
    /// Path or name of the reference client binary
    pub docker_binary: PathBuf,
    /// Namespace shared by non-private tests
    pub namespace: String,
    /// Whether the runner has IPv6 networking
    pub enable_ipv6: bool,
    /// Forced rootless flag; detected from the effective uid when absent
    pub rootless: Option<bool>,
    /// Explicit buildkitd address, skips socket discovery
    pub buildkit_host: Option<String>,
    /// Directory holding `buildkit*/buildkitd.sock`
    pub buildkit_run_dir: PathBuf,
}

impl Default for SuiteConfig {
    /// Default configuration values (fallback if config file not found)
    fn default() -> Self {
        Self {
            target: Target::Nerdctl,
            nerdctl_binary: PathBuf::from("nerdctl"),
            docker_binary: PathBuf::from("docker"),
            namespace: DEFAULT_NAMESPACE.to_string(),
            enable_ipv6: false,
            rootless: None,
            buildkit_host: None,
            buildkit_run_dir: PathBuf::from("/run"),
        }
    }
}

impl SuiteConfig {
    /// Load configuration from JSON file
    ///
    /// # Returns
    /// The parsed configuration, or defaults when the file is missing or
    /// invalid (a warning is logged either way).
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    log::info!("[Config] Loaded suite configuration from {:?}", path.as_ref());
                    config
                }
                Err(err) => {
                    log::warn!(
                        "[Config] Failed to parse JSON from {:?}: {}. Using defaults.",
                        path.as_ref(),
                        err
                    );
                    Self::default()
                }
            },
            Err(err) => {
                log::warn!(
                    "[Config] Failed to read config file {:?}: {}. Using defaults.",
                    path.as_ref(),
                    err
                );
                Self::default()
            }
        }
    }

    /// File named by `NERDTEST_CONFIG` (or defaults), then env overrides.
    pub fn load() -> Self {
        let mut config = match std::env::var_os(CONFIG_PATH_VAR) {
            Some(path) => Self::load_from_file(PathBuf::from(path)),
            None => Self::default(),
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        config
    }

    /// Apply `NERDTEST_TARGET`, `NERDTEST_IPV6`, `NERDTEST_NAMESPACE` and
    /// `BUILDKIT_HOST` as returned by `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(value) = lookup("NERDTEST_TARGET") {
            match value.parse::<Target>() {
                Ok(target) => self.target = target,
                Err(err) => log::warn!("[Config] Ignoring NERDTEST_TARGET: {}", err),
            }
        }

        if let Some(value) = lookup("NERDTEST_IPV6") {
            self.enable_ipv6 = parse_flag(&value);
        }

        if let Some(value) = lookup("NERDTEST_NAMESPACE").filter(|ns| !ns.is_empty()) {
            self.namespace = value;
        }

        if let Some(value) = lookup("BUILDKIT_HOST").filter(|host| !host.is_empty()) {
            self.buildkit_host = Some(value);
        }
    }

    /// Candidate buildkitd sockets for `namespace`, most specific first.
    pub fn buildkit_sockets(&self, namespace: &str) -> Vec<PathBuf> {
        vec![
            self.buildkit_run_dir
                .join(format!("buildkit-{namespace}"))
                .join("buildkitd.sock"),
            self.buildkit_run_dir
                .join("buildkit-default")
                .join("buildkitd.sock"),
            self.buildkit_run_dir.join("buildkit").join("buildkitd.sock"),
        ]
    }
}

impl Environment for SuiteConfig {
    fn target(&self) -> Target {
        self.target
    }

    fn ipv6_enabled(&self) -> bool {
        self.enable_ipv6
    }

    fn rootless(&self) -> bool {
        self.rootless.unwrap_or_else(detect_rootless)
    }

    fn namespace(&self) -> &str {
        &self.namespace
    }

    fn binary(&self, target: Target) -> PathBuf {
        match target {
            Target::Nerdctl => self.nerdctl_binary.clone(),
            Target::Docker => self.docker_binary.clone(),
        }
    }

    fn buildkit_host(&self, namespace: &str) -> Result<String, ProbeError> {
        if let Some(host) = &self.buildkit_host {
            return Ok(host.clone());
        }

        let tried = self.buildkit_sockets(namespace);
        match tried.iter().find(|socket| socket.exists()) {
            Some(socket) => Ok(format!("unix://{}", socket.display())),
            None => Err(ProbeError::BuildkitNotFound {
                namespace: namespace.to_string(),
                tried,
            }),
        }
    }
}

fn parse_flag(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        /// Effective uid != 0, read from `/proc/self/status`.
        fn detect_rootless() -> bool {
            fs::read_to_string("/proc/self/status")
                .ok()
                .and_then(|status| {
                    status
                        .lines()
                        .find(|line| line.starts_with("Uid:"))
                        .and_then(|line| line.split_whitespace().nth(2).map(str::to_string))
                })
                .map(|euid| euid != "0")
                .unwrap_or(false)
        }
    } else {
        fn detect_rootless() -> bool {
            false
        }
    }
}
