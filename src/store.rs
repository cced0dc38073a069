//! Per-test keyed configuration store.
//!
//! Requirements write intent here while a test is being gated ("this test is
//! private", "this test is IPv6-only") and fixture setup reads it back when it
//! assembles the command. Keys are a closed enum and every key is bound to a
//! single value variant through its typed setter, so two components can never
//! disagree on what a key holds. Reading a key that was never written yields
//! the empty value, not an error.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};

/// Sentinel keys understood by requirements and fixture setup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ConfigKey {
    /// Literal contents for a custom `nerdctl.toml`.
    NerdctlToml,
    /// Directory passed as `--hosts-dir`.
    HostsDir,
    /// Directory passed as `--data-root`.
    DataRoot,
    /// Namespace owned by (or inherited into) the test.
    Namespace,
    /// Isolation mode.
    Mode,
    /// IPv6 restriction tag.
    IPv6,
}

impl ConfigKey {
    pub const ALL: [ConfigKey; 6] = [
        ConfigKey::NerdctlToml,
        ConfigKey::HostsDir,
        ConfigKey::DataRoot,
        ConfigKey::Namespace,
        ConfigKey::Mode,
        ConfigKey::IPv6,
    ];

    /// Stable name used in diagnostics.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConfigKey::NerdctlToml => "NerdctlToml",
            ConfigKey::HostsDir => "HostsDir",
            ConfigKey::DataRoot => "DataRoot",
            ConfigKey::Namespace => "Namespace",
            ConfigKey::Mode => "Mode",
            ConfigKey::IPv6 => "IPv6Test",
        }
    }
}

impl fmt::Display for ConfigKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Isolation mode requested by a test.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Mode {
    /// Run in whatever namespace is ambient (default, or inherited).
    #[default]
    Shared,
    /// Run in a namespace of its own.
    Private,
}

/// IPv6 restriction tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IpFamilyMode {
    /// Not IPv6 specific.
    #[default]
    Any,
    /// Only meaningful in an IPv6-enabled environment.
    Only,
}

/// Value stored under a [`ConfigKey`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigValue {
    Text(String),
    Path(PathBuf),
    Mode(Mode),
    IpFamily(IpFamilyMode),
}

impl ConfigValue {
    /// Textual rendering; enum defaults render as the empty string.
    pub fn render(&self) -> String {
        match self {
            ConfigValue::Text(text) => text.clone(),
            ConfigValue::Path(path) => path.display().to_string(),
            ConfigValue::Mode(Mode::Shared) => String::new(),
            ConfigValue::Mode(Mode::Private) => "Private".to_string(),
            ConfigValue::IpFamily(IpFamilyMode::Any) => String::new(),
            ConfigValue::IpFamily(IpFamilyMode::Only) => "Only".to_string(),
        }
    }
}

/// Keyed configuration attached to one test's data context.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigStore {
    entries: BTreeMap<ConfigKey, ConfigValue>,
}

impl ConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store handed to a nested test. Entries are copied, so a child can
    /// read everything its parent recorded but never write back into it.
    pub fn inherit(&self) -> Self {
        self.clone()
    }

    pub fn get(&self, key: ConfigKey) -> Option<&ConfigValue> {
        self.entries.get(&key)
    }

    /// Uniform string view of a key; unset keys read as `""`.
    pub fn read(&self, key: ConfigKey) -> String {
        self.get(key).map(ConfigValue::render).unwrap_or_default()
    }

    pub fn is_set(&self, key: ConfigKey) -> bool {
        !self.read(key).is_empty()
    }

    pub fn mode(&self) -> Mode {
        match self.get(ConfigKey::Mode) {
            Some(ConfigValue::Mode(mode)) => *mode,
            _ => Mode::default(),
        }
    }

    pub fn set_mode(&mut self, mode: Mode) -> &mut Self {
        self.entries.insert(ConfigKey::Mode, ConfigValue::Mode(mode));
        self
    }

    pub fn ip_family(&self) -> IpFamilyMode {
        match self.get(ConfigKey::IPv6) {
            Some(ConfigValue::IpFamily(mode)) => *mode,
            _ => IpFamilyMode::default(),
        }
    }

    pub fn set_ip_family(&mut self, mode: IpFamilyMode) -> &mut Self {
        self.entries
            .insert(ConfigKey::IPv6, ConfigValue::IpFamily(mode));
        self
    }

    pub fn namespace(&self) -> Option<&str> {
        self.text(ConfigKey::Namespace)
    }

    pub fn set_namespace(&mut self, namespace: impl Into<String>) -> &mut Self {
        self.entries
            .insert(ConfigKey::Namespace, ConfigValue::Text(namespace.into()));
        self
    }

    /// Custom `nerdctl.toml` contents, if any were supplied.
    pub fn nerdctl_toml(&self) -> Option<&str> {
        self.text(ConfigKey::NerdctlToml)
    }

    pub fn set_nerdctl_toml(&mut self, contents: impl Into<String>) -> &mut Self {
        self.entries
            .insert(ConfigKey::NerdctlToml, ConfigValue::Text(contents.into()));
        self
    }

    pub fn hosts_dir(&self) -> Option<&Path> {
        self.path(ConfigKey::HostsDir)
    }

    pub fn set_hosts_dir(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.entries
            .insert(ConfigKey::HostsDir, ConfigValue::Path(dir.into()));
        self
    }

    pub fn data_root(&self) -> Option<&Path> {
        self.path(ConfigKey::DataRoot)
    }

    pub fn set_data_root(&mut self, dir: impl Into<PathBuf>) -> &mut Self {
        self.entries
            .insert(ConfigKey::DataRoot, ConfigValue::Path(dir.into()));
        self
    }

    /// Ordered `name -> value` view of every non-empty entry.
    pub fn snapshot(&self) -> BTreeMap<&'static str, String> {
        ConfigKey::ALL
            .iter()
            .filter(|key| self.is_set(**key))
            .map(|key| (key.as_str(), self.read(*key)))
            .collect()
    }

    fn text(&self, key: ConfigKey) -> Option<&str> {
        match self.get(key) {
            Some(ConfigValue::Text(text)) if !text.is_empty() => Some(text.as_str()),
            _ => None,
        }
    }

    fn path(&self, key: ConfigKey) -> Option<&Path> {
        match self.get(key) {
            Some(ConfigValue::Path(path)) if !path.as_os_str().is_empty() => Some(path.as_path()),
            _ => None,
        }
    }
}
