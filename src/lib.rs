// nerdtest - Test fixture engine for the nerdctl integration suite
// Requirement gating, per-test namespace isolation and inspect helpers,
// targeting either nerdctl or docker with one test definition

// Module declarations
pub mod command;
pub mod config;
pub mod environment;
pub mod error;
pub mod harness;
pub mod inspect;
pub mod requirement;
pub mod setup;
pub mod store;
pub mod testing;

// Re-exports for convenience
pub use command::{BackendCommand, CommandOutput, CommandRunner, Expected, Invocation, Target};
pub use config::{suite, SuiteConfig};
pub use environment::{Base, Environment, DEFAULT_NAMESPACE};
pub use error::{ErrorCode, InspectError, ProbeError, SetupError};
pub use harness::{run_case, CaseResult, CommandFactory, Helpers, SetupOutcome, TestCase};
pub use inspect::{inspect_container, inspect_network, inspect_volume, try_inspect};
pub use requirement::{GateDecision, Requirement, RequirementOutcome, RequirementSet};
pub use setup::{Isolation, NamespaceCleanup, NerdctlSetup};
pub use store::{ConfigKey, ConfigStore, IpFamilyMode, Mode};
