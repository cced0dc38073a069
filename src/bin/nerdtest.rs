use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use nerdtest::environment::{Base, Environment};
use nerdtest::error::log_probe_error;
use nerdtest::requirement::{self, GateDecision, RequirementSet, KNOWN_REQUIREMENTS};
use nerdtest::store::ConfigStore;
use nerdtest::{SuiteConfig, Target};
use serde::Serialize;
use std::collections::BTreeMap;

#[derive(Parser, Debug)]
#[command(
    name = "nerdtest",
    about = "Inspect how the nerdctl test fixtures see this machine"
)]
struct Cli {
    /// Suite config JSON (defaults to $NERDTEST_CONFIG, then built-in defaults)
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// Backend under test, overriding config and environment
    #[arg(long, global = true)]
    target: Option<Target>,
    /// Log at DEBUG level on stderr
    #[arg(long, short, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Print the resolved environment as JSON
    Probe,
    /// Evaluate requirements against a fresh store; exits 2 when the test would be skipped
    Check {
        /// Requirement name, `not-` prefix negates (repeatable)
        #[arg(long = "require", short = 'r', required = true)]
        requirements: Vec<String>,
    },
    /// List known requirement names
    Requirements,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(err) => {
            eprintln!("Error: {err:?}");
            ExitCode::from(1)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let mut suite = match &cli.config {
        Some(path) => {
            let mut suite = SuiteConfig::load_from_file(path);
            suite.apply_overrides(|name| std::env::var(name).ok());
            suite
        }
        None => SuiteConfig::load(),
    };
    if let Some(target) = cli.target {
        suite.target = target;
    }

    match cli.command {
        Commands::Probe => run_probe(&suite),
        Commands::Check { requirements } => run_check(&suite, &requirements),
        Commands::Requirements => run_requirements(),
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_max_level(level)
        .init();
}

fn run_probe(suite: &SuiteConfig) -> Result<ExitCode> {
    let namespace = suite.namespace().to_string();
    let (buildkit_host, buildkit_error) = match suite.buildkit_host(&namespace) {
        Ok(host) => (Some(host), None),
        Err(err) => {
            log_probe_error(&err, "probe");
            (None, Some(err.to_string()))
        }
    };
    let base = Base::new(suite);

    let report = ProbeReport {
        target: suite.target(),
        binary: base.binary.display().to_string(),
        base_args: base.args,
        namespace,
        ipv6: suite.ipv6_enabled(),
        rootless: suite.rootless(),
        buildkit_host,
        buildkit_error,
    };
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(ExitCode::from(0))
}

fn run_check(suite: &SuiteConfig, names: &[String]) -> Result<ExitCode> {
    let mut set = RequirementSet::new();
    for name in names {
        match requirement::by_name(name) {
            Some(requirement) => set = set.with(requirement),
            None => bail!(
                "unknown requirement {:?} (known: {})",
                name,
                KNOWN_REQUIREMENTS.join(", ")
            ),
        }
    }

    let mut store = ConfigStore::new();
    let decision = set.evaluate(suite, &mut store);
    let report = CheckReport {
        target: suite.target(),
        decision: &decision,
        store: store.snapshot(),
    };
    let json = serde_json::to_string_pretty(&report).context("serializing check report")?;
    println!("{json}");

    Ok(match decision {
        GateDecision::Run => ExitCode::from(0),
        GateDecision::Skip { .. } => ExitCode::from(2),
    })
}

fn run_requirements() -> Result<ExitCode> {
    for name in KNOWN_REQUIREMENTS {
        println!("{name}");
    }
    Ok(ExitCode::from(0))
}

#[derive(Serialize)]
struct ProbeReport {
    target: Target,
    binary: String,
    base_args: Vec<String>,
    namespace: String,
    ipv6: bool,
    rootless: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    buildkit_host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    buildkit_error: Option<String>,
}

#[derive(Serialize)]
struct CheckReport<'a> {
    target: Target,
    #[serde(flatten)]
    decision: &'a GateDecision,
    store: BTreeMap<&'static str, String>,
}
