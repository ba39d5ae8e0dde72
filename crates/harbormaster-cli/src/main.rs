//! Harbormaster - release upgrade planner
//!
//! Usage:
//!   harbormaster check v1.1.0 v1.0.0                              # Is this a valid upgrade?
//!   harbormaster plan --releases desired.yaml --observed observed.yaml
//!   harbormaster status --releases desired.yaml --observed observed.yaml

mod manifest;
mod snapshot;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info_span;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use harbormaster_core::cluster::{ListingObserver, ReleaseSource};
use harbormaster_core::config::{ConfigStore, EngineConfig};
use harbormaster_core::orchestrator::{ObservedVersion, observed_versions};
use harbormaster_core::plan::{ActionFactory, ActionKind, Hook, PlanOptions, UpgradePlan};
use harbormaster_core::version::{DriftAllowance, Semver, check_upgrade, compatible_with_binary};

use crate::manifest::ManifestSource;
use crate::snapshot::SnapshotLister;

#[derive(Parser)]
#[command(name = "harbormaster")]
#[command(about = "Release upgrade planner", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check whether one version is a valid upgrade from another
    Check {
        /// Version to upgrade to
        candidate: String,
        /// Version currently installed
        current: String,
        /// Allowed minor version drift (a number or "any")
        #[arg(long, default_value = "1")]
        max_minor_drift: String,
    },

    /// Plan installs and upgrades for the desired releases
    ///
    /// Exits non-zero when a destructive release lacks --allow-destructive
    /// or the installed state cannot be read.
    Plan {
        #[command(flatten)]
        inputs: Inputs,
        /// Engine configuration (defaults to the user config directory)
        #[arg(long)]
        config: Option<PathBuf>,
        /// Skip all version checks
        #[arg(long)]
        force: bool,
        /// Confirm changes to releases marked destructive
        #[arg(long)]
        allow_destructive: bool,
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },

    /// Show installed versions and whether this build can manage them
    Status {
        #[command(flatten)]
        inputs: Inputs,
        /// Output format
        #[arg(short, long, default_value = "table")]
        format: OutputFormat,
    },
}

#[derive(clap::Args)]
struct Inputs {
    /// Desired releases (YAML list)
    #[arg(long)]
    releases: PathBuf,
    /// Installed releases (YAML map of name to installed versions)
    #[arg(long)]
    observed: PathBuf,
    /// Version this run is built for (defaults to the binary version)
    #[arg(long)]
    build_version: Option<String>,
}

#[derive(Clone, Copy, ValueEnum, Default)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "harbormaster=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            candidate,
            current,
            max_minor_drift,
        } => {
            let valid = run_check(&candidate, &current, &max_minor_drift)?;
            if !valid {
                std::process::exit(1);
            }
        }
        Commands::Plan {
            inputs,
            config,
            force,
            allow_destructive,
            format,
        } => run_plan(&inputs, config.as_deref(), force, allow_destructive, format).await?,
        Commands::Status { inputs, format } => run_status(&inputs, format).await?,
    }

    Ok(())
}

fn run_check(candidate: &str, current: &str, max_minor_drift: &str) -> Result<bool> {
    let candidate = Semver::parse(candidate)?;
    let current = Semver::parse(current)?;
    let limit = match parse_drift(max_minor_drift)? {
        DriftAllowance::AtMost(limit) => limit,
        DriftAllowance::Any => u64::MAX,
    };

    match check_upgrade(&candidate, &current, limit) {
        Ok(()) => {
            println!("{candidate} is a valid upgrade from {current}");
            Ok(true)
        }
        Err(err) => {
            println!("{err}");
            Ok(false)
        }
    }
}

fn parse_drift(input: &str) -> Result<DriftAllowance> {
    if input.eq_ignore_ascii_case("any") {
        return Ok(DriftAllowance::Any);
    }
    let limit = input
        .parse::<u64>()
        .map_err(|_| anyhow::anyhow!("Invalid minor drift '{}'. Use a number or 'any'", input))?;
    Ok(DriftAllowance::AtMost(limit))
}

fn load_config(path: Option<&Path>) -> Result<EngineConfig> {
    let store = match path {
        Some(path) => ConfigStore::from_path(path),
        None => ConfigStore::from_default_dir()?,
    };
    store.load()
}

fn build_version(inputs: &Inputs) -> Result<Semver> {
    let raw = inputs
        .build_version
        .as_deref()
        .unwrap_or(env!("CARGO_PKG_VERSION"));
    Ok(Semver::parse(raw)?)
}

async fn run_plan(
    inputs: &Inputs,
    config: Option<&Path>,
    force: bool,
    allow_destructive: bool,
    format: OutputFormat,
) -> Result<()> {
    let config = load_config(config)?;
    let releases = ManifestSource::new(&inputs.releases).load()?;
    let observer = ListingObserver::new(SnapshotLister::from_file(&inputs.observed)?);

    let factory = ActionFactory::new(
        Arc::new(observer),
        config.policy_table(),
        info_span!("plan"),
    );
    let options = PlanOptions::new(build_version(inputs)?)
        .force(force)
        .allow_destructive(allow_destructive);
    let plan = factory.plan(&releases, &options).await?;

    match format {
        OutputFormat::Table => print_plan_table(&plan),
        OutputFormat::Json => print_plan_json(&plan)?,
    }
    Ok(())
}

async fn run_status(inputs: &Inputs, format: OutputFormat) -> Result<()> {
    let releases = ManifestSource::new(&inputs.releases).load()?;
    let observer = ListingObserver::new(SnapshotLister::from_file(&inputs.observed)?);
    let build = build_version(inputs)?;

    let names: Vec<&str> = releases.iter().map(|r| r.name.as_str()).collect();
    let observed = observed_versions(&observer, &names).await?;

    match format {
        OutputFormat::Table => {
            println!("Build version: {build}");
            println!();
            println!("{:<24} {:<14} {:<14} Compatible", "Release", "Installed", "Target");
            println!("{}", "-".repeat(66));
            for (release, (_, state)) in releases.iter().zip(&observed) {
                let (installed, compatible) = match state {
                    ObservedVersion::Installed(version) => (
                        version.to_string(),
                        yes_no(compatible_with_binary(version, &build)),
                    ),
                    ObservedVersion::NotInstalled => ("-".to_string(), "-"),
                };
                println!(
                    "{:<24} {:<14} {:<14} {}",
                    release.name,
                    installed,
                    release.target_version.to_string(),
                    compatible
                );
            }
        }
        OutputFormat::Json => {
            let output: Vec<_> = releases
                .iter()
                .zip(&observed)
                .map(|(release, (_, state))| {
                    let installed = match state {
                        ObservedVersion::Installed(version) => Some(version),
                        ObservedVersion::NotInstalled => None,
                    };
                    serde_json::json!({
                        "name": release.name,
                        "installed": installed,
                        "target": release.target_version,
                        "compatible": installed.map(|v| compatible_with_binary(v, &build)),
                    })
                })
                .collect();
            let output = serde_json::json!({
                "build_version": build,
                "releases": output,
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }
    Ok(())
}

fn print_plan_table(plan: &UpgradePlan) {
    if plan.is_empty() {
        println!("Nothing to do.");
    } else {
        println!("{:<4} {:<24} {:<28} {:<14} Hooks", "#", "Release", "Action", "Version");
        println!("{}", "-".repeat(80));
        for (i, action) in plan.actions().iter().enumerate() {
            println!(
                "{:<4} {:<24} {:<28} {:<14} {}",
                i + 1,
                action.name(),
                action.kind().to_string(),
                action.release().target_version.to_string(),
                hooks_label(action.pre_hook(), action.post_hook())
            );
        }
    }

    if !plan.skipped().is_empty() {
        println!();
        match plan.skipped().len() {
            1 => println!("1 release was skipped:"),
            n => println!("{n} releases were skipped:"),
        }
        for err in plan.skipped() {
            println!("  - {err}");
        }
    }
}

fn print_plan_json(plan: &UpgradePlan) -> Result<()> {
    let actions: Vec<_> = plan
        .actions()
        .iter()
        .map(|action| {
            let (kind, from) = match action.kind() {
                ActionKind::Install => ("install", None),
                ActionKind::Upgrade { from } => ("upgrade", Some(from)),
            };
            serde_json::json!({
                "release": action.name(),
                "action": kind,
                "from": from,
                "to": action.release().target_version,
                "atomic": action.is_atomic(),
                "pre_hook": action.pre_hook().map(hook_name),
                "post_hook": action.post_hook().map(hook_name),
            })
        })
        .collect();
    let skipped: Vec<_> = plan
        .skipped()
        .iter()
        .map(|err| {
            serde_json::json!({
                "release": err.release,
                "from": err.from,
                "to": err.to,
                "reason": err.reason.to_string(),
            })
        })
        .collect();

    let output = serde_json::json!({
        "schema_version": 1,
        "includes_upgrade": plan.includes_upgrade(),
        "actions": actions,
        "skipped": skipped,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

// =============================================================================
// Helpers
// =============================================================================

fn hook_name(hook: &Hook) -> String {
    match hook {
        Hook::RefreshCrds { manifests } => format!("refresh-crds ({})", manifests.len()),
        Hook::AwaitReadiness { workload } => format!("await-readiness {workload}"),
    }
}

fn hooks_label(pre: Option<&Hook>, post: Option<&Hook>) -> String {
    let labels: Vec<String> = [
        pre.map(|h| format!("pre: {}", hook_name(h))),
        post.map(|h| format!("post: {}", hook_name(h))),
    ]
    .into_iter()
    .flatten()
    .collect();
    if labels.is_empty() {
        "-".to_string()
    } else {
        labels.join(", ")
    }
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}
