//! Deploykit - application deployment session runner
//!
//! Usage:
//!   deploykit install     # Install the application described by ./deploy.toml
//!   deploykit uninstall   # Remove it
//!   deploykit repair      # Repair, update or reinstall depending on detected state
//!   deploykit detect      # Probe only, change nothing
//!
//! The process exit code is the deployment outcome (0, 3010, 1602 or
//! 60001-60004). These are installer-convention codes and survive intact on
//! Windows; Unix truncates exit statuses to 8 bits, so 3010 reads as 194 and
//! 60001 as 97 there. Use the JSON report or `--format json` for the full code.

mod prompt;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use console::style;
use tracing::{debug, error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use deploykit_core::chain::TimeoutInstaller;
use deploykit_core::config::{DeploymentManifest, default_manifest_path, default_report_dir, parse_manifest};
use deploykit_core::host::{HostServices, load_host_state};
use deploykit_core::orchestrator::{EXIT_UNHANDLED, ExitCode, Orchestrator};
use deploykit_core::report::{CheckStatus, Report};
use deploykit_core::types::{DeployMode, ItemStatus, OperationKind};

use crate::prompt::ConsolePrompt;

const HOST_STATE_FILE_NAME: &str = "host.toml";

#[derive(Parser)]
#[command(name = "deploykit")]
#[command(about = "Application deployment session runner", long_about = None)]
struct Cli {
    /// Path to the deployment manifest (default: ./deploy.toml)
    #[arg(long, short, global = true)]
    manifest: Option<PathBuf>,

    /// Host-state file describing the simulated endpoint (default: host.toml next to the manifest)
    #[arg(long, global = true)]
    host: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "table", global = true)]
    format: OutputFormat,

    /// Where to write the JSON report
    #[arg(long, global = true)]
    report: Option<PathBuf>,

    /// Show error details in failure messages
    #[arg(long, global = true)]
    debug: bool,

    /// Suppress every user-facing message
    #[arg(long, short, global = true)]
    silent: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone, Copy, Debug, PartialEq, Eq)]
enum Commands {
    /// Install the application and its dependencies
    Install,
    /// Uninstall the application
    #[command(alias = "rm")]
    Uninstall,
    /// Repair the application in place, updating or reinstalling as needed
    Repair,
    /// Probe environment, application and dependencies without changing anything
    Detect,
}

impl Commands {
    fn operation(self) -> Option<OperationKind> {
        match self {
            Commands::Install => Some(OperationKind::Install),
            Commands::Uninstall => Some(OperationKind::Uninstall),
            Commands::Repair => Some(OperationKind::Repair),
            Commands::Detect => None,
        }
    }
}

#[derive(Clone, Copy, ValueEnum, Default, Debug, PartialEq, Eq)]
enum OutputFormat {
    /// Human-readable table
    #[default]
    Table,
    /// Machine-readable JSON
    Json,
}

fn main() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "deploykit=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let code = match run(cli) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("{} {err:#}", style("error:").red().bold());
            EXIT_UNHANDLED
        }
    };
    std::process::exit(code);
}

fn run(cli: Cli) -> Result<ExitCode> {
    let manifest_path = match &cli.manifest {
        Some(path) => path.clone(),
        None => default_manifest_path(&std::env::current_dir()?),
    };
    let mut manifest = parse_manifest(&manifest_path)?;
    apply_overrides(&mut manifest, &cli);

    let host_path = cli
        .host
        .clone()
        .unwrap_or_else(|| sibling(&manifest_path, HOST_STATE_FILE_NAME));
    let host = Arc::new(load_host_state(&host_path)?.into_host());
    debug!(manifest = %manifest_path.display(), host = %host_path.display(), "loaded deployment inputs");

    let prompt = ConsolePrompt::stderr();
    let timeout = manifest
        .policy
        .installer_timeout_secs
        .map(|secs| TimeoutInstaller::new(Arc::clone(&host), Duration::from_secs(secs)));

    let mut services = HostServices::from_host(host.as_ref()).with_prompt(&prompt);
    if let Some(installer) = &timeout {
        services = services.with_installer(installer);
    }
    let orchestrator = Orchestrator::new(&manifest, services)?;

    let (label, exit_code, report) = match cli.command.operation() {
        Some(operation) => {
            let outcome = orchestrator.run_with_report(operation);
            (operation.to_string(), outcome.exit_code, outcome.report)
        }
        None => ("detect".to_string(), 0, orchestrator.detect()),
    };

    match cli.format {
        OutputFormat::Table => print_table(&manifest, &report, exit_code),
        OutputFormat::Json => match report.to_json() {
            Ok(json) => println!("{json}"),
            Err(err) => error!(error = %err, "failed to render report"),
        },
    }

    save_report(&report, cli.report.as_deref(), || {
        report_file_name(&manifest, &label, &report)
    });

    Ok(exit_code)
}

/// Write the JSON report. The deployment already finished, so a failure here
/// is reported but never changes the exit code.
fn save_report(
    report: &Report,
    explicit: Option<&Path>,
    file_name: impl FnOnce() -> String,
) -> Option<PathBuf> {
    let written = match explicit {
        Some(path) => Ok(path.to_path_buf()),
        None => default_report_dir().map(|dir| dir.join(file_name())),
    }
    .and_then(|path| write_report(report, &path).map(|()| path));

    match written {
        Ok(path) => {
            info!(path = %path.display(), "report written");
            Some(path)
        }
        Err(err) => {
            error!(error = %format!("{err:#}"), "failed to write report");
            eprintln!("{} {err:#}", style("warning:").yellow().bold());
            None
        }
    }
}

fn apply_overrides(manifest: &mut DeploymentManifest, cli: &Cli) {
    if cli.debug {
        manifest.policy.show_error_details = true;
    }
    if cli.silent {
        manifest.policy.deploy_mode = DeployMode::Silent;
    }
}

fn sibling(path: &Path, name: &str) -> PathBuf {
    path.parent()
        .map(|dir| dir.join(name))
        .unwrap_or_else(|| PathBuf::from(name))
}

fn report_file_name(manifest: &DeploymentManifest, label: &str, report: &Report) -> String {
    let app: String = manifest
        .app
        .name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!(
        "{}-{}-{}-{}.json",
        app,
        manifest.app.version,
        label,
        report.timestamp.format("%Y%m%dT%H%M%SZ")
    )
}

fn write_report(report: &Report, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create report directory: {}", parent.display()))?;
    }
    std::fs::write(path, report.to_json()?)
        .with_context(|| format!("Failed to write report: {}", path.display()))
}

fn print_table(manifest: &DeploymentManifest, report: &Report, exit_code: ExitCode) {
    println!("Application: {}", manifest.app.display_name());
    if let Some(env) = &report.environment {
        println!(
            "Host: arch={} admin={} domain={} server={} laptop={} vm={} terminal-server={} hour={:02}",
            env.architecture,
            env.is_admin,
            env.is_domain_joined,
            env.is_server,
            env.is_laptop,
            env.is_virtual_machine,
            env.is_terminal_server,
            env.hour
        );
    }
    println!();

    println!("Application checks ({}):", report.application_checks.len());
    println!(
        "  {:<16} {:<28} {:<10} {:<12} Required",
        "Phase", "Name", "Status", "Current"
    );
    println!("  {}", "-".repeat(76));
    for check in &report.application_checks {
        let phase = check
            .phase
            .map(|phase| format!("{phase:?}"))
            .unwrap_or_else(|| "-".to_string());
        let status = match check.status {
            CheckStatus::Ok => style("OK").green(),
            CheckStatus::Outdated => style("OUTDATED").yellow(),
            CheckStatus::Missing => style("MISSING").red(),
        };
        println!(
            "  {:<16} {:<28} {:<10} {:<12} {}",
            phase,
            check.name,
            status,
            check.result.reported_version.as_deref().unwrap_or("-"),
            check.result.required_version
        );
    }

    if !report.dependency_status.is_empty() {
        println!();
        println!("Dependencies ({}):", report.dependency_status.len());
        for dep in &report.dependency_status {
            let status = match dep.status {
                ItemStatus::Installed => style("✓").green(),
                ItemStatus::Missing => style("✗").red(),
            };
            let action = dep
                .action
                .map(|action| format!("{action:?}"))
                .unwrap_or_else(|| "-".to_string());
            let fatal = if dep.fatal { "" } else { " (optional)" };
            println!("  {} {:<32} {}{}", status, dep.name, action, fatal);
            if let Some(error) = &dep.error {
                println!("      {}", style(error).dim());
            }
        }
    }

    println!();
    println!("Exit code: {exit_code}");
}

#[cfg(test)]
mod tests {
    use super::{
        Cli, Commands, OutputFormat, apply_overrides, report_file_name, save_report, sibling,
    };
    use clap::Parser;
    use deploykit_core::config::{DeploymentManifest, parse_manifest_str};
    use deploykit_core::report::ReportBuilder;
    use deploykit_core::types::{DeployMode, OperationKind};
    use std::path::{Path, PathBuf};

    fn manifest() -> DeploymentManifest {
        parse_manifest_str("[app]\nname = \"Contoso Widget\"\nversion = \"2.1\"\n").unwrap()
    }

    #[test]
    fn subcommands_map_to_operations() {
        let cli = Cli::try_parse_from(["deploykit", "install"]).unwrap();
        assert_eq!(cli.command.operation(), Some(OperationKind::Install));
        let cli = Cli::try_parse_from(["deploykit", "rm"]).unwrap();
        assert_eq!(cli.command, Commands::Uninstall);
        let cli = Cli::try_parse_from(["deploykit", "detect"]).unwrap();
        assert_eq!(cli.command.operation(), None);
    }

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::try_parse_from([
            "deploykit",
            "repair",
            "--manifest",
            "pkg/deploy.toml",
            "--format",
            "json",
            "--silent",
            "--debug",
        ])
        .unwrap();
        assert_eq!(cli.manifest, Some(PathBuf::from("pkg/deploy.toml")));
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(cli.silent);
        assert!(cli.debug);
    }

    #[test]
    fn missing_subcommand_is_rejected() {
        assert!(Cli::try_parse_from(["deploykit"]).is_err());
        assert!(Cli::try_parse_from(["deploykit", "deploy"]).is_err());
    }

    #[test]
    fn overrides_adjust_policy() {
        let cli = Cli::try_parse_from(["deploykit", "install", "--silent", "--debug"]).unwrap();
        let mut manifest = manifest();
        apply_overrides(&mut manifest, &cli);
        assert_eq!(manifest.policy.deploy_mode, DeployMode::Silent);
        assert!(manifest.policy.show_error_details);
    }

    #[test]
    fn host_state_defaults_next_to_manifest() {
        assert_eq!(
            sibling(Path::new("pkg/deploy.toml"), "host.toml"),
            PathBuf::from("pkg/host.toml")
        );
    }

    #[test]
    fn report_is_written_to_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("report.json");
        let report = ReportBuilder::new().build();

        let written = save_report(&report, Some(&path), || unreachable!());
        assert_eq!(written.as_deref(), Some(path.as_path()));
        assert!(path.exists());
    }

    #[test]
    fn unwritable_report_path_is_not_fatal() {
        let blocker = tempfile::NamedTempFile::new().unwrap();
        let path = blocker.path().join("report.json");
        let report = ReportBuilder::new().build();

        assert_eq!(save_report(&report, Some(&path), || unreachable!()), None);
    }

    #[test]
    fn report_file_name_is_path_safe() {
        let report = ReportBuilder::new().build();
        let name = report_file_name(&manifest(), "install", &report);
        assert!(name.starts_with("Contoso_Widget-2.1-install-"));
        assert!(name.ends_with(".json"));
    }
}
