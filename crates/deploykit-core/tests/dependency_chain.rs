use std::sync::Arc;
use std::time::Duration;

use deploykit_core::chain::{
    ChainAction, ChainContext, DependencyChain, DependencyItem, ResolutionAction,
    TimeoutInstaller,
};
use deploykit_core::detect::{DetectionProbes, TieBreak};
use deploykit_core::error::{ChainError, InstallerError};
use deploykit_core::host::memory::{InstallerBehavior, MemoryHost};
use deploykit_core::host::{HostServices, InstallAction, InstallRequest, Installer};
use deploykit_core::session::ExitCodePolicy;
use deploykit_core::types::{ItemStatus, MatchMode};
use deploykit_core::version::Version;

fn v(text: &str) -> Version {
    Version::parse(text).unwrap()
}

fn chain(items: Vec<DependencyItem>) -> DependencyChain {
    DependencyChain::new(items).unwrap()
}

fn names(host: &MemoryHost) -> Vec<String> {
    host.installer_calls().into_iter().map(|call| call.name).collect()
}

fn three(fatal: bool) -> Vec<DependencyItem> {
    ["Dep One", "Dep Two", "Dep Three"]
        .into_iter()
        .map(|name| {
            let item = DependencyItem::new(name, MatchMode::Exact);
            if fatal { item } else { item.non_fatal() }
        })
        .collect()
}

#[test]
fn fatal_failure_aborts_before_later_items() {
    let host = MemoryHost::new()
        .with_installer_behavior("Dep Two", InstallerBehavior::ExitCode(1603));
    let services = HostServices::from_host(&host);
    let policy = ExitCodePolicy::default();
    let ctx = ChainContext {
        probes: DetectionProbes::new(&services, TieBreak::default()),
        installer: services.installer,
        exit_codes: &policy,
    };

    let failure = chain(three(true))
        .resolve(&ctx, ChainAction::Install)
        .unwrap_err();

    assert!(matches!(
        failure.error,
        ChainError::DependencyInstallFailed { ref name, .. } if name == "Dep Two"
    ));
    assert_eq!(names(&host), vec!["Dep One", "Dep Two"]);
    assert_eq!(failure.partial.items.len(), 2);
    assert_eq!(failure.partial.items[0].action, ResolutionAction::Installed);
    assert_eq!(failure.partial.items[1].action, ResolutionAction::Failed);
}

#[test]
fn non_fatal_failure_continues_and_verify_reports_missing() {
    let host = MemoryHost::new()
        .with_installer_behavior("Dep Two", InstallerBehavior::Fail("download failed".into()));
    let services = HostServices::from_host(&host);
    let policy = ExitCodePolicy::default();
    let probes = DetectionProbes::new(&services, TieBreak::default());
    let ctx = ChainContext {
        probes,
        installer: services.installer,
        exit_codes: &policy,
    };
    let chain = chain(three(false));

    let result = chain.resolve(&ctx, ChainAction::Install).unwrap();
    assert_eq!(names(&host), vec!["Dep One", "Dep Two", "Dep Three"]);
    assert!(result.has_non_fatal_failures());
    assert_eq!(result.items[2].action, ResolutionAction::Installed);
    assert!(
        result.items[1]
            .error
            .as_deref()
            .unwrap()
            .contains("download failed")
    );

    let verification = chain.verify(&probes);
    assert!(!verification.all_satisfied);
    assert_eq!(verification.status_of("Dep One"), Some(ItemStatus::Installed));
    assert_eq!(verification.status_of("Dep Two"), Some(ItemStatus::Missing));
    assert_eq!(verification.status_of("Dep Three"), Some(ItemStatus::Installed));
}

#[test]
fn present_items_are_skipped_on_install() {
    let host = MemoryHost::new().with_application("Runtime", Some("5.0"));
    let services = HostServices::from_host(&host);
    let policy = ExitCodePolicy::default();
    let ctx = ChainContext {
        probes: DetectionProbes::new(&services, TieBreak::default()),
        installer: services.installer,
        exit_codes: &policy,
    };
    let chain = chain(vec![
        DependencyItem::new("Runtime", MatchMode::Exact).with_version(v("6.0")),
    ]);

    let result = chain.resolve(&ctx, ChainAction::Install).unwrap();
    assert_eq!(result.items[0].action, ResolutionAction::AlreadyPresent);
    assert!(host.installer_calls().is_empty());
}

#[test]
fn repair_updates_outdated_items() {
    let host = MemoryHost::new().with_application("Runtime", Some("5.0"));
    let services = HostServices::from_host(&host);
    let policy = ExitCodePolicy::default();
    let probes = DetectionProbes::new(&services, TieBreak::default());
    let ctx = ChainContext {
        probes,
        installer: services.installer,
        exit_codes: &policy,
    };
    let chain = chain(vec![
        DependencyItem::new("Runtime", MatchMode::Exact).with_version(v("6.0")),
    ]);

    let result = chain.resolve(&ctx, ChainAction::Repair).unwrap();
    assert_eq!(result.items[0].action, ResolutionAction::Updated);
    assert_eq!(host.installer_calls()[0].action, InstallAction::Update);
    assert_eq!(host.installer_calls()[0].version, Some(v("6.0")));
    assert!(chain.verify(&probes).all_satisfied);
}

#[test]
fn reboot_codes_latch_reboot_flag() {
    let host =
        MemoryHost::new().with_installer_behavior("Dep One", InstallerBehavior::ExitCode(3010));
    let services = HostServices::from_host(&host);
    let policy = ExitCodePolicy::default();
    let ctx = ChainContext {
        probes: DetectionProbes::new(&services, TieBreak::default()),
        installer: services.installer,
        exit_codes: &policy,
    };

    let result = chain(three(true)).resolve(&ctx, ChainAction::Install).unwrap();
    assert!(result.reboot_required);
    assert!(result.failed_items().next().is_none());
}

#[test]
fn remove_runs_in_reverse_order() {
    let host = MemoryHost::new()
        .with_application("Dep One", Some("1.0"))
        .with_application("Dep Three", Some("1.0"))
        .with_installer_behavior("Dep One", InstallerBehavior::ExitCode(1603));
    let services = HostServices::from_host(&host);
    let policy = ExitCodePolicy::default();
    let ctx = ChainContext {
        probes: DetectionProbes::new(&services, TieBreak::default()),
        installer: services.installer,
        exit_codes: &policy,
    };

    let result = chain(three(true)).remove(&ctx);
    assert_eq!(names(&host), vec!["Dep Three", "Dep One"]);
    assert_eq!(result.items[0].action, ResolutionAction::Removed);
    assert_eq!(result.items[1].action, ResolutionAction::Failed);
    assert_eq!(result.items[1].status, ItemStatus::Installed);
}

struct StuckInstaller;

impl Installer for StuckInstaller {
    fn run_installer(&self, _request: &InstallRequest) -> Result<i32, InstallerError> {
        std::thread::sleep(Duration::from_millis(300));
        Ok(0)
    }
}

#[test]
fn timed_out_installer_follows_item_fatality() {
    let host = MemoryHost::new();
    let timeout = TimeoutInstaller::new(Arc::new(StuckInstaller), Duration::from_millis(20));
    let services = HostServices::from_host(&host).with_installer(&timeout);
    let policy = ExitCodePolicy::default();
    let ctx = ChainContext {
        probes: DetectionProbes::new(&services, TieBreak::default()),
        installer: services.installer,
        exit_codes: &policy,
    };

    let optional = chain(vec![DependencyItem::new("Update KB1", MatchMode::Exact).non_fatal()]);
    let result = optional.resolve(&ctx, ChainAction::Install).unwrap();
    assert!(result.items[0].error.as_deref().unwrap().contains("timed out"));

    let required = chain(vec![DependencyItem::new("Runtime", MatchMode::Exact)]);
    let failure = required.resolve(&ctx, ChainAction::Install).unwrap_err();
    assert!(failure.error.to_string().contains("timed out"));
}
