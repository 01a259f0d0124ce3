use chrono::{TimeZone, Utc};

use deploykit_core::chain::{
    ChainResult, ChainVerificationReport, ItemResolution, ItemVerification, ResolutionAction,
};
use deploykit_core::detect::{DetectionResult, EnvironmentSnapshot};
use deploykit_core::report::{CheckStatus, ReportBuilder};
use deploykit_core::types::{ItemStatus, MatchMode, SessionPhase};
use deploykit_core::version::Version;

fn v(text: &str) -> Version {
    Version::parse(text).unwrap()
}

fn snapshot() -> EnvironmentSnapshot {
    EnvironmentSnapshot {
        is_laptop: false,
        is_domain_joined: true,
        is_server: false,
        is_virtual_machine: true,
        is_terminal_server: false,
        is_admin: true,
        hour: 9,
        architecture: "x64".to_string(),
    }
}

fn resolution(name: &str, action: ResolutionAction, status: ItemStatus) -> ItemResolution {
    ItemResolution {
        name: name.to_string(),
        match_mode: MatchMode::Exact,
        fatal: true,
        action,
        status,
        detected: DetectionResult::not_found(&v("0")),
        error: None,
    }
}

fn populated() -> ReportBuilder {
    let mut builder = ReportBuilder::new();
    builder.add_environment_snapshot(snapshot());
    builder.set_phase(Some(SessionPhase::PreOperation));
    builder.add_application_check("Widget", DetectionResult::not_found(&v("2.0")));
    builder.add_dependency_status(&ChainResult {
        items: vec![
            resolution("Runtime", ResolutionAction::Installed, ItemStatus::Installed),
            resolution("Codec", ResolutionAction::AlreadyPresent, ItemStatus::Installed),
        ],
        reboot_required: false,
    });
    builder
}

#[test]
fn identical_inputs_build_identical_reports() {
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
    assert_eq!(populated().build_at(at), populated().build_at(at));
}

#[test]
fn report_keeps_fixed_shape_when_empty() {
    let report = ReportBuilder::new().build();
    let json = serde_json::to_value(&report).unwrap();
    let object = json.as_object().unwrap();
    for key in ["timestamp", "environment", "application_checks", "dependency_status"] {
        assert!(object.contains_key(key), "missing {key}");
    }
    assert!(object["environment"].is_null());
    assert_eq!(object["application_checks"].as_array().unwrap().len(), 0);
}

#[test]
fn dependency_status_is_updated_by_verification() {
    let mut builder = populated();
    builder.add_dependency_verification(&ChainVerificationReport {
        all_satisfied: false,
        items: vec![ItemVerification {
            name: "Runtime".to_string(),
            match_mode: MatchMode::Exact,
            fatal: true,
            status: ItemStatus::Missing,
            detection: DetectionResult::not_found(&v("0")),
        }],
    });

    let report = builder.build();
    assert_eq!(report.dependency_status.len(), 2);
    let runtime = report.dependency("Runtime").unwrap();
    assert_eq!(runtime.status, ItemStatus::Missing);
    assert_eq!(runtime.action, Some(ResolutionAction::Installed));
}

#[test]
fn verification_only_entries_have_no_action() {
    let mut builder = ReportBuilder::new();
    builder.add_dependency_verification(&ChainVerificationReport {
        all_satisfied: true,
        items: vec![ItemVerification {
            name: "Runtime".to_string(),
            match_mode: MatchMode::Contains,
            fatal: false,
            status: ItemStatus::Installed,
            detection: DetectionResult::found(Some("6.0"), &v("0")),
        }],
    });
    let report = builder.build();
    let runtime = report.dependency("Runtime").unwrap();
    assert_eq!(runtime.action, None);
    assert!(!runtime.fatal);
}

#[test]
fn key_values_are_ordered_and_mark_absence() {
    let at = Utc.with_ymd_and_hms(2024, 5, 1, 8, 30, 0).unwrap();
    let pairs = populated().build_at(at).to_key_values();

    assert_eq!(pairs[0], ("timestamp".to_string(), "2024-05-01T08:30:00Z".to_string()));
    assert_eq!(pairs[1], ("environment.is_laptop".to_string(), "false".to_string()));

    let lookup = |key: &str| {
        pairs
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, value)| value.as_str())
    };
    assert_eq!(lookup("environment.architecture"), Some("x64"));
    assert_eq!(lookup("application_checks.0.status"), Some("MISSING"));
    assert_eq!(lookup("application_checks.0.current_version"), Some("absent"));
    assert_eq!(lookup("application_checks.0.phase"), Some("PreOperation"));
    assert_eq!(lookup("dependency_status.1.name"), Some("Codec"));
    assert_eq!(lookup("dependency_status.1.action"), Some("AlreadyPresent"));
    assert_eq!(lookup("dependency_status.0.error"), Some("absent"));
}

#[test]
fn version_change_compares_pre_and_post_checks() {
    let mut builder = ReportBuilder::new();
    builder.set_phase(Some(SessionPhase::PreOperation));
    builder.add_application_check("Widget", DetectionResult::found(Some("2.0"), &v("2.0")));
    builder.set_phase(Some(SessionPhase::PostOperation));
    builder.add_application_check("Widget", DetectionResult::found(Some("2.0"), &v("2.0")));

    let report = builder.build();
    assert_eq!(report.version_changed("Widget"), Some(false));
    assert_eq!(report.version_changed("Other"), None);
    assert_eq!(
        report
            .application_check("Widget", SessionPhase::PostOperation)
            .unwrap()
            .status,
        CheckStatus::Ok
    );
}
