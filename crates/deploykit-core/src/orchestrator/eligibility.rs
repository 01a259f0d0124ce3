//! Host eligibility rules evaluated in the pre-operation phase.

use serde::{Deserialize, Serialize};

use crate::detect::EnvironmentSnapshot;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "kebab-case")]
pub enum EligibilityRule {
    RequireAdmin,
    RequireDomainJoined,
    DenyServer,
    DenyLaptop,
    DenyVirtualMachine,
    DenyTerminalServer,
    RequireArchitecture { architecture: String },
    /// Allowed local-hour window `[start, end)`; wraps past midnight when `start > end`.
    Hours { start: u8, end: u8 },
}

impl EligibilityRule {
    /// `Err` carries the reason the host is ineligible.
    pub fn check(&self, env: &EnvironmentSnapshot) -> Result<(), String> {
        let ok = match self {
            EligibilityRule::RequireAdmin => env.is_admin,
            EligibilityRule::RequireDomainJoined => env.is_domain_joined,
            EligibilityRule::DenyServer => !env.is_server,
            EligibilityRule::DenyLaptop => !env.is_laptop,
            EligibilityRule::DenyVirtualMachine => !env.is_virtual_machine,
            EligibilityRule::DenyTerminalServer => !env.is_terminal_server,
            EligibilityRule::RequireArchitecture { architecture } => {
                env.architecture.eq_ignore_ascii_case(architecture)
            }
            EligibilityRule::Hours { start, end } => within_hours(env.hour, *start, *end),
        };
        if ok { Ok(()) } else { Err(self.describe(env)) }
    }

    fn describe(&self, env: &EnvironmentSnapshot) -> String {
        match self {
            EligibilityRule::RequireAdmin => "administrative rights are required".to_string(),
            EligibilityRule::RequireDomainJoined => "host must be domain-joined".to_string(),
            EligibilityRule::DenyServer => "not permitted on server hosts".to_string(),
            EligibilityRule::DenyLaptop => "not permitted on laptops".to_string(),
            EligibilityRule::DenyVirtualMachine => "not permitted on virtual machines".to_string(),
            EligibilityRule::DenyTerminalServer => "not permitted on terminal servers".to_string(),
            EligibilityRule::RequireArchitecture { architecture } => format!(
                "requires {architecture} architecture, host is {}",
                env.architecture
            ),
            EligibilityRule::Hours { start, end } => format!(
                "only permitted between {start:02}:00 and {end:02}:00, current hour is {:02}",
                env.hour
            ),
        }
    }
}

fn within_hours(hour: u8, start: u8, end: u8) -> bool {
    match start.cmp(&end) {
        std::cmp::Ordering::Less => hour >= start && hour < end,
        std::cmp::Ordering::Greater => hour >= start || hour < end,
        // Equal bounds mean no restriction.
        std::cmp::Ordering::Equal => true,
    }
}

/// First failing rule wins.
pub fn evaluate(rules: &[EligibilityRule], env: &EnvironmentSnapshot) -> Result<(), String> {
    rules.iter().try_for_each(|rule| rule.check(env))
}
