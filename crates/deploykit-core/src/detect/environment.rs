//! Host classification snapshot, computed once per session.

use chrono::Timelike;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ProbeError;
use crate::host::HostFacts;

/// Immutable host facts shared by every conditional branch of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentSnapshot {
    pub is_laptop: bool,
    pub is_domain_joined: bool,
    pub is_server: bool,
    pub is_virtual_machine: bool,
    pub is_terminal_server: bool,
    pub is_admin: bool,
    pub hour: u8,
    pub architecture: String,
}

/// Evaluate every host fact; a failing check degrades to `false`.
pub fn probe_environment(facts: &dyn HostFacts) -> EnvironmentSnapshot {
    EnvironmentSnapshot {
        is_laptop: flag("is_laptop", facts.is_laptop()),
        is_domain_joined: flag("is_domain_joined", facts.is_domain_joined()),
        is_server: flag("is_server", facts.is_server()),
        is_virtual_machine: flag("is_virtual_machine", facts.is_virtual_machine()),
        is_terminal_server: flag("is_terminal_server", facts.is_terminal_server()),
        is_admin: flag("is_admin", facts.is_admin()),
        hour: facts.local_hour().unwrap_or_else(|err| {
            warn!(error = %err, "hour-of-day check failed, using system clock");
            chrono::Local::now().hour() as u8
        }),
        architecture: facts.architecture().unwrap_or_else(|err| {
            warn!(error = %err, "architecture check failed");
            "unknown".to_string()
        }),
    }
}

fn flag(check: &str, result: Result<bool, ProbeError>) -> bool {
    match result {
        Ok(value) => value,
        Err(err) => {
            warn!(check, error = %err, "environment check failed, assuming false");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::memory::{EnvironmentFacts, MemoryHost};

    #[test]
    fn snapshot_copies_facts() {
        let host = MemoryHost::new().with_facts(EnvironmentFacts {
            is_laptop: true,
            is_virtual_machine: true,
            hour: 7,
            ..EnvironmentFacts::default()
        });
        let snapshot = probe_environment(&host);
        assert!(snapshot.is_laptop);
        assert!(snapshot.is_virtual_machine);
        assert!(!snapshot.is_server);
        assert_eq!(snapshot.hour, 7);
        assert_eq!(snapshot.architecture, "x64");
    }

    #[test]
    fn failing_check_degrades_only_that_field() {
        let host = MemoryHost::new()
            .with_facts(EnvironmentFacts {
                is_laptop: true,
                is_server: true,
                ..EnvironmentFacts::default()
            })
            .with_failing_check("is_laptop")
            .with_failing_check("architecture");
        let snapshot = probe_environment(&host);
        assert!(!snapshot.is_laptop);
        assert!(snapshot.is_server);
        assert!(snapshot.is_admin);
        assert_eq!(snapshot.architecture, "unknown");
    }
}
