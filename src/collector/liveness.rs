//! Classifies monitored applications from the process table and a port probe.

use crate::config::ApplicationSpec;
use crate::core::{ApplicationStatus, PortProbe, ProcessTable};
use std::collections::BTreeMap;
use tracing::debug;

/// Returns `true` when `actual` names the configured process.
///
/// Matching is case-insensitive and also accepts the configured name anywhere
/// inside the actual one, so `sqlservr` matches `sqlservr.exe`. A very short
/// configured name can therefore match unrelated processes.
pub fn process_name_matches(configured: &str, actual: &str) -> bool {
    if configured.is_empty() {
        return false;
    }
    let configured = configured.to_lowercase();
    let actual = actual.to_lowercase();
    actual == configured || actual.contains(&configured)
}

/// Combines a process table and a port probe into per-application verdicts.
pub struct LivenessClassifier {
    processes: Box<dyn ProcessTable>,
    probe: Box<dyn PortProbe>,
}

impl LivenessClassifier {
    pub fn new(processes: Box<dyn ProcessTable>, probe: Box<dyn PortProbe>) -> Self {
        Self { processes, probe }
    }

    /// Refreshes the process table and classifies a single application.
    pub async fn classify(&mut self, spec: &ApplicationSpec) -> ApplicationStatus {
        self.processes.refresh();
        self.classify_snapshot(spec).await
    }

    async fn classify_snapshot(&self, spec: &ApplicationSpec) -> ApplicationStatus {
        let process_running = self
            .processes
            .process_names()
            .iter()
            .any(|name| process_name_matches(&spec.process_name, name));
        let port_active = self.probe.is_active(spec.port).await;
        let status = ApplicationStatus::from_checks(process_running, port_active);
        debug!(
            process = %spec.process_name,
            port = spec.port,
            process_running,
            port_active,
            %status,
            "Classified application"
        );
        status
    }

    /// Refreshes the process table once and classifies every application.
    ///
    /// The result always holds exactly the configured keys.
    pub async fn classify_all(
        &mut self,
        applications: &BTreeMap<String, ApplicationSpec>,
    ) -> BTreeMap<String, ApplicationStatus> {
        self.processes.refresh();
        let mut statuses = BTreeMap::new();
        for (name, spec) in applications {
            statuses.insert(name.clone(), self.classify_snapshot(spec).await);
        }
        statuses
    }
}
