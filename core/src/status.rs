//! Status view of one reconciler's state directory.

use serde::Serialize;

use crate::error::ProvisionError;
use crate::lock::{live_owner, read_owner};
use crate::report::RunReporter;
use crate::state::StatePaths;
use crate::types::config::MarkerPolicy;
use crate::types::RunSummary;


#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct StatusReport {
    pub reconciler: String,
    pub completed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lock_owner: Option<u32>,
    pub running: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_run: Option<RunSummary>,
}

impl StatusReport {
    pub fn collect(paths: &StatePaths) -> Result<StatusReport, ProvisionError> {
        let reporter = RunReporter::new(paths.clone(), MarkerPolicy::default());
        let lock_owner = read_owner(&paths.lock());
        Ok(StatusReport {
            reconciler: paths.name.clone(),
            completed: reporter.marker_present(),
            lock_owner,
            running: live_owner(&paths.lock()).is_some(),
            last_run: reporter.load_last()?,
        })
    }

    /// One line of state, then the last summary if there is one.
    pub fn render(&self) -> String {
        let state = match self.lock_owner {
            Some(pid) if self.running => format!("running (pid {})", pid),
            _ if self.completed => "completed".to_string(),
            Some(pid) => format!("pending (stale lock from pid {})", pid),
            None => "pending".to_string(),
        };
        let mut out = format!("{}: {}\n", self.reconciler, state);
        if let Some(summary) = &self.last_run {
            for line in summary.render().lines() {
                out.push_str("  ");
                out.push_str(line);
                out.push('\n');
            }
        }
        out
    }
}
