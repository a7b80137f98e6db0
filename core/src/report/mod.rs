//! Run reporter — turns a finished `RunSummary` into files and an exit code.
//!
//! Three artifacts per completed run: a human-readable summary, a JSON copy
//! of the summary for `firstboot status`, and (policy permitting) the
//! completion marker whose presence makes the next invocation a no-op.

pub mod log;

pub use log::RunLog;

use chrono::{DateTime, Utc};
use tracing::info;

use crate::error::ProvisionError;
use crate::state::{write_atomic, StatePaths};
use crate::types::config::MarkerPolicy;
use crate::types::{OperationResult, RunSummary};


/// Largest exit code used for a failure count; 126 and up are reserved by shells.
pub const MAX_FAILURE_EXIT: i32 = 125;


pub struct RunReporter {
    paths: StatePaths,
    policy: MarkerPolicy,
}

impl RunReporter {
    pub fn new(paths: StatePaths, policy: MarkerPolicy) -> Self {
        RunReporter { paths, policy }
    }

    /// Build a finished summary straight from a result list.
    pub fn summarize(reconciler: &str, started_at: DateTime<Utc>, results: &[OperationResult]) -> RunSummary {
        let mut summary = RunSummary::begin_at(reconciler, started_at);
        for r in results {
            summary.record(r);
        }
        Self::finalize(summary)
    }

    /// Stamp completion time and duration.
    pub fn finalize(mut summary: RunSummary) -> RunSummary {
        summary.finish_at(Utc::now());
        summary
    }

    /// Failure count, capped so it stays a valid distinct exit status.
    pub fn exit_code(summary: &RunSummary) -> i32 {
        (summary.failed.min(MAX_FAILURE_EXIT as u32)) as i32
    }

    /// Write the summary files and, if the policy allows, the marker.
    /// Returns whether a marker was written.
    pub fn persist(&self, summary: &RunSummary) -> Result<bool, ProvisionError> {
        self.paths.ensure_dir()?;
        write_atomic(&self.paths.summary(), summary.render().as_bytes())?;
        let json = serde_json::to_vec_pretty(summary)?;
        write_atomic(&self.paths.last_run(), &json)?;

        let write_marker = match self.policy {
            MarkerPolicy::Always => true,
            MarkerPolicy::OnSuccess => summary.failed == 0,
        };
        if write_marker {
            self.persist_completion_marker(summary)?;
        } else {
            info!(
                reconciler = %summary.reconciler,
                failed = summary.failed,
                "run had failures; leaving completion marker unset"
            );
        }
        Ok(write_marker)
    }

    pub fn persist_completion_marker(&self, summary: &RunSummary) -> Result<(), ProvisionError> {
        let stamp = summary.completed_at.unwrap_or_else(Utc::now);
        let mut text = format!("completed {}\n", stamp.to_rfc3339());
        text.push_str(&summary.render());
        write_atomic(&self.paths.marker(), text.as_bytes())
    }

    pub fn marker_present(&self) -> bool {
        self.paths.marker().exists()
    }

    /// Remove the completion marker. Returns whether one existed.
    pub fn invalidate(&self) -> Result<bool, ProvisionError> {
        let marker = self.paths.marker();
        match std::fs::remove_file(&marker) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(ProvisionError::io(marker, e)),
        }
    }

    /// The summary of the most recent completed run, if any.
    pub fn load_last(&self) -> Result<Option<RunSummary>, ProvisionError> {
        let path = self.paths.last_run();
        let bytes = match std::fs::read(&path) {
            Ok(b) => b,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ProvisionError::io(path, e)),
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| ProvisionError::Config {
                path,
                message: e.to_string(),
            })
    }
}
