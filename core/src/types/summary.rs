use std::fmt::Write as _;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::convergence::diagnose::Diagnosis;
use crate::types::operation::Operation;
use crate::types::result::{OperationResult, OperationStatus};


/// One failed operation, as remembered by the summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FailedOperation {
    pub operation: Operation,
    pub exit_code: Option<i32>,
    pub diagnosis: Option<Diagnosis>,
}


/// Aggregate over every `OperationResult` of one run.
///
/// Created empty with [`RunSummary::begin`], fed by the batch executor via
/// [`RunSummary::record`], and stamped by the reporter at the end.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RunSummary {
    pub reconciler: String,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
    pub succeeded: u32,
    pub failed: u32,
    pub skipped: u32,
    pub failures: Vec<FailedOperation>,
}

impl RunSummary {
    pub fn begin(reconciler: &str) -> Self {
        Self::begin_at(reconciler, Utc::now())
    }

    pub fn begin_at(reconciler: &str, started_at: DateTime<Utc>) -> Self {
        RunSummary {
            reconciler: reconciler.to_string(),
            started_at,
            completed_at: None,
            duration_ms: 0,
            succeeded: 0,
            failed: 0,
            skipped: 0,
            failures: Vec::new(),
        }
    }

    pub fn record(&mut self, result: &OperationResult) {
        match result.status {
            OperationStatus::Success => self.succeeded += 1,
            OperationStatus::Skipped => self.skipped += 1,
            OperationStatus::Failure => {
                self.failed += 1;
                self.failures.push(FailedOperation {
                    operation: result.operation.clone(),
                    exit_code: result.exit_code,
                    diagnosis: result.diagnosis,
                });
            }
        }
    }

    pub fn total(&self) -> u32 {
        self.succeeded + self.failed + self.skipped
    }

    /// Stamp completion time and duration. Calling twice keeps the first stamp.
    pub fn finish_at(&mut self, completed_at: DateTime<Utc>) {
        if self.completed_at.is_some() {
            return;
        }
        let elapsed = completed_at.signed_duration_since(self.started_at);
        self.duration_ms = elapsed.num_milliseconds().max(0) as u64;
        self.completed_at = Some(completed_at);
    }

    /// Human-readable multi-line rendering used for the summary file and
    /// the completion marker.
    pub fn render(&self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "reconciler: {}", self.reconciler);
        let _ = writeln!(out, "started:    {}", self.started_at.to_rfc3339());
        if let Some(done) = self.completed_at {
            let _ = writeln!(out, "completed:  {}", done.to_rfc3339());
        }
        let _ = writeln!(out, "duration:   {} ms", self.duration_ms);
        let _ = writeln!(
            out,
            "operations: {} total, {} succeeded, {} failed, {} skipped",
            self.total(),
            self.succeeded,
            self.failed,
            self.skipped
        );
        if !self.failures.is_empty() {
            let _ = writeln!(out, "failed operations:");
            for f in &self.failures {
                let code = f
                    .exit_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "-".into());
                let diagnosis = f
                    .diagnosis
                    .map(|d| d.to_string())
                    .unwrap_or_else(|| "unknown".into());
                let _ = writeln!(out, "  - {} (exit {}, {})", f.operation, code, diagnosis);
            }
        }
        out
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn result(op: Operation, status: OperationStatus) -> OperationResult {
        OperationResult {
            operation: op,
            status,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: if status == OperationStatus::Failure { Some(1) } else { Some(0) },
            diagnosis: if status == OperationStatus::Failure {
                Some(Diagnosis::MissingSchema)
            } else {
                None
            },
            skip_reason: None,
        }
    }

    #[test]
    fn record_tallies_each_status() {
        let mut s = RunSummary::begin("gnome-config");
        s.record(&result(Operation::set("a", "b", "1"), OperationStatus::Success));
        s.record(&result(Operation::set("a", "c", "1"), OperationStatus::Failure));
        s.record(&result(Operation::enable("x"), OperationStatus::Skipped));
        assert_eq!((s.succeeded, s.failed, s.skipped), (1, 1, 1));
        assert_eq!(s.total(), 3);
        assert_eq!(s.failures.len(), 1);
        assert_eq!(s.failures[0].operation.target, "a c");
    }

    #[test]
    fn finish_computes_duration_once() {
        let start = Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap();
        let mut s = RunSummary::begin_at("flatpak-install", start);
        s.finish_at(start + chrono::Duration::milliseconds(1500));
        assert_eq!(s.duration_ms, 1500);
        s.finish_at(start + chrono::Duration::seconds(10));
        assert_eq!(s.duration_ms, 1500);
        assert_eq!(s.completed_at, Some(start + chrono::Duration::milliseconds(1500)));
    }

    #[test]
    fn render_lists_failures() {
        let mut s = RunSummary::begin("gnome-config");
        s.record(&result(
            Operation::set("org.gnome.shell.extensions.dash-to-dock", "dock-position", "'BOTTOM'"),
            OperationStatus::Failure,
        ));
        s.finish_at(Utc::now());
        let text = s.render();
        assert!(text.contains("1 failed"));
        assert!(text.contains("dock-position"));
        assert!(text.contains("schema missing"));
    }
}
