//! Append-only run log.
//!
//! One block per operation: the invocation, exit code, captured streams and
//! diagnosis. Write errors are swallowed; a broken log never stops a run.

use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::Path;

use chrono::Utc;

use crate::error::ProvisionError;
use crate::types::{OperationResult, OperationStatus};


pub struct RunLog {
    out: Box<dyn Write>,
}

impl RunLog {
    pub fn open(path: &Path) -> Result<RunLog, ProvisionError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ProvisionError::io(parent, e))?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| ProvisionError::io(path, e))?;
        Ok(RunLog { out: Box::new(file) })
    }

    /// A log that drops everything.
    pub fn discard() -> RunLog {
        RunLog {
            out: Box::new(io::sink()),
        }
    }

    pub fn line(&mut self, message: &str) {
        let _ = writeln!(
            self.out,
            "[{}] {}",
            Utc::now().format("%Y-%m-%dT%H:%M:%SZ"),
            message
        );
    }

    pub fn record(&mut self, index: usize, total: usize, result: &OperationResult) {
        self.line(&format!("({}/{}) {}", index, total, result.operation));
        let mut block = String::new();
        match result.status {
            OperationStatus::Skipped => {
                let reason = result.skip_reason.as_deref().unwrap_or("no reason given");
                block.push_str(&format!("    SKIPPED: {}\n", reason));
            }
            status => {
                let code = result
                    .exit_code
                    .map(|c| c.to_string())
                    .unwrap_or_else(|| "-".into());
                block.push_str(&format!("    {} (exit {})\n", status, code));
                push_stream(&mut block, "stdout", &result.stdout);
                push_stream(&mut block, "stderr", &result.stderr);
                if let Some(d) = result.diagnosis {
                    block.push_str(&format!("    diagnosis: {}\n", d));
                }
            }
        }
        let _ = self.out.write_all(block.as_bytes());
        let _ = self.out.flush();
    }
}

fn push_stream(block: &mut String, label: &str, text: &str) {
    let text = text.trim_end();
    if text.is_empty() {
        return;
    }
    block.push_str(&format!("    {}:\n", label));
    for line in text.lines() {
        block.push_str("      ");
        block.push_str(line);
        block.push('\n');
    }
}
