use std::fmt;

use serde::{Deserialize, Serialize};

use crate::convergence::diagnose::Diagnosis;
use crate::types::operation::Operation;


#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Success,
    Failure,
    Skipped,
}

impl fmt::Display for OperationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationStatus::Success => write!(f, "SUCCESS"),
            OperationStatus::Failure => write!(f, "FAILURE"),
            OperationStatus::Skipped => write!(f, "SKIPPED"),
        }
    }
}


/// Outcome of executing one `Operation`. Built once by the batch executor.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OperationResult {
    pub operation: Operation,
    pub status: OperationStatus,
    pub stdout: String,
    pub stderr: String,
    /// `None` when the command was never run or could not be spawned.
    pub exit_code: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diagnosis: Option<Diagnosis>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_reason: Option<String>,
}

impl OperationResult {
    pub fn skipped(operation: Operation, reason: impl Into<String>) -> Self {
        OperationResult {
            operation,
            status: OperationStatus::Skipped,
            stdout: String::new(),
            stderr: String::new(),
            exit_code: None,
            diagnosis: None,
            skip_reason: Some(reason.into()),
        }
    }

    pub fn is_failure(&self) -> bool {
        self.status == OperationStatus::Failure
    }
}
