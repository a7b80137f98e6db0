//! Batch executor — applies an ordered operation list against the backends.
//!
//! Operations run strictly in declaration order. Each produces exactly one
//! `OperationResult`; a failure is recorded and the batch moves on.

use std::rc::Rc;

use tracing::{debug, warn};

use crate::convergence::diagnose::classify;
use crate::infrastructure::{AppCatalog, CommandOutput, ExtensionManager, SettingsBackend};
use crate::report::RunLog;
use crate::types::{Operation, OperationKind, OperationResult, OperationStatus, Precondition, RunSummary};

/// The external stores a batch may touch. A reconciler only wires the
/// ones its operations need.
#[derive(Clone, Default)]
pub struct Backends {
    pub settings: Option<Rc<dyn SettingsBackend>>,
    pub extensions: Option<Rc<dyn ExtensionManager>>,
    pub catalog: Option<Rc<dyn AppCatalog>>,
}

/// Executes a batch of operations, never aborting on a single failure.
pub struct BatchExecutor<'a> {
    backends: &'a Backends,
}

impl<'a> BatchExecutor<'a> {
    pub fn new(backends: &'a Backends) -> Self {
        BatchExecutor { backends }
    }

    /// Apply `operations` in order. Every result is tallied into `summary`
    /// and appended to `log` before the next operation starts.
    pub fn execute(
        &self,
        operations: &[Operation],
        summary: &mut RunSummary,
        log: &mut RunLog,
    ) -> Vec<OperationResult> {
        let mut results = Vec::with_capacity(operations.len());
        for (index, op) in operations.iter().enumerate() {
            let result = self.apply(op);
            match result.status {
                OperationStatus::Failure => warn!(
                    operation = %op,
                    diagnosis = ?result.diagnosis,
                    "operation failed"
                ),
                status => debug!(operation = %op, %status, "operation finished"),
            }
            log.record(index + 1, operations.len(), &result);
            summary.record(&result);
            results.push(result);
        }
        results
    }

    fn apply(&self, op: &Operation) -> OperationResult {
        if let Some(pre) = &op.precondition {
            match self.check(pre) {
                Ok(true) => {}
                Ok(false) => {
                    return OperationResult::skipped(
                        op.clone(),
                        format!("precondition not met: {}", pre),
                    )
                }
                Err(e) => {
                    return OperationResult::skipped(
                        op.clone(),
                        format!("precondition {} could not be checked: {}", pre, e),
                    )
                }
            }
        }

        let outcome = match op.kind {
            OperationKind::Set => self.apply_set(op),
            OperationKind::Enable => match &self.backends.extensions {
                Some(ext) => ext.enable(&op.target),
                None => Err("no extension manager configured".into()),
            },
            OperationKind::Install => {
                let catalog = match &self.backends.catalog {
                    Some(c) => c,
                    None => return failure(op.clone(), Err("no application catalog configured".into())),
                };
                if catalog.is_installed(&op.target) {
                    return OperationResult::skipped(op.clone(), "already installed");
                }
                catalog.install(&op.desired_value, &op.target)
            }
        };

        match outcome {
            Ok(out) if out.success() => OperationResult {
                operation: op.clone(),
                status: OperationStatus::Success,
                stdout: out.stdout,
                stderr: out.stderr,
                exit_code: out.exit_code,
                diagnosis: None,
                skip_reason: None,
            },
            other => failure(op.clone(), other),
        }
    }

    fn apply_set(&self, op: &Operation) -> Result<CommandOutput, String> {
        let settings = self
            .backends
            .settings
            .as_ref()
            .ok_or_else(|| "no settings backend configured".to_string())?;
        let (schema, key) = op
            .settings_key()
            .ok_or_else(|| format!("malformed settings target '{}'", op.target))?;
        settings.set(schema, key, &op.desired_value)
    }

    fn check(&self, pre: &Precondition) -> Result<bool, String> {
        match pre {
            Precondition::ExtensionInstalled(uuid) => self
                .extensions()
                .map(|ext| ext.is_installed(uuid)),
            Precondition::ExtensionEnabled(uuid) => self
                .extensions()
                .map(|ext| ext.is_enabled(uuid)),
            Precondition::SchemaAvailable(schema) => {
                let settings = self
                    .backends
                    .settings
                    .as_ref()
                    .ok_or_else(|| "no settings backend configured".to_string())?;
                let schemas = settings.list_available_capabilities()?;
                Ok(schemas.iter().any(|s| s == schema))
            }
        }
    }

    fn extensions(&self) -> Result<&Rc<dyn ExtensionManager>, String> {
        self.backends
            .extensions
            .as_ref()
            .ok_or_else(|| "no extension manager configured".to_string())
    }
}

fn failure(operation: Operation, outcome: Result<CommandOutput, String>) -> OperationResult {
    let (stdout, stderr, exit_code) = match outcome {
        Ok(out) => (out.stdout, out.stderr, out.exit_code),
        Err(e) => (String::new(), e, None),
    };
    let diagnosis = Some(classify(&stderr));
    OperationResult {
        operation,
        status: OperationStatus::Failure,
        stdout,
        stderr,
        exit_code,
        diagnosis,
        skip_reason: None,
    }
}
