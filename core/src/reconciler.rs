//! Reconciler — one provisioning run from lock to report.
//!
//! `run` is the foreground path: marker check, lock, fatal command check,
//! bounded readiness wait, then either the batch or a hand-off to the
//! scheduler. `watch` is the background path the detached process takes.

use tracing::{info, warn};

use crate::convergence::executor::{Backends, BatchExecutor};
use crate::error::ProvisionError;
use crate::infrastructure::runner::ProcessRunner;
use crate::infrastructure::CommandRunner;
use crate::lock::{self, LockAttempt, LockHandle};
use crate::readiness::{probe_all, Preflight, Probe, ReadinessProber, ReadinessState, Sleeper, ThreadSleeper, WaitOutcome};
use crate::report::{RunLog, RunReporter};
use crate::reschedule::{watch_until_ready, Scheduler, WatchJob};
use crate::state::StatePaths;
use crate::types::config::ReconcilerConfig;
use crate::types::{Operation, RunSummary};

use std::time::Duration;


// ---------------------------------------------------------------------------
// RunOutcome
// ---------------------------------------------------------------------------

/// How an invocation ended. Everything except `Completed` is a no-op exit 0.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The completion marker was already present.
    AlreadyCompleted,
    /// Another live process holds the lock.
    AlreadyLocked { owner: u32 },
    /// Not ready in the foreground budget; a watcher took over.
    Backgrounded,
    Completed(RunSummary),
}

impl RunOutcome {
    pub fn exit_code(&self) -> i32 {
        match self {
            RunOutcome::Completed(summary) => RunReporter::exit_code(summary),
            _ => 0,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            RunOutcome::AlreadyCompleted => "already completed",
            RunOutcome::AlreadyLocked { .. } => "already running",
            RunOutcome::Backgrounded => "backgrounded",
            RunOutcome::Completed(_) => "completed",
        }
    }
}


// ---------------------------------------------------------------------------
// Reconciler
// ---------------------------------------------------------------------------

pub struct Reconciler {
    config: ReconcilerConfig,
    paths: StatePaths,
    operations: Vec<Operation>,
    probes: Vec<Box<dyn Probe>>,
    preflight: Option<Box<dyn Preflight>>,
    required_commands: Vec<String>,
    runner: Box<dyn CommandRunner>,
    backends: Backends,
    sleeper: Box<dyn Sleeper>,
}

impl Reconciler {
    pub fn new(config: ReconcilerConfig, paths: StatePaths, operations: Vec<Operation>) -> Self {
        Reconciler {
            config,
            paths,
            operations,
            probes: Vec::new(),
            preflight: None,
            required_commands: Vec::new(),
            runner: Box::new(ProcessRunner),
            backends: Backends::default(),
            sleeper: Box::new(ThreadSleeper),
        }
    }

    pub fn with_probe(mut self, probe: Box<dyn Probe>) -> Self {
        self.probes.push(probe);
        self
    }

    pub fn with_preflight(mut self, preflight: Box<dyn Preflight>) -> Self {
        self.preflight = Some(preflight);
        self
    }

    /// A host command whose absence aborts the run (exit 127).
    pub fn requires(mut self, program: &str) -> Self {
        self.required_commands.push(program.to_string());
        self
    }

    /// Runner used only to look up required commands.
    pub fn with_runner(mut self, runner: Box<dyn CommandRunner>) -> Self {
        self.runner = runner;
        self
    }

    pub fn with_backends(mut self, backends: Backends) -> Self {
        self.backends = backends;
        self
    }

    pub fn with_sleeper(mut self, sleeper: Box<dyn Sleeper>) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    pub fn paths(&self) -> &StatePaths {
        &self.paths
    }

    pub fn reporter(&self) -> RunReporter {
        RunReporter::new(self.paths.clone(), self.config.marker_policy)
    }

    /// Foreground invocation.
    pub fn run(&self, scheduler: &dyn Scheduler) -> Result<RunOutcome, ProvisionError> {
        let reporter = self.reporter();
        if reporter.marker_present() {
            info!(reconciler = %self.name(), "already completed; nothing to do");
            return Ok(RunOutcome::AlreadyCompleted);
        }

        self.paths.ensure_dir()?;
        let mut lock = match lock::acquire(&self.paths.lock())? {
            LockAttempt::Acquired(handle) => handle,
            LockAttempt::AlreadyLocked { owner } => {
                info!(reconciler = %self.name(), owner, "another instance is running");
                return Ok(RunOutcome::AlreadyLocked { owner });
            }
        };
        // A run may have finished between the first check and the lock.
        if reporter.marker_present() {
            return Ok(RunOutcome::AlreadyCompleted);
        }

        self.check_required_commands()?;

        let prober = ReadinessProber::new(&self.probes, self.sleeper.as_ref());
        let ready = match prober.wait_until_ready(&self.config.readiness) {
            WaitOutcome::Ready { attempts } => {
                info!(reconciler = %self.name(), attempts, "preconditions met");
                self.run_preflight()
            }
            WaitOutcome::TimedOut { attempts, last } => {
                info!(reconciler = %self.name(), attempts, reason = %last.reason, "not ready in time");
                last
            }
        };

        if !ready.ready {
            scheduler.detach(WatchJob {
                reconciler: self.name().to_string(),
                state_dir: self.paths.dir.clone(),
                watch_log: self.paths.watch_log(),
                lock,
            })?;
            info!(reconciler = %self.name(), "handed off to background watcher");
            return Ok(RunOutcome::Backgrounded);
        }

        let summary = self.apply()?;
        lock.release();
        Ok(RunOutcome::Completed(summary))
    }

    /// Background invocation: take over the lock, poll until ready, apply.
    pub fn watch(&self) -> Result<RunOutcome, ProvisionError> {
        self.paths.ensure_dir()?;
        let lock = match lock::adopt(&self.paths.lock(), self.config.adopt_timeout_ms)? {
            LockAttempt::Acquired(handle) => handle,
            LockAttempt::AlreadyLocked { owner } => {
                info!(reconciler = %self.name(), owner, "lock owned elsewhere; watcher exiting");
                return Ok(RunOutcome::AlreadyLocked { owner });
            }
        };
        self.watch_with(lock)
    }

    /// The watch loop for a lock this process already holds.
    pub fn watch_with(&self, mut lock: LockHandle) -> Result<RunOutcome, ProvisionError> {
        if self.reporter().marker_present() {
            return Ok(RunOutcome::AlreadyCompleted);
        }
        self.check_required_commands()?;

        let interval = Duration::from_secs(self.config.poll_interval_secs);
        info!(
            reconciler = %self.name(),
            interval_secs = self.config.poll_interval_secs,
            "watching for readiness"
        );
        let check = || self.ready_now();
        watch_until_ready(&check, interval, self.sleeper.as_ref());

        let summary = self.apply()?;
        lock.release();
        Ok(RunOutcome::Completed(summary))
    }

    /// Probes, then the preflight. Used by every watcher poll.
    pub fn ready_now(&self) -> ReadinessState {
        let state = probe_all(&self.probes);
        if !state.ready {
            return state;
        }
        self.run_preflight()
    }

    fn run_preflight(&self) -> ReadinessState {
        match &self.preflight {
            None => ReadinessState::ready("no preflight"),
            Some(p) => {
                let state = p.prepare();
                if !state.ready {
                    warn!(reconciler = %self.name(), preflight = p.name(), reason = %state.reason, "preflight failed");
                }
                state
            }
        }
    }

    fn check_required_commands(&self) -> Result<(), ProvisionError> {
        for program in &self.required_commands {
            if !self.runner.has_command(program) {
                return Err(ProvisionError::MissingCommand(program.clone()));
            }
        }
        Ok(())
    }

    /// Run the batch and persist its report. The caller holds the lock.
    fn apply(&self) -> Result<RunSummary, ProvisionError> {
        let mut log = RunLog::open(&self.paths.run_log())?;
        log.line(&format!(
            "=== {} run started (pid {}, {} operations) ===",
            self.name(),
            std::process::id(),
            self.operations.len()
        ));

        let mut summary = RunSummary::begin(self.name());
        BatchExecutor::new(&self.backends).execute(&self.operations, &mut summary, &mut log);
        let summary = RunReporter::finalize(summary);

        log.line(&format!(
            "=== finished: {} succeeded, {} failed, {} skipped in {} ms ===",
            summary.succeeded, summary.failed, summary.skipped, summary.duration_ms
        ));
        let marked = self.reporter().persist(&summary)?;
        info!(
            reconciler = %self.name(),
            succeeded = summary.succeeded,
            failed = summary.failed,
            skipped = summary.skipped,
            marked,
            "run complete"
        );
        Ok(summary)
    }
}
