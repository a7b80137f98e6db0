//! Background rescheduler — hands a not-yet-ready run to a detached watcher.
//!
//! The foreground gives a `WatchJob` (including its lock) to a `Scheduler`
//! and gets nothing back; it exits 0 straight after. The watcher polls at a
//! coarse fixed interval with no attempt limit until readiness holds.

use std::cell::RefCell;
use std::fs::OpenOptions;
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{Command, Stdio};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::ProvisionError;
use crate::lock::LockHandle;
use crate::readiness::{ReadinessState, Sleeper};
use crate::state::STATE_DIR_ENV;


/// Subcommand the detached process is started with.
pub const WATCH_SUBCOMMAND: &str = "__watch";


/// Everything a watcher needs: which reconciler, where its state lives, and
/// the lock it takes over.
#[derive(Debug)]
pub struct WatchJob {
    pub reconciler: String,
    pub state_dir: PathBuf,
    pub watch_log: PathBuf,
    pub lock: LockHandle,
}


pub trait Scheduler {
    /// Start the job detached. On success the caller no longer owns the lock.
    fn detach(&self, job: WatchJob) -> Result<(), ProvisionError>;
}


/// Re-executes the current binary as `<exe> __watch <reconciler>` in its
/// own session, output appended to the watch log.
pub struct ProcessScheduler {
    exe: PathBuf,
}

impl ProcessScheduler {
    pub fn new(exe: PathBuf) -> Self {
        ProcessScheduler { exe }
    }

    pub fn current() -> Result<Self, ProvisionError> {
        let exe = std::env::current_exe()
            .map_err(|e| ProvisionError::Spawn(format!("cannot determine current executable: {}", e)))?;
        Ok(Self::new(exe))
    }
}

impl Scheduler for ProcessScheduler {
    fn detach(&self, job: WatchJob) -> Result<(), ProvisionError> {
        let log_file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&job.watch_log)
            .map_err(|e| ProvisionError::io(&job.watch_log, e))?;
        let log_stderr = log_file
            .try_clone()
            .map_err(|e| ProvisionError::io(&job.watch_log, e))?;

        let mut cmd = Command::new(&self.exe);
        cmd.args([WATCH_SUBCOMMAND, job.reconciler.as_str()])
            .env(STATE_DIR_ENV, &job.state_dir)
            .stdin(Stdio::null())
            .stdout(log_file)
            .stderr(log_stderr);
        // New session: the watcher outlives the foreground and its terminal.
        unsafe {
            cmd.pre_exec(|| {
                if libc::setsid() == -1 {
                    return Err(std::io::Error::last_os_error());
                }
                Ok(())
            });
        }
        let child = cmd
            .spawn()
            .map_err(|e| ProvisionError::Spawn(format!("{}: {}", self.exe.display(), e)))?;
        let pid = child.id();

        if let Err(e) = job.lock.transfer(pid) {
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGTERM);
            }
            return Err(e);
        }
        info!(reconciler = %job.reconciler, pid, log = %job.watch_log.display(), "background watcher detached");
        Ok(())
    }
}


/// Test double: remembers detached reconcilers and drops their locks.
#[derive(Default)]
pub struct RecordingScheduler {
    detached: RefCell<Vec<String>>,
}

impl RecordingScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn detached(&self) -> Vec<String> {
        self.detached.borrow().clone()
    }
}

impl Scheduler for RecordingScheduler {
    fn detach(&self, job: WatchJob) -> Result<(), ProvisionError> {
        self.detached.borrow_mut().push(job.reconciler.clone());
        Ok(())
    }
}


/// Poll `check` every `interval` until it reports ready. Sleeps before each
/// check, never gives up. Returns the number of checks made.
pub fn watch_until_ready(
    check: &dyn Fn() -> ReadinessState,
    interval: Duration,
    sleeper: &dyn Sleeper,
) -> u64 {
    let mut polls: u64 = 0;
    loop {
        sleeper.sleep(interval);
        polls += 1;
        let state = check();
        if state.ready {
            info!(polls, reason = %state.reason, "readiness reached in background");
            return polls;
        }
        debug!(polls, reason = %state.reason, "still not ready");
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::lock::{acquire, read_owner, LockAttempt};
    use crate::readiness::RecordingSleeper;
    use std::cell::Cell;

    #[test]
    fn watch_polls_at_fixed_interval_until_ready() {
        let calls = Cell::new(0u32);
        let check = || {
            calls.set(calls.get() + 1);
            if calls.get() >= 5 {
                ReadinessState::ready("ok")
            } else {
                ReadinessState::not_ready("not yet")
            }
        };
        let sleeper = RecordingSleeper::new();
        let polls = watch_until_ready(&check, Duration::from_secs(60), &sleeper);
        assert_eq!(polls, 5);
        assert_eq!(sleeper.slept(), vec![Duration::from_secs(60); 5]);
    }

    #[test]
    fn watch_has_no_attempt_ceiling() {
        let calls = Cell::new(0u32);
        let check = || {
            calls.set(calls.get() + 1);
            ReadinessState {
                ready: calls.get() > 1_000,
                reason: String::new(),
            }
        };
        let polls = watch_until_ready(&check, Duration::from_secs(1), &RecordingSleeper::new());
        assert_eq!(polls, 1_001);
    }

    #[test]
    fn recording_scheduler_takes_job() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("gnome-config.lock");
        let lock = match acquire(&lock_path).unwrap() {
            LockAttempt::Acquired(h) => h,
            LockAttempt::AlreadyLocked { .. } => panic!("unexpected contention"),
        };
        let sched = RecordingScheduler::new();
        sched
            .detach(WatchJob {
                reconciler: "gnome-config".into(),
                state_dir: dir.path().to_path_buf(),
                watch_log: dir.path().join("gnome-config.watch.log"),
                lock,
            })
            .unwrap();
        assert_eq!(sched.detached(), vec!["gnome-config"]);
        assert!(!lock_path.exists());
    }

    #[test]
    fn process_scheduler_transfers_lock_to_child() {
        let dir = tempfile::tempdir().unwrap();
        let lock_path = dir.path().join("flatpak-install.lock");
        let lock = match acquire(&lock_path).unwrap() {
            LockAttempt::Acquired(h) => h,
            LockAttempt::AlreadyLocked { .. } => panic!("unexpected contention"),
        };
        // `true` ignores its arguments and exits at once.
        let sched = ProcessScheduler::new(PathBuf::from("/bin/true"));
        sched
            .detach(WatchJob {
                reconciler: "flatpak-install".into(),
                state_dir: dir.path().to_path_buf(),
                watch_log: dir.path().join("flatpak-install.watch.log"),
                lock,
            })
            .unwrap();
        let owner = read_owner(&lock_path).unwrap();
        assert_ne!(owner, std::process::id());
        assert!(dir.path().join("flatpak-install.watch.log").exists());
    }
}
