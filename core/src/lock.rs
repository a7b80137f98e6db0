//! Lock manager — one live run per reconciler per host.
//!
//! The lock file holds the owning process id followed by the kernel boot id
//! it was written under. A lock is stale, and silently reclaimed, when its
//! owner is dead, when it was written during an earlier boot (the pid may
//! since have been reused), or when its content is not a pid at all. The
//! read-check-write sequence runs under an exclusive `flock` on a sibling
//! `.guard` file so two acquirers can never both see "stale" and both win.
//!
//! The lock file is removed when the handle is released or dropped, and by a
//! signal handler on SIGINT/SIGTERM/SIGHUP while a handle is armed.

use std::ffi::{CStr, CString};
use std::os::raw::c_char;
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::sync::Once;
use std::time::{Duration, Instant};

use tracing::{debug, info, warn};

use crate::error::ProvisionError;
use crate::state::write_atomic;


const GUARD_TIMEOUT_MS: u64 = 5_000;
const BOOT_ID_PATH: &str = "/proc/sys/kernel/random/boot_id";


/// Result of trying to take the run slot.
#[derive(Debug)]
pub enum LockAttempt {
    Acquired(LockHandle),
    /// Another live process owns the slot.
    AlreadyLocked { owner: u32 },
}


/// Exclusive ownership of a reconciler's run slot.
#[derive(Debug)]
pub struct LockHandle {
    owner_pid: u32,
    path: PathBuf,
    armed: bool,
}


/// Owner pid plus the boot it was recorded in.
#[derive(Debug, Clone, PartialEq)]
struct LockRecord {
    pid: u32,
    boot_id: Option<String>,
}

impl LockRecord {
    fn parse(content: &str) -> Option<LockRecord> {
        let mut fields = content.split_whitespace();
        let pid = fields.next()?.parse::<u32>().ok().filter(|p| *p > 0)?;
        Some(LockRecord {
            pid,
            boot_id: fields.next().map(str::to_string),
        })
    }

    /// Written during the current boot. Always true where the kernel does not
    /// expose a boot id.
    fn from_this_boot(&self) -> bool {
        match current_boot_id() {
            Some(current) => self.boot_id.as_deref() == Some(current.as_str()),
            None => true,
        }
    }

    fn is_live(&self) -> bool {
        self.from_this_boot() && is_pid_alive(self.pid)
    }
}


/// Lock file content naming `pid` as owner in the current boot.
pub fn lock_content(pid: u32) -> String {
    match current_boot_id() {
        Some(boot) => format!("{} {}\n", pid, boot),
        None => format!("{}\n", pid),
    }
}

/// Kernel boot id, regenerated on every boot.
pub fn current_boot_id() -> Option<String> {
    std::fs::read_to_string(BOOT_ID_PATH)
        .ok()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}


/// Take the lock for the current process.
pub fn acquire(path: &Path) -> Result<LockAttempt, ProvisionError> {
    let _guard = GuardLock::take(&guard_path(path), GUARD_TIMEOUT_MS)?;

    match std::fs::read_to_string(path) {
        Ok(content) => match LockRecord::parse(&content) {
            Some(record) if record.is_live() => {
                debug!(lock = %path.display(), owner = record.pid, "lock held by live process");
                return Ok(LockAttempt::AlreadyLocked { owner: record.pid });
            }
            Some(record) if !record.from_this_boot() => {
                info!(lock = %path.display(), owner = record.pid, "reclaiming lock left by an earlier boot");
            }
            Some(record) => {
                info!(lock = %path.display(), owner = record.pid, "reclaiming stale lock");
            }
            None => {
                warn!(
                    lock = %path.display(),
                    content = %content.trim(),
                    "lock file has no valid pid; reclaiming"
                );
            }
        },
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => return Err(ProvisionError::io(path, e)),
    }

    let pid = std::process::id();
    arm_signal_cleanup(path);
    if let Err(e) = write_atomic(path, lock_content(pid).as_bytes()) {
        disarm_signal_cleanup(path);
        return Err(e);
    }
    Ok(LockAttempt::Acquired(LockHandle {
        owner_pid: pid,
        path: path.to_path_buf(),
        armed: true,
    }))
}


/// Take over a lock that another process is transferring to us.
///
/// Waits up to `timeout_ms` for the lock file to name this process. If it
/// never does, falls back to a normal `acquire` (which reclaims the lock if
/// the transferring process died first).
pub fn adopt(path: &Path, timeout_ms: u64) -> Result<LockAttempt, ProvisionError> {
    let me = std::process::id();
    let deadline = Instant::now() + Duration::from_millis(timeout_ms);
    loop {
        if read_owner(path) == Some(me) {
            arm_signal_cleanup(path);
            return Ok(LockAttempt::Acquired(LockHandle {
                owner_pid: me,
                path: path.to_path_buf(),
                armed: true,
            }));
        }
        if Instant::now() >= deadline {
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
    }
    debug!(lock = %path.display(), "lock was not handed over; trying to acquire");
    acquire(path)
}


impl LockHandle {
    pub fn owner_pid(&self) -> u32 {
        self.owner_pid
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Remove the lock file if it still names this handle's owner.
    /// Safe to call repeatedly or after the file was deleted by hand.
    pub fn release(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;
        disarm_signal_cleanup(&self.path);
        let _guard = GuardLock::take(&guard_path(&self.path), GUARD_TIMEOUT_MS).ok();
        if read_owner(&self.path) == Some(self.owner_pid) {
            let _ = std::fs::remove_file(&self.path);
        }
    }

    /// Hand the slot to another process. The lock file is rewritten with
    /// `new_owner` and this handle no longer removes it.
    pub fn transfer(mut self, new_owner: u32) -> Result<(), ProvisionError> {
        let _guard = GuardLock::take(&guard_path(&self.path), GUARD_TIMEOUT_MS)?;
        write_atomic(&self.path, lock_content(new_owner).as_bytes())?;
        self.armed = false;
        disarm_signal_cleanup(&self.path);
        info!(lock = %self.path.display(), from = self.owner_pid, to = new_owner, "lock transferred");
        Ok(())
    }
}

impl Drop for LockHandle {
    fn drop(&mut self) {
        self.release();
    }
}


/// Owner recorded in a lock file, if any, live or not.
pub fn read_owner(path: &Path) -> Option<u32> {
    read_record(path).map(|r| r.pid)
}

/// Owner recorded in a lock file if it would block `acquire` right now.
pub fn live_owner(path: &Path) -> Option<u32> {
    read_record(path).filter(LockRecord::is_live).map(|r| r.pid)
}

fn read_record(path: &Path) -> Option<LockRecord> {
    std::fs::read_to_string(path)
        .ok()
        .and_then(|c| LockRecord::parse(&c))
}

fn guard_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".guard");
    path.with_file_name(name)
}


/// Check if a process with the given PID is alive.
pub fn is_pid_alive(pid: u32) -> bool {
    if pid == 0 || pid > i32::MAX as u32 {
        return false;
    }
    // kill(pid, 0) checks if the process exists without sending a signal
    if unsafe { libc::kill(pid as libc::pid_t, 0) } == 0 {
        return true;
    }
    std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}


// ---------------------------------------------------------------------------
// Guard flock
// ---------------------------------------------------------------------------

/// Exclusive `flock` on the guard file, released on drop. The guard file
/// itself is never removed.
#[derive(Debug)]
struct GuardLock {
    file: std::fs::File,
}

impl GuardLock {
    fn take(path: &Path, timeout_ms: u64) -> Result<GuardLock, ProvisionError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| ProvisionError::io(parent, e))?;
        }
        let file = std::fs::OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(path)
            .map_err(|e| ProvisionError::io(path, e))?;

        let fd = std::os::unix::io::AsRawFd::as_raw_fd(&file);
        let deadline = Instant::now() + Duration::from_millis(timeout_ms);

        loop {
            let ret = unsafe { libc::flock(fd, libc::LOCK_EX | libc::LOCK_NB) };
            if ret == 0 {
                return Ok(GuardLock { file });
            }
            if Instant::now() >= deadline {
                return Err(ProvisionError::Lock(format!(
                    "timed out acquiring {} after {}ms",
                    path.display(),
                    timeout_ms
                )));
            }
            std::thread::sleep(Duration::from_millis(20));
        }
    }
}

impl Drop for GuardLock {
    fn drop(&mut self) {
        unsafe {
            libc::flock(
                std::os::unix::io::AsRawFd::as_raw_fd(&self.file),
                libc::LOCK_UN,
            );
        }
    }
}


// ---------------------------------------------------------------------------
// Signal cleanup
// ---------------------------------------------------------------------------

/// Path the signal handler unlinks; null when no handle is armed.
static ARMED_PATH: AtomicPtr<c_char> = AtomicPtr::new(ptr::null_mut());
static INSTALL_HANDLERS: Once = Once::new();

extern "C" fn on_terminate(sig: libc::c_int) {
    let p = ARMED_PATH.load(Ordering::SeqCst);
    unsafe {
        if !p.is_null() {
            libc::unlink(p);
        }
        libc::_exit(128 + sig);
    }
}

fn arm_signal_cleanup(path: &Path) {
    INSTALL_HANDLERS.call_once(|| unsafe {
        let handler = on_terminate as extern "C" fn(libc::c_int) as libc::sighandler_t;
        libc::signal(libc::SIGINT, handler);
        libc::signal(libc::SIGTERM, handler);
        libc::signal(libc::SIGHUP, handler);
    });
    let c = match CString::new(path.as_os_str().as_bytes()) {
        Ok(c) => c,
        Err(_) => return,
    };
    // Replaced and disarmed strings are leaked: a handler running on another
    // thread may still hold the old pointer.
    ARMED_PATH.swap(c.into_raw(), Ordering::SeqCst);
}

fn disarm_signal_cleanup(path: &Path) {
    let current = ARMED_PATH.load(Ordering::SeqCst);
    if current.is_null() {
        return;
    }
    let matches = unsafe { CStr::from_ptr(current) }.to_bytes() == path.as_os_str().as_bytes();
    if matches {
        let _ = ARMED_PATH.compare_exchange(current, ptr::null_mut(), Ordering::SeqCst, Ordering::SeqCst);
    }
}

/// The lock path the signal handler would remove right now.
pub fn armed_path() -> Option<PathBuf> {
    let current = ARMED_PATH.load(Ordering::SeqCst);
    if current.is_null() {
        return None;
    }
    let bytes = unsafe { CStr::from_ptr(current) }.to_bytes();
    Some(PathBuf::from(std::ffi::OsStr::from_bytes(bytes)))
}


// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
