//! State directory layout.
//!
//! Every file a reconciler produces lives in one directory, named after the
//! reconciler: `<name>.lock`, `<name>.done`, `<name>.log`,
//! `<name>.summary.txt`, `<name>.last-run.json`, `<name>.watch.log`.

use std::io::Write;
use std::path::{Path, PathBuf};

use crate::error::ProvisionError;
use crate::infrastructure::Environment;


pub const STATE_DIR_ENV: &str = "FIRSTBOOT_STATE_DIR";
pub const SYSTEM_STATE_DIR: &str = "/var/lib/firstboot";


/// Resolve the state directory.
///
/// `$FIRSTBOOT_STATE_DIR` wins; root uses `/var/lib/firstboot`; everyone
/// else `$XDG_STATE_HOME/firstboot` or `~/.local/state/firstboot`.
pub fn resolve_state_dir(env: &dyn Environment, is_root: bool) -> PathBuf {
    if let Some(dir) = env.var(STATE_DIR_ENV) {
        return PathBuf::from(dir);
    }
    if is_root {
        return PathBuf::from(SYSTEM_STATE_DIR);
    }
    if let Some(xdg) = env.var("XDG_STATE_HOME") {
        return PathBuf::from(xdg).join("firstboot");
    }
    let home = env.var("HOME").unwrap_or_else(|| "/tmp".into());
    PathBuf::from(home).join(".local").join("state").join("firstboot")
}


pub fn running_as_root() -> bool {
    unsafe { libc::geteuid() == 0 }
}


/// Paths of every file one reconciler owns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    pub dir: PathBuf,
    pub name: String,
}

impl StatePaths {
    pub fn new(dir: &Path, name: &str) -> Self {
        StatePaths {
            dir: dir.to_path_buf(),
            name: name.to_string(),
        }
    }

    fn file(&self, suffix: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", self.name, suffix))
    }

    pub fn lock(&self) -> PathBuf {
        self.file("lock")
    }

    pub fn marker(&self) -> PathBuf {
        self.file("done")
    }

    pub fn run_log(&self) -> PathBuf {
        self.file("log")
    }

    pub fn summary(&self) -> PathBuf {
        self.file("summary.txt")
    }

    pub fn last_run(&self) -> PathBuf {
        self.file("last-run.json")
    }

    pub fn watch_log(&self) -> PathBuf {
        self.file("watch.log")
    }

    pub fn ensure_dir(&self) -> Result<(), ProvisionError> {
        std::fs::create_dir_all(&self.dir).map_err(|e| ProvisionError::io(&self.dir, e))
    }
}


/// Write `contents` to `path` via a sibling temp file and rename, so readers
/// never observe a half-written file.
pub fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), ProvisionError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ProvisionError::io(parent, e))?;
    }
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!(".{}.{}.tmp", file_name, std::process::id()));
    let mut file = std::fs::File::create(&tmp).map_err(|e| ProvisionError::io(&tmp, e))?;
    file.write_all(contents)
        .and_then(|_| file.sync_all())
        .map_err(|e| ProvisionError::io(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        ProvisionError::io(path, e)
    })
}
