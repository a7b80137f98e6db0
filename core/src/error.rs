//! Fatal and infrastructure errors.
//!
//! Per-operation failures never become a `ProvisionError`; they are recorded
//! as `OperationResult`s. Only conditions that stop the whole run land here.

use std::path::PathBuf;

use thiserror::Error;


/// Exit code used when a required host command is absent.
pub const EXIT_MISSING_COMMAND: i32 = 127;


#[derive(Debug, Error)]
pub enum ProvisionError {
    /// A command the reconciler cannot work without is not on `PATH`.
    #[error("required command '{0}' is not available on this host")]
    MissingCommand(String),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("lock error: {0}")]
    Lock(String),

    #[error("cannot detach background watcher: {0}")]
    Spawn(String),

    #[error("invalid configuration in {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("unknown reconciler '{0}'")]
    UnknownReconciler(String),

    #[error("cannot encode run summary: {0}")]
    Encode(#[from] serde_json::Error),
}


impl ProvisionError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        ProvisionError::Io {
            path: path.into(),
            source,
        }
    }

    /// Process exit code a supervising unit sees for this error.
    pub fn exit_code(&self) -> i32 {
        match self {
            ProvisionError::MissingCommand(_) => EXIT_MISSING_COMMAND,
            _ => 1,
        }
    }
}
