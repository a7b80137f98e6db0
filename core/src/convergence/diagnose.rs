//! Best-effort failure classification from captured stderr.
//!
//! Purely advisory: the executor attaches the result to a failed
//! `OperationResult` and the reporter prints it. Nothing branches on it.

use std::fmt;

use serde::{Deserialize, Serialize};


#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Diagnosis {
    /// The thing being acted on (key, extension, app, remote) does not exist.
    MissingResource,
    /// The schema or capability that would own the setting is not installed.
    MissingSchema,
    /// D-Bus, session bus or network trouble talking to the backend.
    BackendCommunication,
    PermissionDenied,
    Unknown,
}

impl fmt::Display for Diagnosis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Diagnosis::MissingResource => write!(f, "resource missing"),
            Diagnosis::MissingSchema => write!(f, "schema missing"),
            Diagnosis::BackendCommunication => write!(f, "D-Bus/backend communication error"),
            Diagnosis::PermissionDenied => write!(f, "permission denied"),
            Diagnosis::Unknown => write!(f, "unknown failure"),
        }
    }
}


// Checked in table order; the first category with a matching needle wins.
const PATTERNS: &[(Diagnosis, &[&str])] = &[
    (
        Diagnosis::PermissionDenied,
        &[
            "permission denied",
            "not authorized",
            "accessdenied",
            "operation not permitted",
            "not allowed",
            "polkit",
        ],
    ),
    (
        Diagnosis::MissingSchema,
        &["no such schema", "no such key", "schema", "not a valid key"],
    ),
    (
        Diagnosis::BackendCommunication,
        &[
            "d-bus",
            "dbus",
            "could not connect",
            "failed to connect",
            "unable to connect",
            "connection refused",
            "could not resolve",
            "timeout was reached",
            "no session bus",
            "cannot autolaunch",
        ],
    ),
    (
        Diagnosis::MissingResource,
        &[
            "not found",
            "does not exist",
            "doesn't exist",
            "no such file",
            "nothing matches",
            "not installed",
            "no remote",
        ],
    ),
];


/// Classify a failure from its captured error stream.
pub fn classify(stderr: &str) -> Diagnosis {
    let haystack = stderr.to_lowercase();
    if haystack.trim().is_empty() {
        return Diagnosis::Unknown;
    }
    for (diagnosis, needles) in PATTERNS {
        if needles.iter().any(|n| haystack.contains(n)) {
            return *diagnosis;
        }
    }
    Diagnosis::Unknown
}
