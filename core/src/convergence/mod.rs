//! Convergence engine — applies desired-state operations and classifies
//! what happened.
//!
//! `executor` runs a batch in order without aborting on failure, `diagnose`
//! turns captured stderr into an advisory `Diagnosis`, and `retry` holds the
//! backoff policy shared by the readiness wait.

pub mod diagnose;
pub mod executor;
pub mod retry;
