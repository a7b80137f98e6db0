//! firstboot-core — idempotent first-boot provisioning.
//!
//! A `Reconciler` waits for its readiness probes, takes a per-reconciler
//! lock, applies an ordered batch of desired-state operations and records
//! the outcome. When the host is not ready in time the run is handed to a
//! detached watcher instead.

pub mod cli;
pub mod command;
pub mod config;
pub mod convergence;
pub mod error;
pub mod infrastructure;
pub mod lock;
pub mod profiles;
pub mod readiness;
pub mod reconciler;
pub mod report;
pub mod reschedule;
pub mod state;
pub mod status;
pub mod types;
