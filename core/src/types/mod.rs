//! Plain data types shared across the engine: operations, their results,
//! run summaries and reconciler configuration.

pub mod config;
pub mod operation;
pub mod result;
pub mod summary;

pub use operation::{Operation, OperationKind, Precondition};
pub use result::{OperationResult, OperationStatus};
pub use summary::{FailedOperation, RunSummary};
