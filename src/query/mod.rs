//! Guarded query execution for supaguard.
//!
//! This module isolates envelope construction and the validated execution
//! path from the HTTP surface.

pub mod envelope;
pub mod executor;

pub use envelope::{ExecutionEnvelope, STATEMENT_TIMEOUT_SECS};
pub use executor::{ExecutionResult, QueryExecutor, QueryOutcome};
