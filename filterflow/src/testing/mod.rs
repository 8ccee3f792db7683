//! Testing utilities for filterflow pipelines.
//!
//! This module provides:
//! - A shared call log for asserting hook order
//! - Outcomes that record, fail or abort
//! - Recording async filters for every async capability

mod filters;
mod log;
mod outcomes;

pub use filters::{
    RecordingActionFilter, RecordingAuthorizationFilter, RecordingExceptionFilter,
    RecordingResultFilter,
};
pub use log::CallLog;
pub use outcomes::{AbortingOutcome, FailingOutcome, LoggingOutcome};
