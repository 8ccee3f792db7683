//! Error types for the filterflow pipeline.
//!
//! Filters, operations and outcomes report failures as [`anyhow::Error`].
//! The engine captures them as [`CapturedError`] values, which keep the
//! original error (and its backtrace) behind a shared pointer so that a
//! re-raise hands the caller the very same error that was first raised.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::filters::FilterKind;

/// The main error type for filterflow operations.
#[derive(Debug, Error)]
pub enum FilterflowError {
    /// The pipeline finished with an error nobody handled.
    #[error(transparent)]
    Invoke(#[from] InvokeError),

    /// An argument passed to the invoker was rejected.
    #[error("Invalid argument '{name}': {reason}")]
    InvalidArgument {
        /// The offending argument.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// The resolver could not bind the operation's arguments.
    #[error("Argument binding failed for '{operation}': {source}")]
    Binding {
        /// The operation being bound.
        operation: String,
        /// The binder's error.
        source: CapturedError,
    },

    /// A completion handle was misused.
    #[error("Completion error: {0}")]
    Completion(String),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// The outcome of a pipeline run that did not complete normally.
#[derive(Debug, Error)]
pub enum InvokeError {
    /// A filter, the operation or an outcome failed and no filter handled it.
    ///
    /// Display and `source` delegate to the original error.
    #[error(transparent)]
    Unhandled(CapturedError),

    /// An [`Abort`] travelled through the pipeline. Aborts are never handled.
    #[error(transparent)]
    Aborted(CapturedError),

    /// An async filter misused its continuation.
    #[error(transparent)]
    Protocol(#[from] ProtocolViolation),
}

impl InvokeError {
    /// Wraps a captured error, routing aborts to [`InvokeError::Aborted`].
    #[must_use]
    pub fn from_captured(error: CapturedError) -> Self {
        if error.is_abort() {
            Self::Aborted(error)
        } else {
            Self::Unhandled(error)
        }
    }

    /// Returns the captured error, if this is not a protocol violation.
    #[must_use]
    pub fn captured(&self) -> Option<&CapturedError> {
        match self {
            Self::Unhandled(error) | Self::Aborted(error) => Some(error),
            Self::Protocol(_) => None,
        }
    }

    /// Returns true if the pipeline was aborted.
    #[must_use]
    pub fn is_abort(&self) -> bool {
        matches!(self, Self::Aborted(_))
    }
}

/// Misuse of the continuation handed to an async filter.
///
/// These are fatal: exception filters never see them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProtocolViolation {
    /// An async action filter set a result and then proceeded anyway.
    #[error("Action filter '{filter}' set a result and proceeded; short-circuit must be exclusive with continuing")]
    ActionShortCircuit {
        /// The filter's name.
        filter: String,
    },

    /// An async result filter set `cancel` and then proceeded anyway.
    #[error("Result filter '{filter}' set cancel and proceeded; short-circuit must be exclusive with continuing")]
    ResultShortCircuit {
        /// The filter's name.
        filter: String,
    },

    /// An async filter proceeded more than once.
    #[error("{kind} filter '{filter}' proceeded more than once")]
    ProceededTwice {
        /// The stage the filter runs in.
        kind: FilterKind,
        /// The filter's name.
        filter: String,
    },
}

/// A host-level control transfer.
///
/// Returning an `Abort` (wrapped in `anyhow::Error`) from any hook ends the
/// invocation. Post-hooks still observe it while the pipeline unwinds, but
/// marking it handled has no effect: it always reaches the caller as
/// [`InvokeError::Aborted`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Execution aborted: {reason}")]
pub struct Abort {
    /// Why execution was aborted.
    pub reason: String,
}

impl Abort {
    /// Creates a new abort signal.
    #[must_use]
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

/// Where in the pipeline an error was first raised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// An authentication filter's `on_authentication`.
    Authentication,
    /// An authentication filter's `on_authentication_challenge`.
    AuthenticationChallenge,
    /// An authorization filter.
    Authorization,
    /// An exception filter.
    Exception,
    /// Argument binding, before the pipeline starts.
    Binding,
    /// The request validation hook.
    Validation,
    /// An action filter.
    ActionFilter,
    /// The target operation.
    Operation,
    /// A result filter.
    ResultFilter,
    /// Execution of an outcome.
    Outcome,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Authentication => "authentication",
            Self::AuthenticationChallenge => "authentication_challenge",
            Self::Authorization => "authorization",
            Self::Exception => "exception",
            Self::Binding => "binding",
            Self::Validation => "validation",
            Self::ActionFilter => "action_filter",
            Self::Operation => "operation",
            Self::ResultFilter => "result_filter",
            Self::Outcome => "outcome",
        };
        f.write_str(name)
    }
}

/// An error preserved with its original attribution.
///
/// Cloning is cheap and keeps identity: every clone points at the same
/// underlying `anyhow::Error`, so [`CapturedError::ptr_eq`] holds between
/// the error a filter observed and the one re-raised to the caller.
#[derive(Clone)]
pub struct CapturedError {
    error: Arc<anyhow::Error>,
    phase: Phase,
}

impl CapturedError {
    /// Captures an error raised in the given phase.
    #[must_use]
    pub fn capture(error: anyhow::Error, phase: Phase) -> Self {
        Self {
            error: Arc::new(error),
            phase,
        }
    }

    /// Returns the phase the error was raised in.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns the original error.
    #[must_use]
    pub fn error(&self) -> &anyhow::Error {
        &self.error
    }

    /// Returns true if the original error is an [`Abort`].
    #[must_use]
    pub fn is_abort(&self) -> bool {
        self.error.is::<Abort>()
    }

    /// Attempts to downcast the original error.
    #[must_use]
    pub fn downcast_ref<E>(&self) -> Option<&E>
    where
        E: fmt::Display + fmt::Debug + Send + Sync + 'static,
    {
        self.error.downcast_ref::<E>()
    }

    /// Returns true if both values capture the same raised error.
    #[must_use]
    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.error, &other.error)
    }

    /// Returns the backtrace recorded when the error was created.
    #[must_use]
    pub fn backtrace(&self) -> &std::backtrace::Backtrace {
        self.error.backtrace()
    }
}

impl fmt::Debug for CapturedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapturedError")
            .field("phase", &self.phase)
            .field("error", &self.error)
            .finish()
    }
}

impl fmt::Display for CapturedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&*self.error, f)
    }
}

impl std::error::Error for CapturedError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.error.source()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Error)]
    #[error("disk on fire")]
    struct DiskError;

    #[test]
    fn test_captured_error_keeps_identity() {
        let captured = CapturedError::capture(anyhow::Error::new(DiskError), Phase::Operation);
        let clone = captured.clone();
        let other = CapturedError::capture(anyhow::Error::new(DiskError), Phase::Operation);

        assert!(captured.ptr_eq(&clone));
        assert!(!captured.ptr_eq(&other));
        assert!(captured.downcast_ref::<DiskError>().is_some());
        assert_eq!(captured.phase(), Phase::Operation);
    }

    #[test]
    fn test_display_delegates_to_original() {
        let captured = CapturedError::capture(anyhow::anyhow!("boom"), Phase::ActionFilter);
        let error = InvokeError::from_captured(captured);

        assert_eq!(error.to_string(), "boom");
        assert!(!error.is_abort());
    }

    #[test]
    fn test_abort_is_detected_through_context() {
        let error = anyhow::Error::new(Abort::new("redirect")).context("while rendering");
        let captured = CapturedError::capture(error, Phase::Outcome);

        assert!(captured.is_abort());
        assert!(InvokeError::from_captured(captured).is_abort());
    }

    #[test]
    fn test_protocol_violation_message() {
        let violation = ProtocolViolation::ProceededTwice {
            kind: FilterKind::Action,
            filter: "audit".to_string(),
        };

        assert_eq!(
            violation.to_string(),
            "action filter 'audit' proceeded more than once"
        );
        assert!(InvokeError::from(violation).captured().is_none());
    }
}
