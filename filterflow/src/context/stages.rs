//! Contexts exchanged between the engine and filters at each stage.
//!
//! Pre-contexts carry the inputs of a stage and a result slot; setting it
//! short-circuits the stage. Post-contexts carry what happened: the
//! outcome, any captured exception, and the handled and canceled flags.

use std::fmt;
use std::sync::Arc;

use super::{Arguments, InvocationContext, Principal};
use crate::errors::CapturedError;
use crate::operation::Operation;
use crate::outcome::OutcomeRef;

/// The invocation and operation every stage context refers to.
#[derive(Clone)]
pub struct StageScope {
    invocation: Arc<InvocationContext>,
    operation: Arc<dyn Operation>,
}

impl StageScope {
    pub(crate) fn new(invocation: Arc<InvocationContext>, operation: Arc<dyn Operation>) -> Self {
        Self {
            invocation,
            operation,
        }
    }

    /// Returns the invocation context.
    pub fn invocation(&self) -> &Arc<InvocationContext> {
        &self.invocation
    }

    /// Returns the target operation.
    pub fn operation(&self) -> &Arc<dyn Operation> {
        &self.operation
    }
}

impl fmt::Debug for StageScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StageScope")
            .field("request_id", &self.invocation.request_id())
            .field("operation", &self.operation.name())
            .finish()
    }
}

macro_rules! scoped {
    ($ty:ident) => {
        impl $ty {
            /// Returns the invocation context.
            pub fn invocation(&self) -> &Arc<InvocationContext> {
                self.scope.invocation()
            }

            /// Returns the target operation.
            pub fn operation(&self) -> &Arc<dyn Operation> {
                self.scope.operation()
            }
        }
    };
}

/// Error still in flight after post-hooks ran.
///
/// An abort is always in flight. Otherwise the exception survives only if it
/// is present and not marked handled; clearing it counts as handling.
fn pending(
    original: Option<&CapturedError>,
    exception: Option<&CapturedError>,
    handled: bool,
) -> Option<CapturedError> {
    if let Some(original) = original.filter(|e| e.is_abort()) {
        return Some(original.clone());
    }
    if handled {
        None
    } else {
        exception.cloned()
    }
}

/// Context for `on_authentication`.
#[derive(Debug)]
pub struct AuthenticationContext {
    scope: StageScope,
    /// The principal; replacing it substitutes the request's identity.
    pub principal: Option<Principal>,
    /// Setting a result short-circuits the pipeline.
    pub result: Option<OutcomeRef>,
}

scoped!(AuthenticationContext);

impl AuthenticationContext {
    pub(crate) fn new(scope: StageScope) -> Self {
        let principal = scope.invocation().principal();
        Self {
            scope,
            principal,
            result: None,
        }
    }
}

/// Context for `on_authentication_challenge`.
#[derive(Debug)]
pub struct AuthenticationChallengeContext {
    scope: StageScope,
    /// The pending outcome. A filter may replace it; clearing it is ignored.
    pub result: Option<OutcomeRef>,
}

scoped!(AuthenticationChallengeContext);

impl AuthenticationChallengeContext {
    pub(crate) fn new(scope: StageScope, result: OutcomeRef) -> Self {
        Self {
            scope,
            result: Some(result),
        }
    }
}

/// Context for authorization filters.
#[derive(Debug)]
pub struct AuthorizationContext {
    scope: StageScope,
    /// Setting a result short-circuits the pipeline.
    pub result: Option<OutcomeRef>,
}

scoped!(AuthorizationContext);

impl AuthorizationContext {
    pub(crate) fn new(scope: StageScope) -> Self {
        Self {
            scope,
            result: None,
        }
    }
}

/// Context for exception filters.
#[derive(Debug)]
pub struct ExceptionContext {
    scope: StageScope,
    original: CapturedError,
    /// The captured exception. Clearing it counts as handling it.
    pub exception: Option<CapturedError>,
    /// Marks the exception handled.
    pub exception_handled: bool,
    /// Substitute outcome executed when the exception is handled.
    pub result: Option<OutcomeRef>,
}

scoped!(ExceptionContext);

impl ExceptionContext {
    pub(crate) fn new(scope: StageScope, exception: CapturedError) -> Self {
        Self {
            scope,
            original: exception.clone(),
            exception: Some(exception),
            exception_handled: false,
            result: None,
        }
    }

    /// Returns true if the exception is an abort, which cannot be handled.
    pub fn is_abort(&self) -> bool {
        self.original.is_abort()
    }

    pub(crate) fn wants_filter(&self) -> bool {
        self.exception.is_some() && !self.exception_handled
    }

    pub(crate) fn pending_error(&self) -> Option<CapturedError> {
        pending(
            Some(&self.original),
            self.exception.as_ref(),
            self.exception_handled,
        )
    }

    /// Keeps an abort that was in flight when this context replaced the last one.
    pub(crate) fn carrying(mut self, abort: Option<CapturedError>) -> Self {
        if let Some(abort) = abort {
            self.original = abort;
        }
        self
    }

    pub(crate) fn in_flight_abort(&self) -> Option<CapturedError> {
        Some(self.original.clone()).filter(CapturedError::is_abort)
    }
}

/// Context for `on_action_executing`.
#[derive(Debug)]
pub struct ActionExecutingContext {
    scope: StageScope,
    /// Arguments the operation will be called with.
    pub arguments: Arguments,
    /// Setting a result short-circuits the action stage.
    pub result: Option<OutcomeRef>,
}

scoped!(ActionExecutingContext);

impl ActionExecutingContext {
    pub(crate) fn new(scope: StageScope, arguments: Arguments) -> Self {
        Self {
            scope,
            arguments,
            result: None,
        }
    }
}

/// Context for `on_action_executed`.
#[derive(Debug)]
pub struct ActionExecutedContext {
    scope: StageScope,
    original: Option<CapturedError>,
    /// True if an inner filter short-circuited.
    pub canceled: bool,
    /// The exception raised by an inner filter or the operation.
    pub exception: Option<CapturedError>,
    /// Marks the exception handled.
    pub exception_handled: bool,
    /// The outcome to carry forward.
    pub result: Option<OutcomeRef>,
}

scoped!(ActionExecutedContext);

impl ActionExecutedContext {
    pub(crate) fn completed(scope: StageScope, result: OutcomeRef) -> Self {
        Self {
            scope,
            original: None,
            canceled: false,
            exception: None,
            exception_handled: false,
            result: Some(result),
        }
    }

    pub(crate) fn canceled(scope: StageScope, result: Option<OutcomeRef>) -> Self {
        Self {
            scope,
            original: None,
            canceled: true,
            exception: None,
            exception_handled: false,
            result,
        }
    }

    pub(crate) fn failed(scope: StageScope, exception: CapturedError) -> Self {
        Self {
            scope,
            original: Some(exception.clone()),
            canceled: false,
            exception: Some(exception),
            exception_handled: false,
            result: None,
        }
    }

    pub(crate) fn pending_error(&self) -> Option<CapturedError> {
        pending(
            self.original.as_ref(),
            self.exception.as_ref(),
            self.exception_handled,
        )
    }

    pub(crate) fn carrying(mut self, abort: Option<CapturedError>) -> Self {
        if abort.is_some() {
            self.original = abort;
        }
        self
    }

    pub(crate) fn in_flight_abort(&self) -> Option<CapturedError> {
        self.original.clone().filter(CapturedError::is_abort)
    }
}

/// Context for `on_result_executing`.
#[derive(Debug)]
pub struct ResultExecutingContext {
    scope: StageScope,
    /// The outcome about to execute.
    pub outcome: OutcomeRef,
    /// Setting cancel suppresses outcome execution.
    pub cancel: bool,
}

scoped!(ResultExecutingContext);

impl ResultExecutingContext {
    pub(crate) fn new(scope: StageScope, outcome: OutcomeRef) -> Self {
        Self {
            scope,
            outcome,
            cancel: false,
        }
    }
}

/// Context for `on_result_executed`.
#[derive(Debug)]
pub struct ResultExecutedContext {
    scope: StageScope,
    original: Option<CapturedError>,
    /// The outcome that executed (or would have).
    pub outcome: OutcomeRef,
    /// True if an inner filter canceled execution.
    pub canceled: bool,
    /// The exception raised by an inner filter or the outcome.
    pub exception: Option<CapturedError>,
    /// Marks the exception handled.
    pub exception_handled: bool,
}

scoped!(ResultExecutedContext);

impl ResultExecutedContext {
    pub(crate) fn completed(scope: StageScope, outcome: OutcomeRef) -> Self {
        Self {
            scope,
            original: None,
            outcome,
            canceled: false,
            exception: None,
            exception_handled: false,
        }
    }

    pub(crate) fn canceled(scope: StageScope, outcome: OutcomeRef) -> Self {
        Self {
            canceled: true,
            ..Self::completed(scope, outcome)
        }
    }

    pub(crate) fn failed(scope: StageScope, outcome: OutcomeRef, exception: CapturedError) -> Self {
        Self {
            scope,
            original: Some(exception.clone()),
            outcome,
            canceled: false,
            exception: Some(exception),
            exception_handled: false,
        }
    }

    pub(crate) fn pending_error(&self) -> Option<CapturedError> {
        pending(
            self.original.as_ref(),
            self.exception.as_ref(),
            self.exception_handled,
        )
    }

    pub(crate) fn carrying(mut self, abort: Option<CapturedError>) -> Self {
        if abort.is_some() {
            self.original = abort;
        }
        self
    }

    pub(crate) fn in_flight_abort(&self) -> Option<CapturedError> {
        self.original.clone().filter(CapturedError::is_abort)
    }
}
