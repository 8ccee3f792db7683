//! The pipeline engine.
//!
//! A [`Pipeline`] runs one invocation through the fixed stage order
//! Authentication, Authorization, Exception, Action, Result, plus the
//! authentication-challenge sweep that follows every short-circuit and the
//! normal path alike.

mod execution;
mod machine;
mod state;


use std::sync::Arc;

use serde_json::json;
use tracing::{debug, debug_span, Instrument};

pub use execution::{ActionExecution, ResultExecution};

use crate::config::InvokerConfig;
use crate::context::{Arguments, InvocationContext, StageScope};
use crate::cursor::FilterCursor;
use crate::errors::InvokeError;
use crate::events::{EventSink, INVOCATION_COMPLETED, INVOCATION_STARTED};
use crate::filters::ScopedFilter;
use crate::operation::Operation;
use machine::{Core, Fault};
use state::{Scope, State};

/// Hook called once when the action stage starts.
#[cfg_attr(test, mockall::automock)]
pub trait RequestValidator: Send + Sync {
    /// Validates the request. An error is raised inside the exception region.
    fn validate_request(&self, ctx: &InvocationContext) -> anyhow::Result<()>;
}

/// One invocation of an already-resolved operation.
pub struct Pipeline {
    core: Core,
}

impl Pipeline {
    /// Creates a pipeline over filters ordered by scope ascending.
    pub fn new(
        invocation: Arc<InvocationContext>,
        operation: Arc<dyn Operation>,
        arguments: Arguments,
        filters: Vec<ScopedFilter>,
    ) -> Self {
        let scope = StageScope::new(invocation, operation);
        Self {
            core: Core::new(scope, arguments, FilterCursor::new(filters)),
        }
    }

    /// Sets the request validation hook.
    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn RequestValidator>) -> Self {
        self.core.set_validator(validator);
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.core.set_event_sink(sink);
        self
    }

    /// Sets the configuration.
    #[must_use]
    pub fn with_config(mut self, config: InvokerConfig) -> Self {
        self.core.set_config(config);
        self
    }

    /// Runs every stage and executes exactly one outcome on success.
    ///
    /// Unhandled errors come back as the very error first raised; see
    /// [`InvokeError`].
    pub async fn run(mut self) -> Result<(), InvokeError> {
        let invocation = Arc::clone(self.core.scope.invocation());
        let operation = self.core.scope.operation().name().to_string();
        let span = debug_span!("pipeline", operation = %operation, request_id = %invocation.request_id());

        self.core
            .emit(INVOCATION_STARTED, json!({ "operation": operation }));
        let outcome = self
            .core
            .run(State::InvokeBegin, Scope::Invoker)
            .instrument(span)
            .await;

        let result = match outcome {
            Ok(()) => Ok(()),
            Err(Fault::Raised(error)) => Err(InvokeError::from_captured(error)),
            Err(Fault::Protocol(violation)) => Err(InvokeError::Protocol(violation)),
        };
        let status = match &result {
            Ok(()) => "ok",
            Err(InvokeError::Aborted(_)) => "aborted",
            Err(InvokeError::Protocol(_)) => "protocol_violation",
            Err(InvokeError::Unhandled(_)) => "failed",
        };
        debug!(operation = %operation, status, "pipeline finished");
        self.core.emit(
            INVOCATION_COMPLETED,
            json!({ "operation": operation, "status": status }),
        );
        result
    }
}
