//! Continuation handles passed to async action and result filters.

use std::sync::Arc;

use super::machine::{Core, Fault};
use super::state::{Scope, State};
use crate::context::{
    ActionExecutedContext, ActionExecutingContext, ResultExecutedContext, ResultExecutingContext,
};
use crate::errors::ProtocolViolation;
use crate::filters::FilterKind;

fn violate(core: &mut Core, violation: ProtocolViolation) -> anyhow::Error {
    if core.violation.is_none() {
        core.violation = Some(violation.clone());
    }
    anyhow::Error::new(violation)
}

/// The remainder of the action stage, as seen by an async action filter.
///
/// Call [`ActionExecution::proceed`] at most once to run the inner filters
/// and the operation. Returning without proceeding short-circuits the stage.
pub struct ActionExecution<'a> {
    core: &'a mut Core,
    filter: Arc<str>,
    proceeded: bool,
}

impl<'a> ActionExecution<'a> {
    pub(crate) fn new(core: &'a mut Core, filter: Arc<str>) -> Self {
        Self {
            core,
            filter,
            proceeded: false,
        }
    }

    /// Returns the pre-context.
    pub fn context(&self) -> &ActionExecutingContext {
        &self.core.action_executing
    }

    /// Returns the pre-context for modification.
    ///
    /// Setting `result` and then returning without proceeding short-circuits
    /// with that result.
    pub fn context_mut(&mut self) -> &mut ActionExecutingContext {
        &mut self.core.action_executing
    }

    /// Returns the name of the filter holding this handle.
    pub fn filter_name(&self) -> &str {
        &self.filter
    }

    /// Returns true once [`ActionExecution::proceed`] was called.
    pub fn has_proceeded(&self) -> bool {
        self.proceeded
    }

    /// Runs the rest of the action stage and returns its post-context.
    ///
    /// Errors raised inside are captured into the post-context rather than
    /// returned. An `Err` means the continuation was misused (or a nested
    /// filter misused its own); return it so the pipeline can fail.
    pub async fn proceed(&mut self) -> anyhow::Result<&mut ActionExecutedContext> {
        if self.proceeded {
            let violation = ProtocolViolation::ProceededTwice {
                kind: FilterKind::Action,
                filter: self.filter.to_string(),
            };
            return Err(violate(self.core, violation));
        }
        if self.core.action_executing.result.is_some() {
            let violation = ProtocolViolation::ActionShortCircuit {
                filter: self.filter.to_string(),
            };
            return Err(violate(self.core, violation));
        }
        self.proceeded = true;

        match self.core.run(State::ActionNext, Scope::Action).await {
            Ok(()) => {}
            Err(Fault::Protocol(violation)) => return Err(violate(self.core, violation)),
            Err(Fault::Raised(error)) => {
                self.core.action_executed =
                    Some(ActionExecutedContext::failed(self.core.scope.clone(), error));
            }
        }

        let scope = &self.core.scope;
        Ok(self
            .core
            .action_executed
            .get_or_insert_with(|| ActionExecutedContext::canceled(scope.clone(), None)))
    }
}

/// The remainder of the result stage, as seen by an async result filter.
pub struct ResultExecution<'a> {
    core: &'a mut Core,
    filter: Arc<str>,
    proceeded: bool,
}

impl<'a> ResultExecution<'a> {
    pub(crate) fn new(core: &'a mut Core, filter: Arc<str>) -> Self {
        Self {
            core,
            filter,
            proceeded: false,
        }
    }

    /// Returns the pre-context.
    pub fn context(&self) -> &ResultExecutingContext {
        &self.core.result_executing
    }

    /// Returns the pre-context for modification.
    pub fn context_mut(&mut self) -> &mut ResultExecutingContext {
        &mut self.core.result_executing
    }

    /// Returns the name of the filter holding this handle.
    pub fn filter_name(&self) -> &str {
        &self.filter
    }

    /// Returns true once [`ResultExecution::proceed`] was called.
    pub fn has_proceeded(&self) -> bool {
        self.proceeded
    }

    /// Runs the inner result filters and the outcome.
    pub async fn proceed(&mut self) -> anyhow::Result<&mut ResultExecutedContext> {
        if self.proceeded {
            let violation = ProtocolViolation::ProceededTwice {
                kind: FilterKind::Result,
                filter: self.filter.to_string(),
            };
            return Err(violate(self.core, violation));
        }
        if self.core.result_executing.cancel {
            let violation = ProtocolViolation::ResultShortCircuit {
                filter: self.filter.to_string(),
            };
            return Err(violate(self.core, violation));
        }
        self.proceeded = true;

        match self.core.run(State::ResultNext, Scope::Result).await {
            Ok(()) => {}
            Err(Fault::Protocol(violation)) => return Err(violate(self.core, violation)),
            Err(Fault::Raised(error)) => {
                self.core.result_executed = Some(ResultExecutedContext::failed(
                    self.core.scope.clone(),
                    Arc::clone(&self.core.result_executing.outcome),
                    error,
                ));
            }
        }

        let scope = &self.core.scope;
        let outcome = &self.core.result_executing.outcome;
        Ok(self.core.result_executed.get_or_insert_with(|| {
            ResultExecutedContext::canceled(scope.clone(), Arc::clone(outcome))
        }))
    }
}
