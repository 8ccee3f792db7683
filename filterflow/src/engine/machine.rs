//! The pipeline state machine.
//!
//! [`Core`] owns every context of one invocation and advances through
//! [`State`]s in a loop. Synchronous filters push frames onto an explicit
//! stack instead of recursing, so chain length never grows the call stack.
//! Async action and result filters are the only source of nesting: their
//! continuation starts a nested [`Core::run`] that stops once its stage has
//! unwound.

use futures::future::BoxFuture;
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, trace};

use super::execution::{ActionExecution, ResultExecution};
use super::state::{Frame, FrameStack, Scope, State, Step};
use super::RequestValidator;
use crate::config::InvokerConfig;
use crate::context::{
    ActionExecutedContext, ActionExecutingContext, Arguments, AuthenticationChallengeContext,
    AuthenticationContext, AuthorizationContext, ExceptionContext, ResultExecutedContext,
    ResultExecutingContext, StageScope,
};
use crate::cursor::{FilterCursor, Selected};
use crate::errors::{CapturedError, Phase, ProtocolViolation};
use crate::events::{
    EventSink, NoOpEventSink, PipelineEvent, EXCEPTION_CAPTURED, EXCEPTION_HANDLED,
    FILTER_SHORT_CIRCUIT, OUTCOME_EXECUTED,
};
use crate::filters::{
    ActionStage, AuthenticationStage, AuthorizationStage, ExceptionStage, FilterKind, Hook,
    ResultStage,
};
use crate::outcome::{EmptyOutcome, OutcomeRef};

/// Why a run stopped early.
#[derive(Debug)]
pub(crate) enum Fault {
    /// An error that left the exception region, or was raised outside it.
    Raised(CapturedError),
    /// Continuation misuse. Never routed through exception filters.
    Protocol(ProtocolViolation),
}

/// Where a freshly raised error is delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Region {
    /// Into a failed action post-context, unwinding action frames.
    Action,
    /// Into a failed result post-context, unwinding result frames.
    Result,
    /// Into a fresh exception context, unwinding exception frames.
    Exception,
    /// Straight to the caller.
    Caller,
}

/// Engine state for one invocation.
pub(crate) struct Core {
    pub(super) scope: StageScope,
    cursor: FilterCursor,
    frames: FrameStack,
    validator: Option<Arc<dyn RequestValidator>>,
    sink: Arc<dyn EventSink>,
    config: InvokerConfig,

    authentication: AuthenticationContext,
    challenge: Option<AuthenticationChallengeContext>,
    authorization: AuthorizationContext,
    exception: Option<ExceptionContext>,
    pub(super) action_executing: ActionExecutingContext,
    pub(super) action_executed: Option<ActionExecutedContext>,
    pub(super) result_executing: ResultExecutingContext,
    pub(super) result_executed: Option<ResultExecutedContext>,

    /// The pending terminal outcome.
    result: Option<OutcomeRef>,
    /// Set on short-circuit and handled-exception paths.
    bypass_result_filters: bool,
    in_exception_region: bool,
    pub(super) violation: Option<ProtocolViolation>,
}

impl Core {
    pub(crate) fn new(scope: StageScope, arguments: Arguments, cursor: FilterCursor) -> Self {
        Self {
            authentication: AuthenticationContext::new(scope.clone()),
            challenge: None,
            authorization: AuthorizationContext::new(scope.clone()),
            exception: None,
            action_executing: ActionExecutingContext::new(scope.clone(), arguments),
            action_executed: None,
            result_executing: ResultExecutingContext::new(scope.clone(), EmptyOutcome::shared()),
            result_executed: None,
            scope,
            cursor,
            frames: FrameStack::default(),
            validator: None,
            sink: Arc::new(NoOpEventSink),
            config: InvokerConfig::default(),
            result: None,
            bypass_result_filters: false,
            in_exception_region: false,
            violation: None,
        }
    }

    pub(crate) fn set_validator(&mut self, validator: Arc<dyn RequestValidator>) {
        self.validator = Some(validator);
    }

    pub(crate) fn set_event_sink(&mut self, sink: Arc<dyn EventSink>) {
        self.sink = sink;
    }

    pub(crate) fn set_config(&mut self, config: InvokerConfig) {
        self.config = config;
    }

    pub(crate) fn emit(&self, event_type: &str, data: serde_json::Value) {
        if self.config.emit_events {
            let event = PipelineEvent::new(event_type, self.scope.invocation().request_id());
            self.sink.emit(event.with_data(data));
        }
    }

    /// Drives the machine from `start` until the run's scope is complete.
    pub(crate) fn run(&mut self, start: State, scope: Scope) -> BoxFuture<'_, Result<(), Fault>> {
        Box::pin(async move {
            let base = self.frames.len();
            let mut state = start;
            loop {
                trace!(state = state.label(), scope = ?scope, depth = self.frames.len(), "step");
                match self.step(state, scope, base).await? {
                    Step::Goto(next) => state = next,
                    Step::Done => return Ok(()),
                }
            }
        })
    }

    #[allow(clippy::too_many_lines)]
    async fn step(&mut self, state: State, scope: Scope, base: usize) -> Result<Step, Fault> {
        let next = match state {
            State::InvokeBegin => State::AuthenticationBegin,

            // Authentication
            State::AuthenticationBegin => {
                self.cursor.reset();
                State::AuthenticationNext
            }
            State::AuthenticationNext => match self.cursor.next_filter::<AuthenticationStage>() {
                Some(selected) => State::AuthenticationSync(selected),
                None => State::AuthorizationBegin,
            },
            State::AuthenticationSync(selected) => {
                if let Err(e) = selected.handler.on_authentication(&mut self.authentication) {
                    let error = self.capture(e, Phase::Authentication);
                    return self.raise(Region::Caller, error);
                }
                if let Some(result) = self.authentication.result.clone() {
                    return Ok(Step::Goto(self.short_circuit(
                        FilterKind::Authentication,
                        &selected.name,
                        result,
                    )));
                }
                // Applied even when equal to the current principal.
                let principal = self.authentication.principal.clone();
                debug!(filter = %selected.name, principal = ?principal.as_ref().map(|p| &p.name), "principal applied");
                self.scope.invocation().set_principal(principal);
                State::AuthenticationNext
            }

            // Authentication challenge
            State::ChallengeBegin => {
                self.cursor.reset();
                let pending = self.pending_result();
                self.challenge = Some(AuthenticationChallengeContext::new(self.scope.clone(), pending));
                State::ChallengeNext
            }
            State::ChallengeNext => match self.cursor.next_filter::<AuthenticationStage>() {
                Some(selected) => State::ChallengeSync(selected),
                None => State::ChallengeEnd,
            },
            State::ChallengeSync(selected) => {
                let Some(ctx) = self.challenge.as_mut() else {
                    return Ok(Step::Goto(State::ChallengeEnd));
                };
                if let Err(e) = selected.handler.on_authentication_challenge(ctx) {
                    let error = self.capture(e, Phase::AuthenticationChallenge);
                    return self.raise(self.ambient_region(), error);
                }
                match ctx.result.clone() {
                    Some(result) => self.result = Some(result),
                    None => ctx.result.clone_from(&self.result),
                }
                State::ChallengeNext
            }
            State::ChallengeEnd => {
                self.challenge = None;
                if !self.bypass_result_filters {
                    return Ok(Step::Goto(State::ResultBegin));
                }
                let outcome = self.pending_result();
                if let Err(e) = outcome.execute(self.scope.invocation()) {
                    let error = self.capture(e, Phase::Outcome);
                    return self.raise(self.ambient_region(), error);
                }
                self.emit(OUTCOME_EXECUTED, json!({ "outcome": format!("{outcome:?}") }));
                State::InvokeEnd
            }

            // Authorization
            State::AuthorizationBegin => {
                self.cursor.reset();
                State::AuthorizationNext
            }
            State::AuthorizationNext => match self.cursor.next_filter::<AuthorizationStage>() {
                Some(Selected { handler: Hook::Sync(handler), name }) => {
                    State::AuthorizationSync(Selected { handler, name })
                }
                Some(Selected { handler: Hook::Async(handler), name }) => {
                    State::AuthorizationAsync(Selected { handler, name })
                }
                None => State::ExceptionBegin,
            },
            State::AuthorizationSync(selected) => {
                let outcome = selected.handler.on_authorization(&mut self.authorization);
                self.after_authorization(outcome, &selected.name)?
            }
            State::AuthorizationAsync(selected) => {
                let outcome = selected.handler.on_authorization(&mut self.authorization).await;
                self.after_authorization(outcome, &selected.name)?
            }

            // Exception
            State::ExceptionBegin => {
                self.cursor.reset();
                State::ExceptionNext
            }
            State::ExceptionNext => match self.cursor.next_filter::<ExceptionStage>() {
                Some(selected) => {
                    self.frames.push(Frame::Exception(selected));
                    State::ExceptionNext
                }
                None => State::ExceptionInside,
            },
            State::ExceptionInside => {
                self.in_exception_region = true;
                State::ActionBegin
            }
            State::ExceptionEnd => {
                if let Some(selected) = self.frames.pop_exception(base) {
                    let Some(ctx) = self.exception.as_mut().filter(|ctx| ctx.wants_filter()) else {
                        return Ok(Step::Goto(State::ExceptionEnd));
                    };
                    let outcome = match &selected.handler {
                        Hook::Sync(handler) => handler.on_exception(ctx),
                        Hook::Async(handler) => handler.on_exception(ctx).await,
                    };
                    if let Err(e) = outcome {
                        let error = self.capture(e, Phase::Exception);
                        return self.raise(Region::Exception, error);
                    }
                    return Ok(Step::Goto(State::ExceptionEnd));
                }
                self.in_exception_region = false;
                match self.exception.take() {
                    None => State::InvokeEnd,
                    Some(ctx) => {
                        if let Some(error) = ctx.pending_error() {
                            return Err(Fault::Raised(error));
                        }
                        debug!("exception handled by exception filters");
                        self.emit(EXCEPTION_HANDLED, json!({ "substitute": ctx.result.is_some() }));
                        self.result = Some(ctx.result.unwrap_or_else(EmptyOutcome::shared));
                        self.bypass_result_filters = true;
                        State::ChallengeBegin
                    }
                }
            }

            // Action
            State::ActionBegin => {
                self.cursor.reset();
                let validator = self.validator.clone().filter(|_| self.config.validate_request);
                if let Some(validator) = validator {
                    if let Err(e) = validator.validate_request(self.scope.invocation()) {
                        let error = self.capture(e, Phase::Validation);
                        return self.raise(Region::Action, error);
                    }
                }
                State::ActionNext
            }
            State::ActionNext => match self.cursor.next_filter::<ActionStage>() {
                Some(Selected { handler: Hook::Sync(handler), name }) => {
                    State::ActionSync(Selected { handler, name })
                }
                Some(Selected { handler: Hook::Async(handler), name }) => {
                    State::ActionAsync(Selected { handler, name })
                }
                None => State::ActionInside,
            },
            State::ActionSync(selected) => {
                if let Err(e) = selected.handler.on_action_executing(&mut self.action_executing) {
                    let error = self.capture(e, Phase::ActionFilter);
                    return self.raise(Region::Action, error);
                }
                if let Some(result) = self.action_executing.result.clone() {
                    self.note_short_circuit(FilterKind::Action, &selected.name);
                    self.action_executed =
                        Some(ActionExecutedContext::canceled(self.scope.clone(), Some(result)));
                    State::ActionEnd
                } else {
                    self.frames.push(Frame::Action(selected));
                    State::ActionNext
                }
            }
            State::ActionAsync(selected) => {
                let mut execution = ActionExecution::new(self, Arc::clone(&selected.name));
                let outcome = selected.handler.on_action_execution(&mut execution).await;
                let proceeded = execution.has_proceeded();
                if let Some(violation) = self.violation.take() {
                    return Err(Fault::Protocol(violation));
                }
                if let Err(e) = outcome {
                    let error = self.capture(e, Phase::ActionFilter);
                    return self.raise(Region::Action, error);
                }
                if !proceeded {
                    self.note_short_circuit(FilterKind::Action, &selected.name);
                    let result = self.action_executing.result.clone();
                    self.action_executed =
                        Some(ActionExecutedContext::canceled(self.scope.clone(), result));
                }
                State::ActionEnd
            }
            State::ActionInside => {
                let operation = Arc::clone(self.scope.operation());
                let invocation = Arc::clone(self.scope.invocation());
                let returned = operation
                    .invoke(&invocation, &self.action_executing.arguments)
                    .resolve()
                    .await;
                match returned {
                    Ok(value) => {
                        self.action_executed = Some(ActionExecutedContext::completed(
                            self.scope.clone(),
                            value.into_outcome(),
                        ));
                        State::ActionEnd
                    }
                    Err(e) => {
                        let error = self.capture(e, Phase::Operation);
                        return self.raise(Region::Action, error);
                    }
                }
            }
            State::ActionEnd => {
                if let Some(selected) = self.frames.pop_action(base) {
                    let scope_ref = &self.scope;
                    let ctx = self
                        .action_executed
                        .get_or_insert_with(|| ActionExecutedContext::canceled(scope_ref.clone(), None));
                    if let Err(e) = selected.handler.on_action_executed(ctx) {
                        let error = self.capture(e, Phase::ActionFilter);
                        return self.raise(Region::Action, error);
                    }
                    return Ok(Step::Goto(State::ActionEnd));
                }
                if scope == Scope::Action {
                    return Ok(Step::Done);
                }
                let executed = self.action_executed.take();
                if let Some(error) = executed.as_ref().and_then(ActionExecutedContext::pending_error) {
                    return self.raise(Region::Exception, error);
                }
                self.result = Some(
                    executed
                        .and_then(|ctx| ctx.result)
                        .unwrap_or_else(EmptyOutcome::shared),
                );
                State::ChallengeBegin
            }

            // Result
            State::ResultBegin => {
                self.cursor.reset();
                self.result_executing = ResultExecutingContext::new(self.scope.clone(), self.pending_result());
                State::ResultNext
            }
            State::ResultNext => match self.cursor.next_filter::<ResultStage>() {
                Some(Selected { handler: Hook::Sync(handler), name }) => {
                    State::ResultSync(Selected { handler, name })
                }
                Some(Selected { handler: Hook::Async(handler), name }) => {
                    State::ResultAsync(Selected { handler, name })
                }
                None => State::ResultInside,
            },
            State::ResultSync(selected) => {
                if let Err(e) = selected.handler.on_result_executing(&mut self.result_executing) {
                    let error = self.capture(e, Phase::ResultFilter);
                    return self.raise(Region::Result, error);
                }
                if self.result_executing.cancel {
                    self.note_short_circuit(FilterKind::Result, &selected.name);
                    self.result_executed = Some(ResultExecutedContext::canceled(
                        self.scope.clone(),
                        Arc::clone(&self.result_executing.outcome),
                    ));
                    State::ResultEnd
                } else {
                    self.frames.push(Frame::Result(selected));
                    State::ResultNext
                }
            }
            State::ResultAsync(selected) => {
                let mut execution = ResultExecution::new(self, Arc::clone(&selected.name));
                let outcome = selected.handler.on_result_execution(&mut execution).await;
                let proceeded = execution.has_proceeded();
                if let Some(violation) = self.violation.take() {
                    return Err(Fault::Protocol(violation));
                }
                if let Err(e) = outcome {
                    let error = self.capture(e, Phase::ResultFilter);
                    return self.raise(Region::Result, error);
                }
                if !proceeded {
                    self.note_short_circuit(FilterKind::Result, &selected.name);
                    self.result_executed = Some(ResultExecutedContext::canceled(
                        self.scope.clone(),
                        Arc::clone(&self.result_executing.outcome),
                    ));
                }
                State::ResultEnd
            }
            State::ResultInside => {
                let outcome = Arc::clone(&self.result_executing.outcome);
                if let Err(e) = outcome.execute(self.scope.invocation()) {
                    let error = self.capture(e, Phase::Outcome);
                    return self.raise(Region::Result, error);
                }
                self.emit(OUTCOME_EXECUTED, json!({ "outcome": format!("{outcome:?}") }));
                self.result_executed = Some(ResultExecutedContext::completed(self.scope.clone(), outcome));
                State::ResultEnd
            }
            State::ResultEnd => {
                if let Some(selected) = self.frames.pop_result(base) {
                    let scope_ref = &self.scope;
                    let outcome = &self.result_executing.outcome;
                    let ctx = self.result_executed.get_or_insert_with(|| {
                        ResultExecutedContext::canceled(scope_ref.clone(), Arc::clone(outcome))
                    });
                    if let Err(e) = selected.handler.on_result_executed(ctx) {
                        let error = self.capture(e, Phase::ResultFilter);
                        return self.raise(Region::Result, error);
                    }
                    return Ok(Step::Goto(State::ResultEnd));
                }
                if scope == Scope::Result {
                    return Ok(Step::Done);
                }
                let executed = self.result_executed.take();
                if let Some(error) = executed.as_ref().and_then(ResultExecutedContext::pending_error) {
                    return self.raise(Region::Exception, error);
                }
                State::ExceptionEnd
            }

            State::InvokeEnd => return Ok(Step::Done),
        };
        Ok(Step::Goto(next))
    }

    fn after_authorization(&mut self, outcome: anyhow::Result<()>, filter: &str) -> Result<State, Fault> {
        if let Err(e) = outcome {
            let error = self.capture(e, Phase::Authorization);
            return Err(Fault::Raised(error));
        }
        Ok(match self.authorization.result.clone() {
            Some(result) => self.short_circuit(FilterKind::Authorization, filter, result),
            None => State::AuthorizationNext,
        })
    }

    /// Ends the pipeline early: the result bypasses all remaining stages.
    fn short_circuit(&mut self, kind: FilterKind, filter: &str, result: OutcomeRef) -> State {
        self.note_short_circuit(kind, filter);
        self.result = Some(result);
        self.bypass_result_filters = true;
        State::ChallengeBegin
    }

    fn note_short_circuit(&self, kind: FilterKind, filter: &str) {
        debug!(stage = %kind, filter = %filter, "filter short-circuited");
        self.emit(FILTER_SHORT_CIRCUIT, json!({ "stage": kind, "filter": filter }));
    }

    fn pending_result(&self) -> OutcomeRef {
        self.result.clone().unwrap_or_else(EmptyOutcome::shared)
    }

    fn ambient_region(&self) -> Region {
        if self.in_exception_region {
            Region::Exception
        } else {
            Region::Caller
        }
    }

    /// Records an error at the point it was first raised.
    fn capture(&self, error: anyhow::Error, phase: Phase) -> CapturedError {
        let captured = CapturedError::capture(error, phase);
        debug!(phase = %phase, error = %captured, abort = captured.is_abort(), "error captured");
        self.emit(
            EXCEPTION_CAPTURED,
            json!({ "phase": phase, "message": captured.to_string(), "abort": captured.is_abort() }),
        );
        captured
    }

    /// Delivers an error to the innermost level able to observe it.
    ///
    /// A new error replaces the one in flight for filters to observe, but an
    /// abort already in flight stays pending underneath it.
    fn raise(&mut self, region: Region, error: CapturedError) -> Result<Step, Fault> {
        let next = match region {
            Region::Action => {
                let abort = self
                    .action_executed
                    .as_ref()
                    .and_then(ActionExecutedContext::in_flight_abort);
                self.action_executed =
                    Some(ActionExecutedContext::failed(self.scope.clone(), error).carrying(abort));
                State::ActionEnd
            }
            Region::Result => {
                let abort = self
                    .result_executed
                    .as_ref()
                    .and_then(ResultExecutedContext::in_flight_abort);
                self.result_executed = Some(
                    ResultExecutedContext::failed(
                        self.scope.clone(),
                        Arc::clone(&self.result_executing.outcome),
                        error,
                    )
                    .carrying(abort),
                );
                State::ResultEnd
            }
            Region::Exception => {
                let abort = self.exception.as_ref().and_then(ExceptionContext::in_flight_abort);
                self.exception =
                    Some(ExceptionContext::new(self.scope.clone(), error).carrying(abort));
                State::ExceptionEnd
            }
            Region::Caller => return Err(Fault::Raised(error)),
        };
        Ok(Step::Goto(next))
    }
}
