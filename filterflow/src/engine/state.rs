//! Engine states and the frame stack of entered filters.

use std::sync::Arc;

use crate::cursor::Selected;
use crate::filters::{
    ActionFilter, AsyncActionFilter, AsyncAuthorizationFilter, AsyncResultFilter,
    AuthenticationFilter, AuthorizationFilter, ExceptionHook, ResultFilter,
};

/// One state of the pipeline machine.
///
/// Stages move through Begin, Next, Sync/Async, Inside and End sub-states.
/// States that invoke a filter carry the handler picked by the cursor.
pub(crate) enum State {
    InvokeBegin,

    AuthenticationBegin,
    AuthenticationNext,
    AuthenticationSync(Selected<Arc<dyn AuthenticationFilter>>),

    ChallengeBegin,
    ChallengeNext,
    ChallengeSync(Selected<Arc<dyn AuthenticationFilter>>),
    ChallengeEnd,

    AuthorizationBegin,
    AuthorizationNext,
    AuthorizationSync(Selected<Arc<dyn AuthorizationFilter>>),
    AuthorizationAsync(Selected<Arc<dyn AsyncAuthorizationFilter>>),

    ExceptionBegin,
    ExceptionNext,
    ExceptionInside,
    ExceptionEnd,

    ActionBegin,
    ActionNext,
    ActionSync(Selected<Arc<dyn ActionFilter>>),
    ActionAsync(Selected<Arc<dyn AsyncActionFilter>>),
    ActionInside,
    ActionEnd,

    ResultBegin,
    ResultNext,
    ResultSync(Selected<Arc<dyn ResultFilter>>),
    ResultAsync(Selected<Arc<dyn AsyncResultFilter>>),
    ResultInside,
    ResultEnd,

    InvokeEnd,
}

impl State {
    pub(crate) fn label(&self) -> &'static str {
        match self {
            Self::InvokeBegin => "invoke_begin",
            Self::AuthenticationBegin => "authentication_begin",
            Self::AuthenticationNext => "authentication_next",
            Self::AuthenticationSync(_) => "authentication_sync",
            Self::ChallengeBegin => "challenge_begin",
            Self::ChallengeNext => "challenge_next",
            Self::ChallengeSync(_) => "challenge_sync",
            Self::ChallengeEnd => "challenge_end",
            Self::AuthorizationBegin => "authorization_begin",
            Self::AuthorizationNext => "authorization_next",
            Self::AuthorizationSync(_) => "authorization_sync",
            Self::AuthorizationAsync(_) => "authorization_async",
            Self::ExceptionBegin => "exception_begin",
            Self::ExceptionNext => "exception_next",
            Self::ExceptionInside => "exception_inside",
            Self::ExceptionEnd => "exception_end",
            Self::ActionBegin => "action_begin",
            Self::ActionNext => "action_next",
            Self::ActionSync(_) => "action_sync",
            Self::ActionAsync(_) => "action_async",
            Self::ActionInside => "action_inside",
            Self::ActionEnd => "action_end",
            Self::ResultBegin => "result_begin",
            Self::ResultNext => "result_next",
            Self::ResultSync(_) => "result_sync",
            Self::ResultAsync(_) => "result_async",
            Self::ResultInside => "result_inside",
            Self::ResultEnd => "result_end",
            Self::InvokeEnd => "invoke_end",
        }
    }
}

/// What a run of the machine is responsible for.
///
/// The top-level run drives the whole invocation. An async action or result
/// filter that proceeds starts a nested run that returns once its stage has
/// unwound back to the frame depth it started at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scope {
    Invoker,
    Action,
    Result,
}

/// Transition returned by a step.
pub(crate) enum Step {
    Goto(State),
    Done,
}

/// A filter whose post-hook is still owed.
pub(crate) enum Frame {
    Exception(Selected<ExceptionHook>),
    Action(Selected<Arc<dyn ActionFilter>>),
    Result(Selected<Arc<dyn ResultFilter>>),
}

/// Entered filters, innermost last.
///
/// Synchronous chains of any length live here rather than on the call stack.
#[derive(Default)]
pub(crate) struct FrameStack {
    frames: Vec<Frame>,
}

impl FrameStack {
    pub(crate) fn len(&self) -> usize {
        self.frames.len()
    }

    pub(crate) fn push(&mut self, frame: Frame) {
        self.frames.push(frame);
    }

    pub(crate) fn pop_exception(&mut self, base: usize) -> Option<Selected<ExceptionHook>> {
        match self.frames.last() {
            Some(Frame::Exception(_)) if self.frames.len() > base => match self.frames.pop() {
                Some(Frame::Exception(selected)) => Some(selected),
                _ => None,
            },
            _ => None,
        }
    }

    pub(crate) fn pop_action(&mut self, base: usize) -> Option<Selected<Arc<dyn ActionFilter>>> {
        match self.frames.last() {
            Some(Frame::Action(_)) if self.frames.len() > base => match self.frames.pop() {
                Some(Frame::Action(selected)) => Some(selected),
                _ => None,
            },
            _ => None,
        }
    }

    pub(crate) fn pop_result(&mut self, base: usize) -> Option<Selected<Arc<dyn ResultFilter>>> {
        match self.frames.last() {
            Some(Frame::Result(_)) if self.frames.len() > base => match self.frames.pop() {
                Some(Frame::Result(selected)) => Some(selected),
                _ => None,
            },
            _ => None,
        }
    }
}
