//! Filter traits.
//!
//! A filter is registered once as an `Arc<dyn Filter>` and asked, per stage,
//! whether it implements that stage's capability. The answer is a [`Hook`]
//! carrying either the synchronous or the asynchronous handler, or `None`.

use async_trait::async_trait;
use std::sync::Arc;

use super::{FilterKind, FilterScope};
use crate::context::{
    ActionExecutedContext, ActionExecutingContext, AuthenticationChallengeContext,
    AuthenticationContext, AuthorizationContext, ExceptionContext, ResultExecutedContext,
    ResultExecutingContext,
};
use crate::engine::{ActionExecution, ResultExecution};

/// A capability handler, in its synchronous or asynchronous flavour.
pub enum Hook<S: ?Sized, A: ?Sized> {
    /// Immediate-return handler.
    Sync(Arc<S>),
    /// Suspension-capable handler.
    Async(Arc<A>),
}

impl<S: ?Sized, A: ?Sized> Clone for Hook<S, A> {
    fn clone(&self) -> Self {
        match self {
            Self::Sync(handler) => Self::Sync(Arc::clone(handler)),
            Self::Async(handler) => Self::Async(Arc::clone(handler)),
        }
    }
}

impl<S: ?Sized, A: ?Sized> std::fmt::Debug for Hook<S, A> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sync(_) => f.write_str("Hook::Sync"),
            Self::Async(_) => f.write_str("Hook::Async"),
        }
    }
}

/// Authorization handler variants.
pub type AuthorizationHook = Hook<dyn AuthorizationFilter, dyn AsyncAuthorizationFilter>;
/// Exception handler variants.
pub type ExceptionHook = Hook<dyn ExceptionFilter, dyn AsyncExceptionFilter>;
/// Action handler variants.
pub type ActionHook = Hook<dyn ActionFilter, dyn AsyncActionFilter>;
/// Result handler variants.
pub type ResultHook = Hook<dyn ResultFilter, dyn AsyncResultFilter>;

/// A filter instance.
///
/// Every capability query defaults to `None`; implementors answer the ones
/// they support, typically with `Some(Hook::Sync(self))`.
pub trait Filter: Send + Sync {
    /// Returns the filter's name, used in logs and protocol errors.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// Returns the capability this filter overrides, if any.
    ///
    /// Filters of that kind registered at a lower scope are skipped.
    fn overrides(&self) -> Option<FilterKind> {
        None
    }

    /// Returns the authentication handler, if implemented.
    fn authentication(self: Arc<Self>) -> Option<Arc<dyn AuthenticationFilter>> {
        None
    }

    /// Returns the authorization handler, if implemented.
    fn authorization(self: Arc<Self>) -> Option<AuthorizationHook> {
        None
    }

    /// Returns the exception handler, if implemented.
    fn exception(self: Arc<Self>) -> Option<ExceptionHook> {
        None
    }

    /// Returns the action handler, if implemented.
    fn action(self: Arc<Self>) -> Option<ActionHook> {
        None
    }

    /// Returns the result handler, if implemented.
    fn result(self: Arc<Self>) -> Option<ResultHook> {
        None
    }
}

/// Authentication runs synchronously only.
pub trait AuthenticationFilter: Send + Sync {
    /// Authenticates the request. Setting `ctx.result` short-circuits.
    fn on_authentication(&self, ctx: &mut AuthenticationContext) -> anyhow::Result<()>;

    /// Contributes a challenge to the pending outcome.
    fn on_authentication_challenge(
        &self,
        _ctx: &mut AuthenticationChallengeContext,
    ) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Synchronous authorization.
pub trait AuthorizationFilter: Send + Sync {
    /// Authorizes the request. Setting `ctx.result` short-circuits.
    fn on_authorization(&self, ctx: &mut AuthorizationContext) -> anyhow::Result<()>;
}

/// Asynchronous authorization.
#[async_trait]
pub trait AsyncAuthorizationFilter: Send + Sync {
    /// Authorizes the request. Setting `ctx.result` short-circuits.
    async fn on_authorization(&self, ctx: &mut AuthorizationContext) -> anyhow::Result<()>;
}

/// Synchronous exception handling.
pub trait ExceptionFilter: Send + Sync {
    /// Called while unwinding, only when an exception is present and unhandled.
    fn on_exception(&self, ctx: &mut ExceptionContext) -> anyhow::Result<()>;
}

/// Asynchronous exception handling.
#[async_trait]
pub trait AsyncExceptionFilter: Send + Sync {
    /// Called while unwinding, only when an exception is present and unhandled.
    async fn on_exception(&self, ctx: &mut ExceptionContext) -> anyhow::Result<()>;
}

/// Synchronous action filter with separate pre- and post-hooks.
pub trait ActionFilter: Send + Sync {
    /// Runs before the operation. Setting `ctx.result` short-circuits.
    fn on_action_executing(&self, _ctx: &mut ActionExecutingContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Runs after the operation (or the inner short-circuit).
    fn on_action_executed(&self, _ctx: &mut ActionExecutedContext) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Asynchronous action filter.
///
/// The filter decides whether to call [`ActionExecution::proceed`]. Not
/// proceeding short-circuits; proceeding after setting a result, or more
/// than once, is a protocol violation.
#[async_trait]
pub trait AsyncActionFilter: Send + Sync {
    /// Wraps the remainder of the action stage.
    async fn on_action_execution(&self, execution: &mut ActionExecution<'_>)
        -> anyhow::Result<()>;
}

/// Synchronous result filter with separate pre- and post-hooks.
pub trait ResultFilter: Send + Sync {
    /// Runs before the outcome executes. Setting `ctx.cancel` short-circuits.
    fn on_result_executing(&self, _ctx: &mut ResultExecutingContext) -> anyhow::Result<()> {
        Ok(())
    }

    /// Runs after the outcome executed (or was canceled).
    fn on_result_executed(&self, _ctx: &mut ResultExecutedContext) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Asynchronous result filter.
#[async_trait]
pub trait AsyncResultFilter: Send + Sync {
    /// Wraps the remainder of the result stage.
    async fn on_result_execution(&self, execution: &mut ResultExecution<'_>)
        -> anyhow::Result<()>;
}

/// A filter registered at a scope.
#[derive(Clone)]
pub struct ScopedFilter {
    /// The filter instance.
    pub filter: Arc<dyn Filter>,
    /// The scope it was registered at.
    pub scope: FilterScope,
}

impl ScopedFilter {
    /// Registers a filter at a scope.
    pub fn new(filter: Arc<dyn Filter>, scope: FilterScope) -> Self {
        Self { filter, scope }
    }

    /// Registers a filter at [`FilterScope::Global`].
    pub fn global(filter: Arc<dyn Filter>) -> Self {
        Self::new(filter, FilterScope::Global)
    }

    /// Registers a filter at [`FilterScope::Controller`].
    pub fn controller(filter: Arc<dyn Filter>) -> Self {
        Self::new(filter, FilterScope::Controller)
    }

    /// Registers a filter at [`FilterScope::Action`].
    pub fn action(filter: Arc<dyn Filter>) -> Self {
        Self::new(filter, FilterScope::Action)
    }
}

impl std::fmt::Debug for ScopedFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScopedFilter")
            .field("filter", &self.filter.name())
            .field("scope", &self.scope)
            .finish()
    }
}
