//! Closure-backed filters.
//!
//! Handy for tests and for small cross-cutting concerns that do not warrant
//! a dedicated type. Every filter here is synchronous; write a type
//! implementing one of the `Async*` traits for suspension-capable filters.

use std::sync::Arc;

use super::{
    ActionFilter, ActionHook, AuthenticationFilter, AuthorizationFilter, AuthorizationHook,
    ExceptionFilter, ExceptionHook, Filter, FilterKind, Hook, ResultFilter, ResultHook,
};
use crate::context::{
    ActionExecutedContext, ActionExecutingContext, AuthenticationChallengeContext,
    AuthenticationContext, AuthorizationContext, ExceptionContext, ResultExecutedContext,
    ResultExecutingContext,
};

type HookFn<C> = Box<dyn Fn(&mut C) -> anyhow::Result<()> + Send + Sync>;

fn boxed<C, F>(f: F) -> HookFn<C>
where
    F: Fn(&mut C) -> anyhow::Result<()> + Send + Sync + 'static,
{
    Box::new(f)
}

fn call<C>(hook: Option<&HookFn<C>>, ctx: &mut C) -> anyhow::Result<()> {
    hook.map_or(Ok(()), |f| f(ctx))
}

/// An authentication filter built from closures.
pub struct FnAuthenticationFilter {
    name: String,
    overrides: Option<FilterKind>,
    authenticate: HookFn<AuthenticationContext>,
    challenge: Option<HookFn<AuthenticationChallengeContext>>,
}

impl FnAuthenticationFilter {
    /// Creates a filter from its authentication hook.
    pub fn new<F>(name: impl Into<String>, authenticate: F) -> Self
    where
        F: Fn(&mut AuthenticationContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            overrides: None,
            authenticate: boxed(authenticate),
            challenge: None,
        }
    }

    /// Sets the challenge hook.
    #[must_use]
    pub fn on_challenge<F>(mut self, challenge: F) -> Self
    where
        F: Fn(&mut AuthenticationChallengeContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.challenge = Some(boxed(challenge));
        self
    }

    /// Declares an override of the given kind.
    #[must_use]
    pub fn overriding(mut self, kind: FilterKind) -> Self {
        self.overrides = Some(kind);
        self
    }
}

impl Filter for FnAuthenticationFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn overrides(&self) -> Option<FilterKind> {
        self.overrides
    }

    fn authentication(self: Arc<Self>) -> Option<Arc<dyn AuthenticationFilter>> {
        Some(self)
    }
}

impl AuthenticationFilter for FnAuthenticationFilter {
    fn on_authentication(&self, ctx: &mut AuthenticationContext) -> anyhow::Result<()> {
        (self.authenticate)(ctx)
    }

    fn on_authentication_challenge(
        &self,
        ctx: &mut AuthenticationChallengeContext,
    ) -> anyhow::Result<()> {
        call(self.challenge.as_ref(), ctx)
    }
}

/// An authorization filter built from a closure.
pub struct FnAuthorizationFilter {
    name: String,
    authorize: HookFn<AuthorizationContext>,
}

impl FnAuthorizationFilter {
    /// Creates a filter from its hook.
    pub fn new<F>(name: impl Into<String>, authorize: F) -> Self
    where
        F: Fn(&mut AuthorizationContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            authorize: boxed(authorize),
        }
    }
}

impl Filter for FnAuthorizationFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn authorization(self: Arc<Self>) -> Option<AuthorizationHook> {
        Some(Hook::Sync(self))
    }
}

impl AuthorizationFilter for FnAuthorizationFilter {
    fn on_authorization(&self, ctx: &mut AuthorizationContext) -> anyhow::Result<()> {
        (self.authorize)(ctx)
    }
}

/// An exception filter built from a closure.
pub struct FnExceptionFilter {
    name: String,
    handle: HookFn<ExceptionContext>,
}

impl FnExceptionFilter {
    /// Creates a filter from its hook.
    pub fn new<F>(name: impl Into<String>, handle: F) -> Self
    where
        F: Fn(&mut ExceptionContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            handle: boxed(handle),
        }
    }
}

impl Filter for FnExceptionFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn exception(self: Arc<Self>) -> Option<ExceptionHook> {
        Some(Hook::Sync(self))
    }
}

impl ExceptionFilter for FnExceptionFilter {
    fn on_exception(&self, ctx: &mut ExceptionContext) -> anyhow::Result<()> {
        (self.handle)(ctx)
    }
}

/// An action filter built from optional pre- and post-hook closures.
pub struct FnActionFilter {
    name: String,
    executing: Option<HookFn<ActionExecutingContext>>,
    executed: Option<HookFn<ActionExecutedContext>>,
}

impl FnActionFilter {
    /// Creates a filter whose hooks do nothing.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            executing: None,
            executed: None,
        }
    }

    /// Sets the pre-hook.
    #[must_use]
    pub fn on_executing<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut ActionExecutingContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.executing = Some(boxed(f));
        self
    }

    /// Sets the post-hook.
    #[must_use]
    pub fn on_executed<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut ActionExecutedContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.executed = Some(boxed(f));
        self
    }
}

impl Filter for FnActionFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn action(self: Arc<Self>) -> Option<ActionHook> {
        Some(Hook::Sync(self))
    }
}

impl ActionFilter for FnActionFilter {
    fn on_action_executing(&self, ctx: &mut ActionExecutingContext) -> anyhow::Result<()> {
        call(self.executing.as_ref(), ctx)
    }

    fn on_action_executed(&self, ctx: &mut ActionExecutedContext) -> anyhow::Result<()> {
        call(self.executed.as_ref(), ctx)
    }
}

/// A result filter built from optional pre- and post-hook closures.
pub struct FnResultFilter {
    name: String,
    executing: Option<HookFn<ResultExecutingContext>>,
    executed: Option<HookFn<ResultExecutedContext>>,
}

impl FnResultFilter {
    /// Creates a filter whose hooks do nothing.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            executing: None,
            executed: None,
        }
    }

    /// Sets the pre-hook.
    #[must_use]
    pub fn on_executing<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut ResultExecutingContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.executing = Some(boxed(f));
        self
    }

    /// Sets the post-hook.
    #[must_use]
    pub fn on_executed<F>(mut self, f: F) -> Self
    where
        F: Fn(&mut ResultExecutedContext) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.executed = Some(boxed(f));
        self
    }
}

impl Filter for FnResultFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn result(self: Arc<Self>) -> Option<ResultHook> {
        Some(Hook::Sync(self))
    }
}

impl ResultFilter for FnResultFilter {
    fn on_result_executing(&self, ctx: &mut ResultExecutingContext) -> anyhow::Result<()> {
        call(self.executing.as_ref(), ctx)
    }

    fn on_result_executed(&self, ctx: &mut ResultExecutedContext) -> anyhow::Result<()> {
        call(self.executed.as_ref(), ctx)
    }
}
