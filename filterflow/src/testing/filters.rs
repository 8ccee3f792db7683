//! Recording async filters.

use async_trait::async_trait;
use std::sync::Arc;

use super::CallLog;
use crate::context::{AuthorizationContext, ExceptionContext};
use crate::engine::{ActionExecution, ResultExecution};
use crate::outcome::OutcomeRef;
use crate::filters::{
    ActionHook, AsyncActionFilter, AsyncAuthorizationFilter, AsyncExceptionFilter,
    AsyncResultFilter, AuthorizationHook, ExceptionHook, Filter, Hook, ResultHook,
};

/// An async action filter that records `<name>:before` and `<name>:after`
/// around proceeding.
#[derive(Debug, Clone)]
pub struct RecordingActionFilter {
    name: String,
    log: CallLog,
}

impl RecordingActionFilter {
    /// Creates the filter.
    pub fn new(name: impl Into<String>, log: &CallLog) -> Self {
        Self {
            name: name.into(),
            log: log.clone(),
        }
    }
}

impl Filter for RecordingActionFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn action(self: Arc<Self>) -> Option<ActionHook> {
        Some(Hook::Async(self))
    }
}

#[async_trait]
impl AsyncActionFilter for RecordingActionFilter {
    async fn on_action_execution(
        &self,
        execution: &mut ActionExecution<'_>,
    ) -> anyhow::Result<()> {
        self.log.push(format!("{}:before", self.name));
        tokio::task::yield_now().await;
        execution.proceed().await?;
        self.log.push(format!("{}:after", self.name));
        Ok(())
    }
}

/// An async result filter that records around proceeding.
#[derive(Debug, Clone)]
pub struct RecordingResultFilter {
    name: String,
    log: CallLog,
}

impl RecordingResultFilter {
    /// Creates the filter.
    pub fn new(name: impl Into<String>, log: &CallLog) -> Self {
        Self {
            name: name.into(),
            log: log.clone(),
        }
    }
}

impl Filter for RecordingResultFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn result(self: Arc<Self>) -> Option<ResultHook> {
        Some(Hook::Async(self))
    }
}

#[async_trait]
impl AsyncResultFilter for RecordingResultFilter {
    async fn on_result_execution(
        &self,
        execution: &mut ResultExecution<'_>,
    ) -> anyhow::Result<()> {
        self.log.push(format!("{}:before", self.name));
        execution.proceed().await?;
        self.log.push(format!("{}:after", self.name));
        Ok(())
    }
}

/// An async authorization filter that records its call and optionally denies.
#[derive(Debug, Clone)]
pub struct RecordingAuthorizationFilter {
    name: String,
    log: CallLog,
    deny: Option<OutcomeRef>,
}

impl RecordingAuthorizationFilter {
    /// Creates a filter that allows the request.
    pub fn allow(name: impl Into<String>, log: &CallLog) -> Self {
        Self {
            name: name.into(),
            log: log.clone(),
            deny: None,
        }
    }

    /// Creates a filter that short-circuits with `outcome`.
    pub fn deny(name: impl Into<String>, log: &CallLog, outcome: OutcomeRef) -> Self {
        Self {
            name: name.into(),
            log: log.clone(),
            deny: Some(outcome),
        }
    }
}

impl Filter for RecordingAuthorizationFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn authorization(self: Arc<Self>) -> Option<AuthorizationHook> {
        Some(Hook::Async(self))
    }
}

#[async_trait]
impl AsyncAuthorizationFilter for RecordingAuthorizationFilter {
    async fn on_authorization(&self, ctx: &mut AuthorizationContext) -> anyhow::Result<()> {
        tokio::task::yield_now().await;
        self.log.push(self.name.clone());
        ctx.result.clone_from(&self.deny);
        Ok(())
    }
}

/// An async exception filter that records calls and optionally handles.
#[derive(Debug, Clone)]
pub struct RecordingExceptionFilter {
    name: String,
    log: CallLog,
    handle_with: Option<OutcomeRef>,
}

impl RecordingExceptionFilter {
    /// Creates a filter that only observes.
    pub fn observe(name: impl Into<String>, log: &CallLog) -> Self {
        Self {
            name: name.into(),
            log: log.clone(),
            handle_with: None,
        }
    }

    /// Creates a filter that marks the exception handled with `outcome`.
    pub fn handle(name: impl Into<String>, log: &CallLog, outcome: OutcomeRef) -> Self {
        Self {
            name: name.into(),
            log: log.clone(),
            handle_with: Some(outcome),
        }
    }
}

impl Filter for RecordingExceptionFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn exception(self: Arc<Self>) -> Option<ExceptionHook> {
        Some(Hook::Async(self))
    }
}

#[async_trait]
impl AsyncExceptionFilter for RecordingExceptionFilter {
    async fn on_exception(&self, ctx: &mut ExceptionContext) -> anyhow::Result<()> {
        tokio::task::yield_now().await;
        self.log.push(self.name.clone());
        if let Some(outcome) = &self.handle_with {
            ctx.exception_handled = true;
            ctx.result = Some(Arc::clone(outcome));
        }
        Ok(())
    }
}
