//! Ready-made filters: override markers and sync-to-async adapters.

use async_trait::async_trait;
use std::sync::Arc;

use super::{
    ActionFilter, ActionHook, AsyncActionFilter, AsyncResultFilter, Filter, FilterKind, Hook,
    ResultFilter, ResultHook,
};
use crate::engine::{ActionExecution, ResultExecution};

/// A filter that only declares an override of one kind.
///
/// Registered at scope S, it removes every filter implementing that kind
/// below S from the whole pipeline.
#[derive(Debug, Clone)]
pub struct OverrideFilter {
    kind: FilterKind,
    name: String,
}

impl OverrideFilter {
    /// Creates an override marker for `kind`.
    #[must_use]
    pub fn new(kind: FilterKind) -> Self {
        Self {
            kind,
            name: format!("override:{kind}"),
        }
    }
}

impl Filter for OverrideFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn overrides(&self) -> Option<FilterKind> {
        Some(self.kind)
    }
}

/// Runs a synchronous action filter through the continuation convention.
///
/// The pre-hook runs, the rest of the stage runs unless the pre-hook set a
/// result, then the post-hook sees the inner post-context.
#[derive(Debug)]
pub struct AsyncActionFilterAdapter<F> {
    inner: F,
}

impl<F> AsyncActionFilterAdapter<F> {
    /// Wraps a synchronous action filter.
    pub fn new(inner: F) -> Self {
        Self { inner }
    }
}

impl<F> Filter for AsyncActionFilterAdapter<F>
where
    F: Filter + ActionFilter + 'static,
{
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn overrides(&self) -> Option<FilterKind> {
        self.inner.overrides()
    }

    fn action(self: Arc<Self>) -> Option<ActionHook> {
        Some(Hook::Async(self))
    }
}

#[async_trait]
impl<F> AsyncActionFilter for AsyncActionFilterAdapter<F>
where
    F: ActionFilter,
{
    async fn on_action_execution(
        &self,
        execution: &mut ActionExecution<'_>,
    ) -> anyhow::Result<()> {
        self.inner.on_action_executing(execution.context_mut())?;
        if execution.context().result.is_some() {
            return Ok(());
        }
        let executed = execution.proceed().await?;
        self.inner.on_action_executed(executed)
    }
}

/// Runs a synchronous result filter through the continuation convention.
#[derive(Debug)]
pub struct AsyncResultFilterAdapter<F> {
    inner: F,
}

impl<F> AsyncResultFilterAdapter<F> {
    /// Wraps a synchronous result filter.
    pub fn new(inner: F) -> Self {
        Self { inner }
    }
}

impl<F> Filter for AsyncResultFilterAdapter<F>
where
    F: Filter + ResultFilter + 'static,
{
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn overrides(&self) -> Option<FilterKind> {
        self.inner.overrides()
    }

    fn result(self: Arc<Self>) -> Option<ResultHook> {
        Some(Hook::Async(self))
    }
}

#[async_trait]
impl<F> AsyncResultFilter for AsyncResultFilterAdapter<F>
where
    F: ResultFilter,
{
    async fn on_result_execution(
        &self,
        execution: &mut ResultExecution<'_>,
    ) -> anyhow::Result<()> {
        self.inner.on_result_executing(execution.context_mut())?;
        if execution.context().cancel {
            return Ok(());
        }
        let executed = execution.proceed().await?;
        self.inner.on_result_executed(executed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_filter_declares_kind_only() {
        let filter: Arc<dyn Filter> = Arc::new(OverrideFilter::new(FilterKind::Exception));

        assert_eq!(filter.overrides(), Some(FilterKind::Exception));
        assert_eq!(filter.name(), "override:exception");
        assert!(super::super::capabilities_of(&filter).is_empty());
    }
}
