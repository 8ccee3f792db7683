//! The invoker front door: resolve by name, then run the pipeline.

use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::runtime::Handle;
use tracing::{debug, info_span, Instrument};

use crate::completion::{self, AsyncResult, AsyncState, Callback};
use crate::config::InvokerConfig;
use crate::context::{Arguments, InvocationContext};
use crate::engine::{Pipeline, RequestValidator};
use crate::errors::{CapturedError, FilterflowError, Phase};
use crate::events::{EventSink, NoOpEventSink, PipelineEvent, INVOCATION_NOT_FOUND};
use crate::filters::ScopedFilter;
use crate::operation::Operation;

/// Resolves operations, their arguments and their filters.
#[cfg_attr(test, mockall::automock)]
pub trait ActionResolver: Send + Sync {
    /// Looks up the operation addressed by `name`.
    fn find_operation(&self, ctx: &InvocationContext, name: &str) -> Option<Arc<dyn Operation>>;

    /// Binds the operation's arguments.
    fn arguments(
        &self,
        ctx: &InvocationContext,
        operation: &Arc<dyn Operation>,
    ) -> anyhow::Result<Arguments>;

    /// Returns the filters for the operation, ordered by scope ascending.
    fn filters(&self, ctx: &InvocationContext, operation: &Arc<dyn Operation>) -> Vec<ScopedFilter>;

    /// Returns the request validation hook, if any.
    fn validator(&self) -> Option<Arc<dyn RequestValidator>> {
        None
    }
}

/// An in-memory resolver keyed by operation name.
///
/// Arguments are bound from the invocation's request parameters. Filters are
/// the global ones followed by the operation's own, stably sorted by scope.
#[derive(Default)]
pub struct ActionTable {
    operations: HashMap<String, Arc<dyn Operation>>,
    global_filters: Vec<ScopedFilter>,
    operation_filters: HashMap<String, Vec<ScopedFilter>>,
    validator: Option<Arc<dyn RequestValidator>>,
}

impl ActionTable {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers an operation under its name.
    #[must_use]
    pub fn with_operation(mut self, operation: Arc<dyn Operation>) -> Self {
        self.operations
            .insert(operation.name().to_string(), operation);
        self
    }

    /// Registers a filter for every operation.
    #[must_use]
    pub fn with_global_filter(mut self, filter: ScopedFilter) -> Self {
        self.global_filters.push(filter);
        self
    }

    /// Registers a filter for one operation.
    #[must_use]
    pub fn with_operation_filter(mut self, operation: &str, filter: ScopedFilter) -> Self {
        self.operation_filters
            .entry(operation.to_string())
            .or_default()
            .push(filter);
        self
    }

    /// Sets the request validation hook.
    #[must_use]
    pub fn with_validator(mut self, validator: Arc<dyn RequestValidator>) -> Self {
        self.validator = Some(validator);
        self
    }
}

impl ActionResolver for ActionTable {
    fn find_operation(&self, _ctx: &InvocationContext, name: &str) -> Option<Arc<dyn Operation>> {
        self.operations.get(name).cloned()
    }

    fn arguments(
        &self,
        ctx: &InvocationContext,
        _operation: &Arc<dyn Operation>,
    ) -> anyhow::Result<Arguments> {
        Ok(ctx.parameters().clone())
    }

    fn filters(&self, _ctx: &InvocationContext, operation: &Arc<dyn Operation>) -> Vec<ScopedFilter> {
        let mut filters = self.global_filters.clone();
        if let Some(own) = self.operation_filters.get(operation.name()) {
            filters.extend(own.iter().cloned());
        }
        filters.sort_by_key(|f| f.scope);
        filters
    }

    fn validator(&self) -> Option<Arc<dyn RequestValidator>> {
        self.validator.clone()
    }
}

/// Invokes operations by name through the filter pipeline.
pub struct ActionInvoker {
    resolver: Arc<dyn ActionResolver>,
    config: InvokerConfig,
    sink: Arc<dyn EventSink>,
}

impl ActionInvoker {
    /// Creates an invoker over a resolver.
    pub fn new(resolver: Arc<dyn ActionResolver>) -> Self {
        Self {
            resolver,
            config: InvokerConfig::default(),
            sink: Arc::new(NoOpEventSink),
        }
    }

    /// Sets the configuration.
    #[must_use]
    pub fn with_config(mut self, config: InvokerConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Returns the configuration.
    pub fn config(&self) -> &InvokerConfig {
        &self.config
    }

    /// Invokes the operation called `name`.
    ///
    /// Returns `Ok(false)` when no such operation exists; nothing runs in
    /// that case. Returns `Ok(true)` once the pipeline completed.
    pub async fn invoke_action(
        &self,
        ctx: Arc<InvocationContext>,
        name: &str,
    ) -> Result<bool, FilterflowError> {
        if name.trim().is_empty() {
            return Err(FilterflowError::InvalidArgument {
                name: "name".to_string(),
                reason: "operation name must not be empty".to_string(),
            });
        }

        let span = info_span!("invoke_action", action = %name, request_id = %ctx.request_id());
        async move {
            let Some(operation) = self.resolver.find_operation(&ctx, name) else {
                debug!(action = %name, "operation not found");
                if self.config.emit_events {
                    self.sink.emit(
                        PipelineEvent::new(INVOCATION_NOT_FOUND, ctx.request_id())
                            .with_data(json!({ "operation": name })),
                    );
                }
                return Ok(false);
            };

            let arguments = self.resolver.arguments(&ctx, &operation).map_err(|e| {
                FilterflowError::Binding {
                    operation: name.to_string(),
                    source: CapturedError::capture(e, Phase::Binding),
                }
            })?;
            let filters = self.resolver.filters(&ctx, &operation);
            debug!(action = %name, filters = filters.len(), "operation resolved");

            let mut pipeline = Pipeline::new(ctx, operation, arguments, filters)
                .with_config(self.config.clone())
                .with_event_sink(Arc::clone(&self.sink));
            if let Some(validator) = self.resolver.validator() {
                pipeline = pipeline.with_validator(validator);
            }
            pipeline.run().await?;
            Ok(true)
        }
        .instrument(span)
        .await
    }

    /// Starts [`ActionInvoker::invoke_action`] in the callback convention.
    pub fn begin_invoke_action(
        self: &Arc<Self>,
        handle: &Handle,
        ctx: Arc<InvocationContext>,
        name: impl Into<String>,
        callback: Option<Callback<Result<bool, FilterflowError>>>,
        state: Option<AsyncState>,
    ) -> AsyncResult<Result<bool, FilterflowError>> {
        let invoker = Arc::clone(self);
        let name = name.into();
        completion::begin(
            handle,
            async move { invoker.invoke_action(ctx, &name).await },
            callback,
            state,
        )
    }

    /// Finishes a call started with [`ActionInvoker::begin_invoke_action`].
    ///
    /// Blocks until the invocation completes.
    pub fn end_invoke_action(
        result: &AsyncResult<Result<bool, FilterflowError>>,
    ) -> Result<bool, FilterflowError> {
        result.end()?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{FnActionFilter, FilterScope};
    use crate::operation::FnOperation;
    use crate::outcome::ReturnValue;
    use crate::testing::CallLog;
    use serde_json::json;

    fn echo() -> Arc<dyn Operation> {
        Arc::new(FnOperation::new("echo", |_, args| {
            Ok(ReturnValue::Value(args.get("msg").cloned().unwrap_or_default()))
        }))
    }

    #[tokio::test]
    async fn test_not_found_runs_nothing() {
        let mut resolver = MockActionResolver::new();
        resolver.expect_find_operation().returning(|_, _| None);
        resolver.expect_arguments().never();
        resolver.expect_filters().never();

        let invoker = ActionInvoker::new(Arc::new(resolver));
        let found = invoker
            .invoke_action(Arc::new(InvocationContext::new()), "missing")
            .await
            .unwrap();

        assert!(!found);
    }

    #[tokio::test]
    async fn test_empty_name_is_rejected() {
        let invoker = ActionInvoker::new(Arc::new(ActionTable::new()));
        let err = invoker
            .invoke_action(Arc::new(InvocationContext::new()), "  ")
            .await
            .unwrap_err();

        assert!(matches!(err, FilterflowError::InvalidArgument { .. }));
    }

    #[tokio::test]
    async fn test_binding_failure_is_reported() {
        let mut resolver = MockActionResolver::new();
        resolver
            .expect_find_operation()
            .returning(|_, _| Some(echo()));
        resolver
            .expect_arguments()
            .returning(|_, _| Err(anyhow::anyhow!("missing parameter 'msg'")));
        resolver.expect_filters().never();

        let invoker = ActionInvoker::new(Arc::new(resolver));
        let err = invoker
            .invoke_action(Arc::new(InvocationContext::new()), "echo")
            .await
            .unwrap_err();

        match err {
            FilterflowError::Binding { operation, source } => {
                assert_eq!(operation, "echo");
                assert_eq!(source.phase(), Phase::Binding);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_table_binds_parameters_and_orders_filters() {
        let log = CallLog::new();
        let table = ActionTable::new()
            .with_operation(echo())
            .with_operation_filter(
                "echo",
                ScopedFilter::action(Arc::new(
                    FnActionFilter::new("own").on_executing(log.hook("own")),
                )),
            )
            .with_global_filter(ScopedFilter::new(
                Arc::new(FnActionFilter::new("first").on_executing(log.hook("first"))),
                FilterScope::First,
            ));

        let ctx = Arc::new(InvocationContext::new().with_parameter("msg", json!("hi")));
        let invoker = ActionInvoker::new(Arc::new(table));

        assert!(invoker.invoke_action(Arc::clone(&ctx), "echo").await.unwrap());
        assert_eq!(log.entries(), vec!["first", "own"]);
        assert_eq!(ctx.response(), vec![json!("hi")]);
    }

    #[tokio::test]
    async fn test_begin_end_invoke_action() {
        let table = ActionTable::new().with_operation(echo());
        let invoker = Arc::new(ActionInvoker::new(Arc::new(table)));
        let ctx = Arc::new(InvocationContext::new().with_parameter("msg", json!(1)));

        let result = invoker.begin_invoke_action(&Handle::current(), Arc::clone(&ctx), "echo", None, None);

        assert!(result.completed_synchronously());
        assert!(ActionInvoker::end_invoke_action(&result).unwrap());
        assert_eq!(ctx.response(), vec![json!(1)]);
    }

    #[tokio::test]
    async fn test_from_begin_end_over_invoker() {
        let table = ActionTable::new();
        let invoker = Arc::new(ActionInvoker::new(Arc::new(table)));
        let handle = Handle::current();

        let found = completion::from_begin_end(
            |callback| {
                invoker.begin_invoke_action(
                    &handle,
                    Arc::new(InvocationContext::new()),
                    "nope",
                    Some(callback),
                    None,
                )
            },
            ActionInvoker::end_invoke_action,
        )
        .await
        .unwrap();

        assert!(!found);
    }
}
