//! The target operation a pipeline wraps.

use futures::future::BoxFuture;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use crate::context::{Arguments, InvocationContext};
use crate::outcome::ReturnValue;

/// The result of starting an operation.
pub enum OperationCall<'a> {
    /// The operation completed without suspending.
    Ready(anyhow::Result<ReturnValue>),
    /// The operation suspended; the engine awaits the future.
    Pending(BoxFuture<'a, anyhow::Result<ReturnValue>>),
}

impl OperationCall<'_> {
    /// Drives the call to completion.
    pub async fn resolve(self) -> anyhow::Result<ReturnValue> {
        match self {
            Self::Ready(result) => result,
            Self::Pending(future) => future.await,
        }
    }
}

/// The operation addressed by an invocation.
pub trait Operation: Send + Sync + fmt::Debug {
    /// Returns the operation's name.
    fn name(&self) -> &str;

    /// Starts the operation with bound arguments.
    fn invoke<'a>(&'a self, ctx: &'a InvocationContext, arguments: &'a Arguments)
        -> OperationCall<'a>;
}

type SyncBody = dyn Fn(&InvocationContext, &Arguments) -> anyhow::Result<ReturnValue> + Send + Sync;
type AsyncBody = dyn Fn(Arguments) -> BoxFuture<'static, anyhow::Result<ReturnValue>> + Send + Sync;

/// An operation backed by a synchronous closure.
#[derive(Clone)]
pub struct FnOperation {
    name: String,
    body: Arc<SyncBody>,
}

impl FnOperation {
    /// Creates a synchronous operation.
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(&InvocationContext, &Arguments) -> anyhow::Result<ReturnValue> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            body: Arc::new(body),
        }
    }

    /// Creates an operation that always returns the same value.
    pub fn returning(name: impl Into<String>, value: ReturnValue) -> Self {
        Self::new(name, move |_, _| Ok(value.clone()))
    }
}

impl fmt::Debug for FnOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnOperation").field("name", &self.name).finish()
    }
}

impl Operation for FnOperation {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke<'a>(
        &'a self,
        ctx: &'a InvocationContext,
        arguments: &'a Arguments,
    ) -> OperationCall<'a> {
        OperationCall::Ready((self.body)(ctx, arguments))
    }
}

/// An operation backed by an asynchronous closure.
#[derive(Clone)]
pub struct AsyncFnOperation {
    name: String,
    body: Arc<AsyncBody>,
}

impl AsyncFnOperation {
    /// Creates an asynchronous operation.
    pub fn new<F, Fut>(name: impl Into<String>, body: F) -> Self
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<ReturnValue>> + Send + 'static,
    {
        Self {
            name: name.into(),
            body: Arc::new(move |arguments| -> BoxFuture<'static, anyhow::Result<ReturnValue>> {
                Box::pin(body(arguments))
            }),
        }
    }
}

impl fmt::Debug for AsyncFnOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncFnOperation")
            .field("name", &self.name)
            .finish()
    }
}

impl Operation for AsyncFnOperation {
    fn name(&self) -> &str {
        &self.name
    }

    fn invoke<'a>(
        &'a self,
        _ctx: &'a InvocationContext,
        arguments: &'a Arguments,
    ) -> OperationCall<'a> {
        OperationCall::Pending((self.body)(arguments.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_fn_operation_reads_arguments() {
        let op = FnOperation::new("echo", |_, args| {
            Ok(ReturnValue::Value(args.get("x").cloned().unwrap_or_default()))
        });
        let ctx = InvocationContext::new();
        let args = Arguments::from([("x".to_string(), json!(3))]);

        let value = op.invoke(&ctx, &args).resolve().await.unwrap();
        assert!(matches!(value, ReturnValue::Value(v) if v == json!(3)));
        assert_eq!(op.name(), "echo");
    }

    #[tokio::test]
    async fn test_async_operation_is_pending() {
        let op = AsyncFnOperation::new("later", |_| async { Ok(ReturnValue::Unit) });
        let ctx = InvocationContext::new();
        let args = Arguments::new();

        let call = op.invoke(&ctx, &args);
        assert!(matches!(call, OperationCall::Pending(_)));
        assert!(matches!(call.resolve().await.unwrap(), ReturnValue::Unit));
    }
}
