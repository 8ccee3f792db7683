//! Outcomes: the executable objects a pipeline produces.

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use crate::context::InvocationContext;

/// Something that produces the observable response of an invocation.
///
/// Exactly one outcome is executed per successful invocation.
pub trait Outcome: Send + Sync + fmt::Debug {
    /// Executes the outcome against the invocation context.
    fn execute(&self, ctx: &InvocationContext) -> anyhow::Result<()>;
}

/// A shared outcome handle.
pub type OutcomeRef = Arc<dyn Outcome>;

/// An outcome that does nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyOutcome;

impl EmptyOutcome {
    /// Returns a shared empty outcome.
    #[must_use]
    pub fn shared() -> OutcomeRef {
        Arc::new(Self)
    }
}

impl Outcome for EmptyOutcome {
    fn execute(&self, _ctx: &InvocationContext) -> anyhow::Result<()> {
        Ok(())
    }
}

/// An outcome that writes a value to the response.
#[derive(Debug, Clone, PartialEq)]
pub struct ContentOutcome {
    /// The value written.
    pub content: Value,
}

impl ContentOutcome {
    /// Creates a content outcome.
    #[must_use]
    pub fn new(content: impl Into<Value>) -> Self {
        Self {
            content: content.into(),
        }
    }

    /// Creates a shared content outcome.
    #[must_use]
    pub fn shared(content: impl Into<Value>) -> OutcomeRef {
        Arc::new(Self::new(content))
    }
}

impl Outcome for ContentOutcome {
    fn execute(&self, ctx: &InvocationContext) -> anyhow::Result<()> {
        ctx.write_response(self.content.clone());
        Ok(())
    }
}

/// The raw value returned by a target operation.
#[derive(Debug, Clone)]
pub enum ReturnValue {
    /// The operation returned nothing.
    Unit,
    /// A plain value.
    Value(Value),
    /// A ready-made outcome.
    Outcome(OutcomeRef),
}

impl ReturnValue {
    /// Converts the raw value into the outcome to execute.
    ///
    /// `Unit` and JSON `null` become [`EmptyOutcome`], other values become
    /// [`ContentOutcome`], outcomes are passed through.
    #[must_use]
    pub fn into_outcome(self) -> OutcomeRef {
        match self {
            Self::Unit | Self::Value(Value::Null) => EmptyOutcome::shared(),
            Self::Value(value) => ContentOutcome::shared(value),
            Self::Outcome(outcome) => outcome,
        }
    }
}

impl From<Value> for ReturnValue {
    fn from(value: Value) -> Self {
        Self::Value(value)
    }
}

impl From<OutcomeRef> for ReturnValue {
    fn from(outcome: OutcomeRef) -> Self {
        Self::Outcome(outcome)
    }
}

impl From<()> for ReturnValue {
    fn from((): ()) -> Self {
        Self::Unit
    }
}
