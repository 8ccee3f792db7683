//! Outcomes that report what happened to them.

use std::sync::Arc;

use super::CallLog;
use crate::context::InvocationContext;
use crate::errors::Abort;
use crate::outcome::{Outcome, OutcomeRef};

/// An outcome that records `outcome:<name>` when executed.
#[derive(Debug, Clone)]
pub struct LoggingOutcome {
    name: String,
    log: CallLog,
}

impl LoggingOutcome {
    /// Creates a shared logging outcome.
    pub fn shared(name: impl Into<String>, log: &CallLog) -> OutcomeRef {
        Arc::new(Self {
            name: name.into(),
            log: log.clone(),
        })
    }
}

impl Outcome for LoggingOutcome {
    fn execute(&self, _ctx: &InvocationContext) -> anyhow::Result<()> {
        self.log.push(format!("outcome:{}", self.name));
        Ok(())
    }
}

/// An outcome whose execution fails with a message.
#[derive(Debug, Clone)]
pub struct FailingOutcome {
    message: String,
    log: CallLog,
}

impl FailingOutcome {
    /// Creates a shared failing outcome.
    pub fn shared(message: impl Into<String>, log: &CallLog) -> OutcomeRef {
        Arc::new(Self {
            message: message.into(),
            log: log.clone(),
        })
    }
}

impl Outcome for FailingOutcome {
    fn execute(&self, _ctx: &InvocationContext) -> anyhow::Result<()> {
        self.log.push("outcome:failing");
        Err(anyhow::anyhow!(self.message.clone()))
    }
}

/// An outcome whose execution aborts the invocation.
#[derive(Debug, Clone)]
pub struct AbortingOutcome {
    reason: String,
}

impl AbortingOutcome {
    /// Creates a shared aborting outcome.
    pub fn shared(reason: impl Into<String>) -> OutcomeRef {
        Arc::new(Self {
            reason: reason.into(),
        })
    }
}

impl Outcome for AbortingOutcome {
    fn execute(&self, _ctx: &InvocationContext) -> anyhow::Result<()> {
        Err(Abort::new(self.reason.clone()).into())
    }
}
