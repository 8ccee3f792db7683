//! # Filterflow
//!
//! A staged request-filter pipeline engine.
//!
//! Filterflow runs an ordered set of cross-cutting filters around a single
//! target operation:
//!
//! - **Authentication**: establish or substitute the principal, issue challenges
//! - **Authorization**: allow the request or short-circuit it
//! - **Exception**: observe and recover from errors raised further in
//! - **Action**: wrap the target operation
//! - **Result**: wrap execution of the final outcome
//!
//! Every filter may be synchronous (pre/post hooks) or asynchronous (a
//! single hook receiving a continuation). Both run on one state machine
//! whose synchronous chains never grow the native call stack.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use filterflow::prelude::*;
//!
//! let table = ActionTable::new()
//!     .with_operation(Arc::new(FnOperation::returning("hello", json!("hi").into())))
//!     .with_global_filter(ScopedFilter::global(Arc::new(
//!         FnActionFilter::new("audit").on_executing(|ctx| Ok(())),
//!     )));
//!
//! let invoker = ActionInvoker::new(Arc::new(table));
//! let found = invoker.invoke_action(Arc::new(InvocationContext::new()), "hello").await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod completion;
pub mod config;
pub mod context;
pub mod cursor;
pub mod engine;
pub mod errors;
pub mod events;
pub mod filters;
pub mod invoker;
pub mod observability;
pub mod operation;
pub mod outcome;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::completion::{AsyncResult, Callback};
    pub use crate::config::InvokerConfig;
    pub use crate::context::{
        ActionExecutedContext, ActionExecutingContext, Arguments,
        AuthenticationChallengeContext, AuthenticationContext, AuthorizationContext,
        ExceptionContext, InvocationContext, Principal, ResultExecutedContext,
        ResultExecutingContext,
    };
    pub use crate::engine::{ActionExecution, Pipeline, RequestValidator, ResultExecution};
    pub use crate::errors::{
        Abort, CapturedError, FilterflowError, InvokeError, Phase, ProtocolViolation,
    };
    pub use crate::events::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::filters::{
        ActionFilter, AsyncActionFilter, AsyncAuthorizationFilter, AsyncExceptionFilter,
        AsyncResultFilter, AuthenticationFilter, AuthorizationFilter, ExceptionFilter, Filter,
        FilterKind, FilterScope, FnActionFilter, FnAuthenticationFilter, FnAuthorizationFilter,
        FnExceptionFilter, FnResultFilter, Hook, OverrideFilter, ResultFilter, ScopedFilter,
    };
    pub use crate::invoker::{ActionInvoker, ActionResolver, ActionTable};
    pub use crate::observability::{init_tracing, LoggingConfig};
    pub use crate::operation::{AsyncFnOperation, FnOperation, Operation};
    pub use crate::outcome::{ContentOutcome, EmptyOutcome, Outcome, OutcomeRef, ReturnValue};
}
