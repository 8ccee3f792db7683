//! Contexts for one invocation.
//!
//! This module provides:
//! - The request-scoped [`InvocationContext`] shared by all stages
//! - The pre- and post-contexts handed to filters at each stage

mod invocation;
mod stages;

pub use invocation::{Arguments, InvocationContext, Principal};
pub use stages::{
    ActionExecutedContext, ActionExecutingContext, AuthenticationChallengeContext,
    AuthenticationContext, AuthorizationContext, ExceptionContext, ResultExecutedContext,
    ResultExecutingContext, StageScope,
};
