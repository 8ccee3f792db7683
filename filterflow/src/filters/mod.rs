//! Filter kinds, traits and ready-made filters.
//!
//! This module provides:
//! - [`FilterKind`] and [`FilterScope`] for classification and overrides
//! - The [`Filter`] trait and one sync/async trait pair per capability
//! - Closure-backed filters, override markers and sync-to-async adapters

mod adapters;
mod capability;
mod closures;
mod kind;
mod traits;

pub use adapters::{AsyncActionFilterAdapter, AsyncResultFilterAdapter, OverrideFilter};
pub use capability::{
    capabilities_of, ActionStage, AuthenticationStage, AuthorizationStage, Capability,
    ExceptionStage, ResultStage,
};
pub use closures::{
    FnActionFilter, FnAuthenticationFilter, FnAuthorizationFilter, FnExceptionFilter,
    FnResultFilter,
};
pub use kind::{FilterKind, FilterScope, KindSet};
pub use traits::{
    ActionFilter, ActionHook, AsyncActionFilter, AsyncAuthorizationFilter, AsyncExceptionFilter,
    AsyncResultFilter, AuthenticationFilter, AuthorizationFilter, AuthorizationHook,
    ExceptionFilter, ExceptionHook, Filter, Hook, ResultFilter, ResultHook, ScopedFilter,
};
