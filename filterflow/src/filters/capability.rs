//! Capability markers used to query filters generically.

use std::sync::Arc;

use super::{
    ActionHook, AuthenticationFilter, AuthorizationHook, ExceptionHook, Filter, FilterKind,
    KindSet, ResultHook,
};

/// A stage capability the cursor can search for.
pub trait Capability {
    /// The kind this capability corresponds to.
    const KIND: FilterKind;

    /// The handler handed out for a matching filter.
    type Handler: Clone;

    /// Queries a filter for this capability.
    fn query(filter: Arc<dyn Filter>) -> Option<Self::Handler>;
}

/// Authentication capability (sync only).
#[derive(Debug, Clone, Copy)]
pub struct AuthenticationStage;

/// Authorization capability.
#[derive(Debug, Clone, Copy)]
pub struct AuthorizationStage;

/// Exception capability.
#[derive(Debug, Clone, Copy)]
pub struct ExceptionStage;

/// Action capability.
#[derive(Debug, Clone, Copy)]
pub struct ActionStage;

/// Result capability.
#[derive(Debug, Clone, Copy)]
pub struct ResultStage;

impl Capability for AuthenticationStage {
    const KIND: FilterKind = FilterKind::Authentication;
    type Handler = Arc<dyn AuthenticationFilter>;

    fn query(filter: Arc<dyn Filter>) -> Option<Self::Handler> {
        filter.authentication()
    }
}

impl Capability for AuthorizationStage {
    const KIND: FilterKind = FilterKind::Authorization;
    type Handler = AuthorizationHook;

    fn query(filter: Arc<dyn Filter>) -> Option<Self::Handler> {
        filter.authorization()
    }
}

impl Capability for ExceptionStage {
    const KIND: FilterKind = FilterKind::Exception;
    type Handler = ExceptionHook;

    fn query(filter: Arc<dyn Filter>) -> Option<Self::Handler> {
        filter.exception()
    }
}

impl Capability for ActionStage {
    const KIND: FilterKind = FilterKind::Action;
    type Handler = ActionHook;

    fn query(filter: Arc<dyn Filter>) -> Option<Self::Handler> {
        filter.action()
    }
}

impl Capability for ResultStage {
    const KIND: FilterKind = FilterKind::Result;
    type Handler = ResultHook;

    fn query(filter: Arc<dyn Filter>) -> Option<Self::Handler> {
        filter.result()
    }
}

/// Returns every capability the filter implements.
pub fn capabilities_of(filter: &Arc<dyn Filter>) -> KindSet {
    let mut kinds = KindSet::empty();
    if AuthenticationStage::query(Arc::clone(filter)).is_some() {
        kinds.insert(FilterKind::Authentication);
    }
    if AuthorizationStage::query(Arc::clone(filter)).is_some() {
        kinds.insert(FilterKind::Authorization);
    }
    if ExceptionStage::query(Arc::clone(filter)).is_some() {
        kinds.insert(FilterKind::Exception);
    }
    if ActionStage::query(Arc::clone(filter)).is_some() {
        kinds.insert(FilterKind::Action);
    }
    if ResultStage::query(Arc::clone(filter)).is_some() {
        kinds.insert(FilterKind::Result);
    }
    kinds
}
