//! Filter kinds and scopes.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The five filter capabilities, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterKind {
    /// Establishes the principal; may short-circuit or issue challenges.
    Authentication,
    /// Decides whether the operation may run.
    Authorization,
    /// Observes and recovers from errors raised inside the action region.
    Exception,
    /// Wraps the target operation.
    Action,
    /// Wraps execution of the final outcome.
    Result,
}

impl FilterKind {
    /// All kinds, in pipeline order.
    pub const ALL: [Self; 5] = [
        Self::Authentication,
        Self::Authorization,
        Self::Exception,
        Self::Action,
        Self::Result,
    ];

    pub(crate) const fn index(self) -> usize {
        match self {
            Self::Authentication => 0,
            Self::Authorization => 1,
            Self::Exception => 2,
            Self::Action => 3,
            Self::Result => 4,
        }
    }

    /// Returns the snake_case name of the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Authentication => "authentication",
            Self::Authorization => "authorization",
            Self::Exception => "exception",
            Self::Action => "action",
            Self::Result => "result",
        }
    }
}

impl fmt::Display for FilterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The tier a filter was registered at.
///
/// Filters are supplied ordered by scope ascending. A filter declaring an
/// override suppresses same-kind filters registered at a lower scope.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum FilterScope {
    /// Runs before everything else.
    #[default]
    First,
    /// Registered for every operation.
    Global,
    /// Registered on the operation's owner (e.g. a controller).
    Controller,
    /// Registered on the operation itself.
    Action,
    /// Runs after everything else.
    Last,
}

/// The set of capabilities a filter implements.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct KindSet(u8);

impl KindSet {
    /// Creates an empty set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Adds a kind.
    pub fn insert(&mut self, kind: FilterKind) {
        self.0 |= 1 << kind.index();
    }

    /// Returns true if the set contains the kind.
    #[must_use]
    pub const fn contains(self, kind: FilterKind) -> bool {
        self.0 & (1 << kind.index()) != 0
    }

    /// Returns true if the set is empty.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Iterates the kinds in the set, in pipeline order.
    pub fn iter(self) -> impl Iterator<Item = FilterKind> {
        FilterKind::ALL.into_iter().filter(move |kind| self.contains(*kind))
    }
}

impl FromIterator<FilterKind> for KindSet {
    fn from_iter<I: IntoIterator<Item = FilterKind>>(iter: I) -> Self {
        let mut set = Self::empty();
        for kind in iter {
            set.insert(kind);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scope_ordering() {
        assert!(FilterScope::First < FilterScope::Global);
        assert!(FilterScope::Global < FilterScope::Controller);
        assert!(FilterScope::Controller < FilterScope::Action);
        assert!(FilterScope::Action < FilterScope::Last);
    }

    #[test]
    fn test_kind_set() {
        let set: KindSet = [FilterKind::Result, FilterKind::Action].into_iter().collect();

        assert!(set.contains(FilterKind::Action));
        assert!(!set.contains(FilterKind::Exception));
        assert_eq!(
            set.iter().collect::<Vec<_>>(),
            vec![FilterKind::Action, FilterKind::Result]
        );
        assert!(KindSet::empty().is_empty());
    }

    #[test]
    fn test_kind_serializes_snake_case() {
        let json = serde_json::to_string(&FilterKind::Authorization).unwrap();
        assert_eq!(json, "\"authorization\"");
    }
}
