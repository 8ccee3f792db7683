//! Forward iteration over the filters of one invocation.

use std::sync::Arc;

use crate::filters::{
    capabilities_of, Capability, Filter, FilterKind, FilterScope, KindSet, ScopedFilter,
};

/// A handler picked by the cursor, with the name of the filter it came from.
#[derive(Debug, Clone)]
pub struct Selected<H> {
    /// The capability handler.
    pub handler: H,
    /// The owning filter's name.
    pub name: Arc<str>,
}

/// Highest overriding scope per kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct OverrideThresholds([FilterScope; 5]);

impl OverrideThresholds {
    /// Computes thresholds from the filters' override declarations.
    pub fn scan(filters: &[ScopedFilter]) -> Self {
        let mut thresholds = Self::default();
        for entry in filters {
            if let Some(kind) = entry.filter.overrides() {
                let slot = &mut thresholds.0[kind.index()];
                if entry.scope >= *slot {
                    *slot = entry.scope;
                }
            }
        }
        thresholds
    }

    /// Returns the threshold for a kind.
    pub fn get(&self, kind: FilterKind) -> FilterScope {
        self.0[kind.index()]
    }

    /// Returns true if a filter at `scope` implementing `kinds` is suppressed.
    ///
    /// Overriding any one of its kinds removes the filter from every stage.
    pub fn suppresses(&self, scope: FilterScope, kinds: KindSet) -> bool {
        kinds.iter().any(|kind| scope < self.get(kind))
    }
}

struct Entry {
    filter: Arc<dyn Filter>,
    name: Arc<str>,
    kinds: KindSet,
    suppressed: bool,
}

/// One-shot forward iterator over an ordered filter list.
///
/// Each stage calls [`FilterCursor::reset`] once and then pulls filters with
/// [`FilterCursor::next_filter`] until it returns `None`. An index is never
/// revisited within one traversal.
pub struct FilterCursor {
    entries: Vec<Entry>,
    thresholds: OverrideThresholds,
    index: usize,
}

impl FilterCursor {
    /// Builds a cursor, scanning override declarations in a single pass.
    pub fn new(filters: Vec<ScopedFilter>) -> Self {
        let thresholds = OverrideThresholds::scan(&filters);
        let entries = filters
            .into_iter()
            .map(|ScopedFilter { filter, scope }| {
                let kinds = capabilities_of(&filter);
                Entry {
                    name: Arc::from(filter.name()),
                    suppressed: thresholds.suppresses(scope, kinds),
                    kinds,
                    filter,
                }
            })
            .collect();

        Self {
            entries,
            thresholds,
            index: 0,
        }
    }

    /// Rewinds to the first filter.
    pub fn reset(&mut self) {
        self.index = 0;
    }

    /// Returns the override thresholds.
    pub fn thresholds(&self) -> OverrideThresholds {
        self.thresholds
    }

    /// Returns the number of registered filters.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns true if no filters are registered.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Advances to the next filter implementing `C`.
    pub fn next_filter<C: Capability>(&mut self) -> Option<Selected<C::Handler>> {
        while let Some(entry) = self.entries.get(self.index) {
            self.index += 1;
            if entry.suppressed || !entry.kinds.contains(C::KIND) {
                continue;
            }
            if let Some(handler) = C::query(Arc::clone(&entry.filter)) {
                return Some(Selected {
                    handler,
                    name: Arc::clone(&entry.name),
                });
            }
        }
        None
    }
}

impl std::fmt::Debug for FilterCursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FilterCursor")
            .field("len", &self.entries.len())
            .field("index", &self.index)
            .field("thresholds", &self.thresholds)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filters::{
        ActionFilter, ActionHook, ActionStage, AuthorizationStage, FnActionFilter,
        FnAuthorizationFilter, Hook, OverrideFilter, ResultFilter, ResultHook, ResultStage,
    };
    use pretty_assertions::assert_eq;

    fn names<C: Capability>(cursor: &mut FilterCursor) -> Vec<String> {
        cursor.reset();
        std::iter::from_fn(|| cursor.next_filter::<C>())
            .map(|selected| selected.name.to_string())
            .collect()
    }

    #[test]
    fn test_yields_only_matching_capability() {
        let mut cursor = FilterCursor::new(vec![
            ScopedFilter::global(Arc::new(FnActionFilter::new("a1"))),
            ScopedFilter::global(Arc::new(FnAuthorizationFilter::new("z1", |_| Ok(())))),
            ScopedFilter::action(Arc::new(FnActionFilter::new("a2"))),
        ]);

        assert_eq!(names::<ActionStage>(&mut cursor), vec!["a1", "a2"]);
        assert_eq!(names::<AuthorizationStage>(&mut cursor), vec!["z1"]);
        assert!(names::<ResultStage>(&mut cursor).is_empty());
    }

    #[test]
    fn test_exhausted_cursor_stays_exhausted() {
        let mut cursor = FilterCursor::new(vec![ScopedFilter::global(Arc::new(
            FnActionFilter::new("a1"),
        ))]);

        assert!(cursor.next_filter::<ActionStage>().is_some());
        assert!(cursor.next_filter::<ActionStage>().is_none());
        assert!(cursor.next_filter::<ActionStage>().is_none());
        cursor.reset();
        assert!(matches!(
            cursor.next_filter::<ActionStage>().map(|s| s.handler),
            Some(Hook::Sync(_))
        ));
    }

    #[test]
    fn test_override_suppresses_lower_scopes() {
        let mut cursor = FilterCursor::new(vec![
            ScopedFilter::global(Arc::new(FnActionFilter::new("global"))),
            ScopedFilter::controller(Arc::new(OverrideFilter::new(FilterKind::Action))),
            ScopedFilter::controller(Arc::new(FnActionFilter::new("controller"))),
            ScopedFilter::action(Arc::new(FnActionFilter::new("action"))),
        ]);

        assert_eq!(cursor.thresholds().get(FilterKind::Action), FilterScope::Controller);
        assert_eq!(
            names::<ActionStage>(&mut cursor),
            vec!["controller", "action"]
        );
    }

    #[test]
    fn test_highest_override_wins() {
        let filters = vec![
            ScopedFilter::action(Arc::new(OverrideFilter::new(FilterKind::Result))),
            ScopedFilter::global(Arc::new(OverrideFilter::new(FilterKind::Result))),
        ];

        let thresholds = OverrideThresholds::scan(&filters);
        assert_eq!(thresholds.get(FilterKind::Result), FilterScope::Action);
        assert_eq!(thresholds.get(FilterKind::Action), FilterScope::First);
    }

    struct ActionAndResult;

    impl Filter for ActionAndResult {
        fn name(&self) -> &str {
            "both"
        }

        fn action(self: Arc<Self>) -> Option<ActionHook> {
            Some(Hook::Sync(self))
        }

        fn result(self: Arc<Self>) -> Option<ResultHook> {
            Some(Hook::Sync(self))
        }
    }

    impl ActionFilter for ActionAndResult {}
    impl ResultFilter for ActionAndResult {}

    #[test]
    fn test_override_of_one_kind_skips_filter_everywhere() {
        let mut cursor = FilterCursor::new(vec![
            ScopedFilter::global(Arc::new(ActionAndResult)),
            ScopedFilter::action(Arc::new(OverrideFilter::new(FilterKind::Result))),
        ]);

        assert!(names::<ActionStage>(&mut cursor).is_empty());
        assert!(names::<ResultStage>(&mut cursor).is_empty());
    }
}
