//! A shared, ordered call log.

use parking_lot::Mutex;
use std::sync::Arc;

/// Records which hooks ran, in order.
///
/// Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    entries: Arc<Mutex<Vec<String>>>,
}

impl CallLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an entry.
    pub fn push(&self, entry: impl Into<String>) {
        self.entries.lock().push(entry.into());
    }

    /// Returns all entries.
    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().clone()
    }

    /// Returns how often `entry` was recorded.
    pub fn count(&self, entry: &str) -> usize {
        self.entries.lock().iter().filter(|e| *e == entry).count()
    }

    /// Clears the log.
    pub fn clear(&self) {
        self.entries.lock().clear();
    }

    /// Returns a hook closure that records `entry` and succeeds.
    pub fn hook<C>(&self, entry: &str) -> impl Fn(&mut C) -> anyhow::Result<()> + Send + Sync + 'static {
        let log = self.clone();
        let entry = entry.to_string();
        move |_| {
            log.push(entry.clone());
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clones_share_entries() {
        let log = CallLog::new();
        let other = log.clone();

        log.push("a");
        other.push("b");
        (log.hook::<()>("c"))(&mut ()).unwrap();

        assert_eq!(log.entries(), vec!["a", "b", "c"]);
        assert_eq!(other.count("b"), 1);
        other.clear();
        assert!(log.entries().is_empty());
    }
}
