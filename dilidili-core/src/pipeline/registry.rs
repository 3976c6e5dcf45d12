//! In-flight identifier registry.
//!
//! At most one invocation per identifier runs at a time. A second request for
//! an identifier that is still running is rejected rather than queued.

use std::collections::HashSet;
use std::sync::Arc;

use parking_lot::Mutex;

/// Set of identifiers with a live pipeline invocation.
#[derive(Debug, Clone, Default)]
pub struct InFlightRegistry {
    active: Arc<Mutex<HashSet<String>>>,
}

impl InFlightRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Claims `identifier`, or returns `None` when it is already claimed.
    ///
    /// The claim is released when the returned guard is dropped.
    pub fn try_acquire(&self, identifier: &str) -> Option<InFlightGuard> {
        let inserted = self.active.lock().insert(identifier.to_string());
        inserted.then(|| InFlightGuard {
            active: Arc::clone(&self.active),
            identifier: identifier.to_string(),
        })
    }

    pub fn is_active(&self, identifier: &str) -> bool {
        self.active.lock().contains(identifier)
    }

    pub fn active_count(&self) -> usize {
        self.active.lock().len()
    }
}

/// Claim on one identifier; released on drop.
#[derive(Debug)]
pub struct InFlightGuard {
    active: Arc<Mutex<HashSet<String>>>,
    identifier: String,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.active.lock().remove(&self.identifier);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_claim_is_rejected_until_release() {
        let registry = InFlightRegistry::new();

        let guard = registry.try_acquire("BV1abc").unwrap();
        assert!(registry.try_acquire("BV1abc").is_none());
        assert!(registry.is_active("BV1abc"));

        drop(guard);
        assert!(!registry.is_active("BV1abc"));
        assert!(registry.try_acquire("BV1abc").is_some());
    }

    #[test]
    fn test_distinct_identifiers_are_independent() {
        let registry = InFlightRegistry::new();

        let _first = registry.try_acquire("BV1abc").unwrap();
        let _second = registry.try_acquire("BV1xyz").unwrap();
        assert_eq!(registry.active_count(), 2);
    }

    #[test]
    fn test_clones_share_state() {
        let registry = InFlightRegistry::new();
        let clone = registry.clone();

        let _guard = registry.try_acquire("BV1abc").unwrap();
        assert!(clone.try_acquire("BV1abc").is_none());
    }
}
