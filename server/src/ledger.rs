//! Per-identity record of the highest applied update sequence
//!
//! The ledger is the only idempotency mechanism the server has. It compares
//! sequence numbers and nothing else: two different payloads submitted under
//! the same (identity, sequence) pair are indistinguishable, and the second
//! one is dropped.
//!
//! The ledger has no lock of its own. It lives inside the state store and is
//! only touched from within the store's critical section.

use std::collections::HashMap;

#[derive(Debug, Default, Clone)]
pub struct SequenceLedger {
    last_applied: HashMap<String, i64>,
}

impl SequenceLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Highest sequence applied for `identity`, if any update was applied yet
    pub fn last_applied(&self, identity: &str) -> Option<i64> {
        self.last_applied.get(identity).copied()
    }

    /// Returns true if `sequence` has not been applied for `identity` yet.
    ///
    /// Does not record anything; callers that go on to apply the update must
    /// call [`accept`](Self::accept) afterwards.
    pub fn is_new(&self, identity: &str, sequence: i64) -> bool {
        match self.last_applied(identity) {
            Some(last) => sequence > last,
            None => true,
        }
    }

    /// Records `sequence` for `identity` if it is newer than the stored value.
    ///
    /// Returns whether the sequence was new. The stored value never decreases.
    pub fn accept(&mut self, identity: &str, sequence: i64) -> bool {
        if !self.is_new(identity, sequence) {
            return false;
        }
        self.last_applied.insert(identity.to_string(), sequence);
        true
    }

    /// Copy of every entry, for snapshots
    pub fn entries(&self) -> HashMap<String, i64> {
        self.last_applied.clone()
    }

    pub fn len(&self) -> usize {
        self.last_applied.len()
    }

    pub fn is_empty(&self) -> bool {
        self.last_applied.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_creation() {
        let ledger = SequenceLedger::new();
        assert!(ledger.is_empty());
        assert_eq!(ledger.last_applied("A"), None);
        assert!(ledger.is_new("A", 1));
    }

    #[test]
    fn test_accept_advances() {
        let mut ledger = SequenceLedger::new();
        assert!(ledger.accept("A", 1));
        assert!(ledger.accept("A", 2));
        assert_eq!(ledger.last_applied("A"), Some(2));
    }

    #[test]
    fn test_duplicate_is_not_new() {
        let mut ledger = SequenceLedger::new();
        assert!(ledger.accept("A", 5));
        assert!(!ledger.accept("A", 5));
        assert!(!ledger.is_new("A", 5));
        assert_eq!(ledger.last_applied("A"), Some(5));
    }

    #[test]
    fn test_never_decreases() {
        let mut ledger = SequenceLedger::new();
        ledger.accept("A", 10);
        assert!(!ledger.accept("A", 3));
        assert_eq!(ledger.last_applied("A"), Some(10));
    }

    #[test]
    fn test_out_of_order_arrival_ends_at_max() {
        let mut ledger = SequenceLedger::new();
        let accepted: Vec<bool> = [2, 1, 3].iter().map(|s| ledger.accept("A", *s)).collect();
        assert_eq!(accepted, vec![true, false, true]);
        assert_eq!(ledger.last_applied("A"), Some(3));
    }

    #[test]
    fn test_identities_are_independent() {
        let mut ledger = SequenceLedger::new();
        ledger.accept("A", 4);
        assert!(ledger.is_new("B", 1));
        ledger.accept("B", 1);
        assert_eq!(ledger.len(), 2);

        let entries = ledger.entries();
        assert_eq!(entries.get("A"), Some(&4));
        assert_eq!(entries.get("B"), Some(&1));
    }

    #[test]
    fn test_is_new_does_not_record() {
        let ledger = SequenceLedger::new();
        assert!(ledger.is_new("A", 1));
        assert!(ledger.is_new("A", 1));
        assert!(ledger.is_empty());
    }
}
