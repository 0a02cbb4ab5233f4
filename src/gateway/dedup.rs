//! Bounded ledger of recently processed inbound message ids.
//!
//! The webhook is at-least-once; the same event can be redelivered. Ids are
//! kept in a set for lookup plus a queue for arrival order. Once the set grows
//! past the high-water mark, the oldest ids are evicted until it is back at the
//! low-water mark. An evicted id can be processed again if redelivered.

use std::collections::{HashSet, VecDeque};

/// Eviction starts when the ledger holds more ids than this.
pub const DEFAULT_HIGH_WATER: usize = 5000;
/// Eviction stops once the ledger is back down to this many ids.
pub const DEFAULT_LOW_WATER: usize = 4000;

pub struct DedupLedger {
    seen: HashSet<String>,
    order: VecDeque<String>,
    high_water: usize,
    low_water: usize,
}

impl Default for DedupLedger {
    fn default() -> Self {
        Self::new(DEFAULT_HIGH_WATER, DEFAULT_LOW_WATER)
    }
}

impl DedupLedger {
    pub fn new(high_water: usize, low_water: usize) -> Self {
        let low_water = low_water.min(high_water);
        Self {
            seen: HashSet::with_capacity(high_water + 1),
            order: VecDeque::with_capacity(high_water + 1),
            high_water,
            low_water,
        }
    }

    /// Record `id`. Returns `false` if it was already present.
    pub fn insert(&mut self, id: &str) -> bool {
        if self.seen.contains(id) {
            return false;
        }
        self.seen.insert(id.to_string());
        self.order.push_back(id.to_string());

        if self.seen.len() > self.high_water {
            while self.seen.len() > self.low_water {
                match self.order.pop_front() {
                    Some(oldest) => {
                        self.seen.remove(&oldest);
                    }
                    None => break,
                }
            }
        }
        true
    }

    #[cfg(test)]
    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_insert_is_duplicate() {
        let mut ledger = DedupLedger::default();
        assert!(ledger.insert("wamid.A"));
        assert!(!ledger.insert("wamid.A"));
        assert!(ledger.insert("wamid.B"));
        assert_eq!(ledger.len(), 2);
    }

    #[test]
    fn test_eviction_is_fifo_down_to_low_water() {
        let mut ledger = DedupLedger::new(5, 3);
        for i in 0..5 {
            assert!(ledger.insert(&format!("m{i}")));
        }
        assert_eq!(ledger.len(), 5);

        // Sixth id crosses the high-water mark: m0, m1, m2 go.
        assert!(ledger.insert("m5"));
        assert_eq!(ledger.len(), 3);
        for gone in ["m0", "m1", "m2"] {
            assert!(!ledger.contains(gone), "{gone} should be evicted");
        }
        for kept in ["m3", "m4", "m5"] {
            assert!(ledger.contains(kept), "{kept} should be kept");
        }

        // An evicted id is accepted again.
        assert!(ledger.insert("m0"));
    }

    #[test]
    fn test_stays_bounded_under_load() {
        let mut ledger = DedupLedger::new(100, 80);
        for i in 0..10_000 {
            ledger.insert(&i.to_string());
            assert!(ledger.len() <= 100);
        }
        assert!(ledger.contains("9999"));
        assert!(!ledger.contains("0"));
    }

    #[test]
    fn test_low_water_clamped_to_high_water() {
        let mut ledger = DedupLedger::new(2, 10);
        ledger.insert("a");
        ledger.insert("b");
        ledger.insert("c");
        assert_eq!(ledger.len(), 2);
        assert!(!ledger.contains("a"));
    }
}
