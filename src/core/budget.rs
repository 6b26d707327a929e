//! Concurrency budget for in-flight loads.
//!
//! Lives inside the cache state mutex, so plain integers are enough:
//! every acquire/release happens in the same critical section as the
//! entry-map update it belongs to.

use log::warn;

#[derive(Debug, Clone)]
pub struct LoadBudget {
    in_flight: usize,
    max: usize,
    /// Highest `in_flight` ever observed
    peak: usize,
}

impl LoadBudget {
    /// `max` is clamped to at least one slot.
    pub fn new(max: usize) -> Self {
        Self {
            in_flight: 0,
            max: max.max(1),
            peak: 0,
        }
    }

    pub fn has_capacity(&self) -> bool {
        self.in_flight < self.max
    }

    /// Take a slot if one is free.
    pub fn try_acquire(&mut self) -> bool {
        if !self.has_capacity() {
            return false;
        }
        self.in_flight += 1;
        self.peak = self.peak.max(self.in_flight);
        true
    }

    /// Return a slot (saturating, an unmatched release is logged and ignored).
    pub fn release(&mut self) {
        if self.in_flight == 0 {
            warn!("LoadBudget: release without matching acquire");
            return;
        }
        self.in_flight -= 1;
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn peak(&self) -> usize {
        self.peak
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_acquire_until_full() {
        let mut budget = LoadBudget::new(2);
        assert!(budget.try_acquire());
        assert!(budget.try_acquire());
        assert!(!budget.try_acquire());
        assert_eq!(budget.in_flight(), 2);

        budget.release();
        assert!(budget.has_capacity());
        assert!(budget.try_acquire());
        assert_eq!(budget.peak(), 2);
    }

    #[test]
    fn test_release_saturates() {
        let mut budget = LoadBudget::new(1);
        budget.release();
        assert_eq!(budget.in_flight(), 0);
    }

    #[test]
    fn test_zero_max_clamped() {
        let mut budget = LoadBudget::new(0);
        assert!(budget.try_acquire());
        assert!(!budget.try_acquire());
    }
}
