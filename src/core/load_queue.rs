//! Two-tier pending-load queue.
//!
//! Invariant: every `High` key dequeues before any `Normal` key, and keys
//! leave each tier in the order they entered it (FIFO within a tier).
//! The queue itself does not dedup; `ResourceCache` never pushes a key
//! that is already queued or in flight.

use std::collections::VecDeque;

use crate::entities::{Priority, ResourceKey};

#[derive(Debug, Default)]
pub struct LoadQueue {
    high: VecDeque<ResourceKey>,
    normal: VecDeque<ResourceKey>,
}

impl LoadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, key: ResourceKey, priority: Priority) {
        match priority {
            Priority::High => self.high.push_back(key),
            Priority::Normal => self.normal.push_back(key),
        }
    }

    /// Next key to start: front of `High`, else front of `Normal`.
    pub fn pop(&mut self) -> Option<(ResourceKey, Priority)> {
        if let Some(key) = self.high.pop_front() {
            return Some((key, Priority::High));
        }
        self.normal.pop_front().map(|key| (key, Priority::Normal))
    }

    pub fn contains(&self, key: &ResourceKey) -> bool {
        self.high.contains(key) || self.normal.contains(key)
    }

    pub fn len(&self) -> usize {
        self.high.len() + self.normal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.high.is_empty() && self.normal.is_empty()
    }

    /// Empty both tiers, returning the keys in dequeue order.
    pub fn drain(&mut self) -> Vec<ResourceKey> {
        self.high.drain(..).chain(self.normal.drain(..)).collect()
    }
}
