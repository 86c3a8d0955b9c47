//! Bounded, append-from-the-tail sample history.

use std::collections::VecDeque;
use std::sync::Arc;

use phasescope_io::Sample;

#[derive(Debug, Clone)]
pub struct SlidingWindow {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl SlidingWindow {
    /// A zero capacity is raised to one so the latest sample is always kept.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append, evicting from the head so the length never exceeds capacity.
    pub fn push(&mut self, sample: Sample) {
        while self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Like [`push`](Self::push), but a sample identical to the tail is
    /// ignored. Returns whether the window changed.
    pub fn push_distinct(&mut self, sample: Sample) -> bool {
        if self.last().is_some_and(|last| sample.is_repeat_of(last)) {
            return false;
        }
        self.push(sample);
        true
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last(&self) -> Option<&Sample> {
        self.samples.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> + '_ {
        self.samples.iter()
    }

    /// An immutable copy for recompute tasks.
    pub fn snapshot(&self) -> Arc<[Sample]> {
        self.samples.iter().copied().collect()
    }

    pub fn clear(&mut self) {
        self.samples.clear();
    }
}
