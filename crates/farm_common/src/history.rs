//! Fixed-capacity sample history backing the charts.

use crate::sample::{SampleField, SensorSample};
use std::collections::VecDeque;

/// Default number of samples kept (two minutes at the default cadence)
pub const DEFAULT_HISTORY_CAPACITY: usize = 60;

/// FIFO ring of samples; the oldest entry is evicted to admit a new one.
#[derive(Debug, Clone)]
pub struct BoundedHistory {
    samples: VecDeque<SensorSample>,
    capacity: usize,
}

impl BoundedHistory {
    /// Create an empty history. A zero capacity is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn append(&mut self, sample: SensorSample) {
        if self.samples.len() == self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
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

    /// Most recent sample
    pub fn latest(&self) -> Option<&SensorSample> {
        self.samples.back()
    }

    /// Samples in arrival order
    pub fn iter(&self) -> impl Iterator<Item = &SensorSample> + Clone + '_ {
        self.samples.iter()
    }

    /// Values of one field across all held samples, oldest first.
    ///
    /// The iterator is lazy and can be cloned to restart it.
    pub fn series(&self, field: SampleField) -> impl Iterator<Item = f64> + Clone + '_ {
        self.samples.iter().map(move |s| s.get(field))
    }

    /// Owned copy for event payloads
    pub fn snapshot(&self) -> Vec<SensorSample> {
        self.samples.iter().copied().collect()
    }
}

impl Default for BoundedHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
