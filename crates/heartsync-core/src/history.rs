//! Bounded FIFO of received heartbeat samples.
//!
//! Feeds the chart (`series`) and the heart effect toggle (`above_threshold`).

use std::collections::VecDeque;

use serde::Serialize;
use tracing::trace;

use crate::{HeartSyncError, HeartbeatSample, SyncConfig};

pub const DEFAULT_CAPACITY: usize = 20;
pub const DEFAULT_THRESHOLD: f64 = 0.5;
/// Largest accepted history length.
pub const MAX_CAPACITY: usize = 10_000;

/// Result of a single [`SyncHistory::push`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SyncSnapshot {
    /// Full buffer, oldest first.
    pub series: Vec<f64>,
    /// `true` when the pushed sample is strictly above the threshold.
    pub above_threshold: bool,
}

#[derive(Debug, Clone)]
pub struct SyncHistory {
    samples: VecDeque<HeartbeatSample>,
    capacity: usize,
    threshold: f64,
}

impl Default for SyncHistory {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY, DEFAULT_THRESHOLD)
    }
}

impl SyncHistory {
    /// Capacity is clamped to `1..=MAX_CAPACITY`.
    pub fn new(capacity: usize, threshold: f64) -> Self {
        let capacity = capacity.clamp(1, MAX_CAPACITY);
        Self {
            samples: VecDeque::with_capacity(capacity.min(DEFAULT_CAPACITY) + 1),
            capacity,
            threshold,
        }
    }

    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.history_len, config.threshold)
    }

    /// Appends `value` (clamped to [0, 1]), evicting the oldest samples past
    /// capacity. NaN is rejected and leaves the buffer untouched.
    pub fn push(&mut self, value: f64) -> Result<SyncSnapshot, HeartSyncError> {
        let sample = HeartbeatSample::new(value)?;
        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            if let Some(evicted) = self.samples.pop_front() {
                trace!("SyncHistory evicted {:.3}", evicted.value());
            }
        }

        Ok(SyncSnapshot {
            series: self.series(),
            above_threshold: sample.value() > self.threshold,
        })
    }

    pub fn series(&self) -> Vec<f64> {
        self.samples.iter().map(HeartbeatSample::value).collect()
    }

    pub fn latest(&self) -> Option<f64> {
        self.samples.back().map(HeartbeatSample::value)
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
}
