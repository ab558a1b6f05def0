use crate::model::Snapshot;
use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Samples kept for the power trend chart
pub const DEFAULT_CAPACITY: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSample {
    /// Arrival time formatted for display (HH:MM:SS)
    pub timestamp: String,
    pub pole_watts: f64,
    pub house_watts: f64,
}

impl TrendSample {
    /// Derive a sample from the merged view at the moment a snapshot was accepted
    pub fn from_view<Tz>(view: &Snapshot, at: &DateTime<Tz>) -> Self
    where
        Tz: TimeZone,
        Tz::Offset: std::fmt::Display,
    {
        Self {
            timestamp: at.format("%H:%M:%S").to_string(),
            pole_watts: view.pole.power,
            house_watts: view.house.power,
        }
    }
}

/// Sliding window of the most recent power samples, oldest first
#[derive(Debug, Clone)]
pub struct TrendBuffer {
    samples: VecDeque<TrendSample>,
    capacity: usize,
}

impl TrendBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    pub fn append(&mut self, sample: TrendSample) {
        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
    }

    /// Ordered copy of the window for charting
    pub fn snapshot(&self) -> Vec<TrendSample> {
        self.samples.iter().cloned().collect()
    }

    pub fn latest(&self) -> Option<&TrendSample> {
        self.samples.back()
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

impl Default for TrendBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
