// Bounded FIFO buffer of samples backing a sensor chart
use super::sample::Sample;
use super::telemetry::TimeSeriesPoint;
use std::collections::VecDeque;

pub const DEFAULT_CAPACITY: usize = 100;

/// Samples in arrival order, never more than `capacity` of them.
///
/// Arrival order is not re-sorted by timestamp: a late response for an older
/// reading lands at the tail like any other.
#[derive(Debug, Clone)]
pub struct SampleBuffer {
    samples: VecDeque<Sample>,
    capacity: usize,
}

impl SampleBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append at the tail, evicting the head first when full.
    pub fn append(&mut self, sample: Sample) {
        if self.samples.len() >= self.capacity {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    /// Replace the contents wholesale, keeping the most recent `capacity` entries.
    pub fn replace<I>(&mut self, samples: I)
    where
        I: IntoIterator<Item = Sample>,
    {
        self.samples.clear();
        for sample in samples {
            self.append(sample);
        }
    }

    pub fn to_series(&self) -> Vec<TimeSeriesPoint> {
        self.samples
            .iter()
            .map(|s| TimeSeriesPoint::new(s.timestamp, s.value))
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Sample> {
        self.samples.iter()
    }

    pub fn values(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|s| s.value)
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

impl Default for SampleBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
