// Incremental min/max/count/sum accumulator
use serde::Serialize;

/// Where the displayed extrema came from.
///
/// `Server` means the last full refresh applied the backend's window-wide
/// min/max, which may include samples long evicted from the local buffer.
/// `Local` means the values were folded from what the buffer holds (or
/// observed one by one from the live feed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StatsSource {
    #[default]
    Local,
    Server,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunningStats {
    min: f64,
    max: f64,
    count: u64,
    sum: f64,
}

impl RunningStats {
    pub fn new() -> Self {
        Self {
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            count: 0,
            sum: 0.0,
        }
    }

    pub fn observe(&mut self, value: f64) {
        self.min = self.min.min(value);
        self.max = self.max.max(value);
        self.count += 1;
        self.sum += value;
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Reset, then observe every value in order.
    pub fn refold<I>(&mut self, values: I)
    where
        I: IntoIterator<Item = f64>,
    {
        self.reset();
        for value in values {
            self.observe(value);
        }
    }

    /// Overwrite the extrema with authoritative values; count and sum stay local.
    pub fn override_extrema(&mut self, min: f64, max: f64) {
        self.min = min;
        self.max = max;
    }

    pub fn min(&self) -> Option<f64> {
        self.has_extrema().then_some(self.min)
    }

    pub fn max(&self) -> Option<f64> {
        self.has_extrema().then_some(self.max)
    }

    // Sentinels (+inf, -inf) stay crossed until a value or override lands.
    fn has_extrema(&self) -> bool {
        self.min <= self.max
    }

    pub fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }
}

impl Default for RunningStats {
    fn default() -> Self {
        Self::new()
    }
}

impl FromIterator<f64> for RunningStats {
    fn from_iter<I: IntoIterator<Item = f64>>(iter: I) -> Self {
        let mut stats = Self::new();
        stats.refold(iter);
        stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_stats_have_no_extrema() {
        let stats = RunningStats::new();
        assert!(stats.is_empty());
        assert_eq!(stats.min(), None);
        assert_eq!(stats.max(), None);
        assert_eq!(stats.mean(), None);
    }

    #[test]
    fn test_observe_bounds_every_value() {
        let values = [3.5, -2.0, 17.25, 0.0, 9.0, -2.5];
        let mut stats = RunningStats::new();
        for v in values {
            stats.observe(v);
        }

        assert_eq!(stats.count(), values.len() as u64);
        let (min, max) = (stats.min().unwrap(), stats.max().unwrap());
        for v in values {
            assert!(min <= v && v <= max);
        }
        assert_eq!(min, -2.5);
        assert_eq!(max, 17.25);
        assert!((stats.sum() - 25.25).abs() < 1e-9);
    }

    #[test]
    fn test_refold_replaces_previous_state() {
        let mut stats = RunningStats::new();
        stats.observe(1000.0);
        stats.refold([4.0, 8.0, 6.0]);

        assert_eq!(stats.count(), 3);
        assert_eq!(stats.min(), Some(4.0));
        assert_eq!(stats.max(), Some(8.0));
        assert_eq!(stats.mean(), Some(6.0));
    }

    #[test]
    fn test_override_keeps_count() {
        let mut stats: RunningStats = [40.0, 42.0].into_iter().collect();
        stats.override_extrema(10.0, 50.0);

        assert_eq!(stats.min(), Some(10.0));
        assert_eq!(stats.max(), Some(50.0));
        assert_eq!(stats.count(), 2);
    }

    #[test]
    fn test_override_on_empty_window() {
        let mut stats = RunningStats::new();
        stats.override_extrema(1.0, 2.0);
        assert_eq!(stats.min(), Some(1.0));
        assert_eq!(stats.count(), 0);
        assert_eq!(stats.mean(), None);
    }
}
