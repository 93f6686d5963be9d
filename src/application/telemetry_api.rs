// Backend API trait for telemetry acquisition
use crate::application::errors::FetchError;
use crate::domain::sample::{DeviceId, DeviceStatus, Sample};
use crate::domain::telemetry::TimeSeriesPoint;
use async_trait::async_trait;

/// Device entry as listed by the backend
#[derive(Debug, Clone, PartialEq)]
pub struct DeviceRecord {
    pub device_id: DeviceId,
    pub status: DeviceStatus,
}

/// Window aggregate computed by the backend over the requested range
#[derive(Debug, Clone, PartialEq)]
pub struct WindowStats {
    pub min_value: f64,
    pub max_value: f64,
    pub avg_value: Option<f64>,
    pub count: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct TimeSeriesWindow {
    pub unit: Option<String>,
    pub points: Vec<TimeSeriesPoint>,
}

impl TimeSeriesWindow {
    /// Turn the window into samples, borrowing a unit when the response has none.
    pub fn into_samples(self, fallback_unit: &str) -> Vec<Sample> {
        let unit = self.unit.unwrap_or_else(|| fallback_unit.to_string());
        self.points
            .into_iter()
            .map(|p| Sample::new(p.value, unit.clone(), p.timestamp))
            .collect()
    }
}

/// Server-side window selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TimeRange {
    LastHours(u32),
    /// Dates are passed through verbatim; `quota_limit` caps returned points.
    Between {
        start_date: String,
        end_date: String,
        quota_limit: Option<u32>,
    },
}

impl Default for TimeRange {
    fn default() -> Self {
        TimeRange::LastHours(24)
    }
}

#[async_trait]
pub trait TelemetryApi: Send + Sync {
    /// List all devices with their current status
    async fn list_devices(&self) -> Result<Vec<DeviceRecord>, FetchError>;

    /// Get a single device
    async fn get_device(&self, device_id: &str) -> Result<DeviceRecord, FetchError>;

    /// Latest reading for a (device, sensor) pair
    async fn latest_reading(&self, device_id: &str, sensor_type: &str) -> Result<Sample, FetchError>;

    /// Min/max/avg over the range
    async fn window_stats(
        &self,
        device_id: &str,
        sensor_type: &str,
        range: &TimeRange,
    ) -> Result<WindowStats, FetchError>;

    /// Ordered points over the range, for charting
    async fn time_series(
        &self,
        device_id: &str,
        sensor_type: &str,
        range: &TimeRange,
    ) -> Result<TimeSeriesWindow, FetchError>;
}
