// Telemetry read models handed to renderers
use super::running_stats::StatsSource;
use super::sample::{DeviceId, DeviceStatus, SensorType};
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSeriesPoint {
    pub timestamp: DateTime<Utc>,
    pub value: f64,
}

impl TimeSeriesPoint {
    pub fn new(timestamp: DateTime<Utc>, value: f64) -> Self {
        Self { timestamp, value }
    }
}

/// Immutable copy of one sensor's state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SensorSnapshot {
    pub device_id: DeviceId,
    pub sensor_type: SensorType,
    pub latest_value: Option<f64>,
    pub unit: Option<String>,
    /// Raw timestamp of the latest sample; input for relative-time labels.
    pub latest_timestamp: Option<DateTime<Utc>>,
    pub last_update_label: Option<String>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub mean: Option<f64>,
    pub count: u64,
    pub stats_source: StatsSource,
    pub series_points: Vec<TimeSeriesPoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeviceSnapshot {
    pub device_id: DeviceId,
    pub status: DeviceStatus,
    pub sensors: Vec<SensorSnapshot>,
}

impl DeviceSnapshot {
    pub fn sensor(&self, sensor_type: &str) -> Option<&SensorSnapshot> {
        self.sensors.iter().find(|s| s.sensor_type == sensor_type)
    }
}
