// Session-scoped telemetry store: single source of truth for rendering
use super::dashboard::{DashboardPhase, DashboardView, LinkState};
use super::relative_time::relative_time;
use super::running_stats::{RunningStats, StatsSource};
use super::sample::{DeviceId, DeviceStatus, Sample, SensorType};
use super::sample_buffer::SampleBuffer;
use super::telemetry::{DeviceSnapshot, SensorSnapshot};
use chrono::{DateTime, Utc};

/// Server-side window aggregate applied on top of locally folded stats.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsOverride {
    pub min: f64,
    pub max: f64,
}

#[derive(Debug, Clone)]
struct SensorEntry {
    sensor_type: SensorType,
    latest: Option<Sample>,
    stats: RunningStats,
    stats_source: StatsSource,
    buffer: SampleBuffer,
    age_label: Option<String>,
}

impl SensorEntry {
    fn new(sensor_type: SensorType, capacity: usize) -> Self {
        Self {
            sensor_type,
            latest: None,
            stats: RunningStats::new(),
            stats_source: StatsSource::Local,
            buffer: SampleBuffer::new(capacity),
            age_label: None,
        }
    }

    fn has_data(&self) -> bool {
        self.latest.is_some() || !self.buffer.is_empty()
    }

    fn snapshot(&self, device_id: &str) -> SensorSnapshot {
        SensorSnapshot {
            device_id: device_id.to_string(),
            sensor_type: self.sensor_type.clone(),
            latest_value: self.latest.as_ref().map(|s| s.value),
            unit: self.latest.as_ref().map(|s| s.unit.clone()),
            latest_timestamp: self.latest.as_ref().map(|s| s.timestamp),
            last_update_label: self.age_label.clone(),
            min: self.stats.min(),
            max: self.stats.max(),
            mean: self.stats.mean(),
            count: self.stats.count(),
            stats_source: self.stats_source,
            series_points: self.buffer.to_series(),
        }
    }
}

#[derive(Debug, Clone)]
struct DeviceEntry {
    device_id: DeviceId,
    status: DeviceStatus,
    // Deployments carry a handful of sensors per device; kept in first-seen order.
    sensors: Vec<SensorEntry>,
}

impl DeviceEntry {
    fn sensor(&self, sensor_type: &str) -> Option<&SensorEntry> {
        self.sensors.iter().find(|s| s.sensor_type == sensor_type)
    }

    fn snapshot(&self) -> DeviceSnapshot {
        DeviceSnapshot {
            device_id: self.device_id.clone(),
            status: self.status,
            sensors: self.sensors.iter().map(|s| s.snapshot(&self.device_id)).collect(),
        }
    }
}

/// Per-device status plus per-sensor latest sample, stats and chart buffer.
///
/// Entries are created lazily on first access and live for the session.
/// Every mutation runs to completion; callers hand out [`SensorSnapshot`]
/// copies, never references into the store.
///
/// Stats precedence: [`TelemetryStore::ingest_window`] with an override
/// reports the server's extrema (`StatsSource::Server`), while
/// [`TelemetryStore::recompute_from_buffer`] reports what the bounded buffer
/// holds (`StatsSource::Local`). The two can disagree once old extrema have
/// been evicted locally.
#[derive(Debug, Clone)]
pub struct TelemetryStore {
    capacity: usize,
    devices: Vec<DeviceEntry>,
    phase: DashboardPhase,
    link: Option<LinkState>,
}

impl TelemetryStore {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            devices: Vec::new(),
            phase: DashboardPhase::Loading,
            link: None,
        }
    }

    fn device_mut(&mut self, device_id: &str) -> &mut DeviceEntry {
        let idx = match self.devices.iter().position(|d| d.device_id == device_id) {
            Some(idx) => idx,
            None => {
                self.devices.push(DeviceEntry {
                    device_id: device_id.to_string(),
                    status: DeviceStatus::default(),
                    sensors: Vec::new(),
                });
                self.devices.len() - 1
            }
        };
        &mut self.devices[idx]
    }

    fn device(&self, device_id: &str) -> Option<&DeviceEntry> {
        self.devices.iter().find(|d| d.device_id == device_id)
    }

    fn entry_mut(&mut self, device_id: &str, sensor_type: &str) -> &mut SensorEntry {
        let capacity = self.capacity;
        let device = self.device_mut(device_id);
        let idx = match device.sensors.iter().position(|s| s.sensor_type == sensor_type) {
            Some(idx) => idx,
            None => {
                device
                    .sensors
                    .push(SensorEntry::new(sensor_type.to_string(), capacity));
                device.sensors.len() - 1
            }
        };
        &mut device.sensors[idx]
    }

    /// Create default-initialised structures for the pair if missing.
    pub fn ensure_entry(&mut self, device_id: &str, sensor_type: &str) {
        self.entry_mut(device_id, sensor_type);
    }

    /// Incremental path: latest, buffer and stats all advance by one sample.
    pub fn ingest_sample(&mut self, device_id: &str, sensor_type: &str, sample: Sample) {
        let entry = self.entry_mut(device_id, sensor_type);
        entry.stats.observe(sample.value);
        entry.buffer.append(sample.clone());
        entry.latest = Some(sample);
    }

    /// Full-refresh path: replace the buffer with `samples` (newest `capacity`
    /// kept), refold stats over what was retained, then apply the server's
    /// extrema if given. The buffer itself is never touched by the override.
    pub fn ingest_window(
        &mut self,
        device_id: &str,
        sensor_type: &str,
        samples: Vec<Sample>,
        stats_override: Option<StatsOverride>,
    ) {
        let entry = self.entry_mut(device_id, sensor_type);
        entry.buffer.replace(samples);
        entry.stats.refold(entry.buffer.values());
        entry.stats_source = StatsSource::Local;

        if let Some(o) = stats_override {
            entry.stats.override_extrema(o.min, o.max);
            entry.stats_source = StatsSource::Server;
        }
    }

    /// Set the latest reading without touching the buffer or stats.
    pub fn record_latest(&mut self, device_id: &str, sensor_type: &str, sample: Sample) {
        self.entry_mut(device_id, sensor_type).latest = Some(sample);
    }

    /// Rebuild stats from the samples currently in the buffer.
    pub fn recompute_from_buffer(&mut self, device_id: &str, sensor_type: &str) {
        let entry = self.entry_mut(device_id, sensor_type);
        entry.stats.refold(entry.buffer.values());
        entry.stats_source = StatsSource::Local;
    }

    /// Overwrite the device status. Any value may follow any value.
    pub fn set_status(&mut self, device_id: &str, status: DeviceStatus) {
        self.device_mut(device_id).status = status;
    }

    pub fn status(&self, device_id: &str) -> Option<DeviceStatus> {
        self.device(device_id).map(|d| d.status)
    }

    pub fn snapshot(&self, device_id: &str, sensor_type: &str) -> Option<SensorSnapshot> {
        self.device(device_id)?
            .sensor(sensor_type)
            .map(|s| s.snapshot(device_id))
    }

    pub fn device_snapshot(&self, device_id: &str) -> Option<DeviceSnapshot> {
        self.device(device_id).map(DeviceEntry::snapshot)
    }

    pub fn view(&self) -> DashboardView {
        DashboardView::new(
            self.phase.clone(),
            self.link,
            self.devices.iter().map(DeviceEntry::snapshot).collect(),
        )
    }

    pub fn device_ids(&self) -> Vec<DeviceId> {
        self.devices.iter().map(|d| d.device_id.clone()).collect()
    }

    /// True when at least one sensor holds a latest reading or chart samples.
    pub fn has_data(&self) -> bool {
        self.devices
            .iter()
            .flat_map(|d| d.sensors.iter())
            .any(SensorEntry::has_data)
    }

    pub fn set_phase(&mut self, phase: DashboardPhase) {
        self.phase = phase;
    }

    pub fn phase(&self) -> &DashboardPhase {
        &self.phase
    }

    pub fn set_link(&mut self, link: LinkState) {
        self.link = Some(link);
    }

    /// Recompute "last update" labels from stored timestamps. No I/O.
    pub fn refresh_age_labels(&mut self, now: DateTime<Utc>) {
        for sensor in self.devices.iter_mut().flat_map(|d| d.sensors.iter_mut()) {
            sensor.age_label = sensor
                .latest
                .as_ref()
                .map(|s| relative_time(s.timestamp, now));
        }
    }
}

impl Default for TelemetryStore {
    fn default() -> Self {
        Self::new(super::sample_buffer::DEFAULT_CAPACITY)
    }
}
