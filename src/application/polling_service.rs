// Polling adapter - Periodic REST acquisition into the telemetry store
use crate::application::errors::{AuthExpired, FetchError};
use crate::application::store_handle::StoreHandle;
use crate::application::telemetry_api::{
    DeviceRecord, TelemetryApi, TimeRange, TimeSeriesWindow, WindowStats,
};
use crate::domain::dashboard::DashboardPhase;
use crate::domain::sample::{DeviceId, Sample, SensorType};
use crate::domain::store::StatsOverride;
use futures::future::join_all;
use futures::stream::{FuturesUnordered, StreamExt};
use serde::Deserialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// How much each tick fetches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FetchStrategy {
    /// Latest + stats + series for every pair, every tick.
    Full,
    /// Latest point only; extrema recomputed from the local buffer.
    #[default]
    Optimized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickKind {
    Full,
    Incremental,
}

/// Summary of one acquisition cycle.
#[derive(Debug, Clone, PartialEq)]
pub struct TickReport {
    pub kind: TickKind,
    pub updated: usize,
    pub failed: usize,
    pub phase: DashboardPhase,
}

struct PairWindow {
    latest: Sample,
    stats: WindowStats,
    series: TimeSeriesWindow,
}

type PairResult<T> = (DeviceId, SensorType, Result<T, FetchError>);

pub struct PollingAdapter {
    api: Arc<dyn TelemetryApi>,
    store: StoreHandle,
    sensor_types: Vec<SensorType>,
    strategy: FetchStrategy,
    range: RwLock<TimeRange>,
    needs_full_load: AtomicBool,
    halted: AtomicBool,
}

impl PollingAdapter {
    pub fn new(
        api: Arc<dyn TelemetryApi>,
        store: StoreHandle,
        sensor_types: Vec<SensorType>,
        strategy: FetchStrategy,
        range: TimeRange,
    ) -> Self {
        Self {
            api,
            store,
            sensor_types,
            strategy,
            range: RwLock::new(range),
            needs_full_load: AtomicBool::new(true),
            halted: AtomicBool::new(false),
        }
    }

    pub fn range(&self) -> TimeRange {
        self.range
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Change the server window; the next tick reloads everything.
    pub fn set_range(&self, range: TimeRange) {
        tracing::info!("Time range changed to {:?}", range);
        *self.range.write().unwrap_or_else(PoisonError::into_inner) = range;
        self.needs_full_load.store(true, Ordering::SeqCst);
    }

    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::SeqCst)
    }

    /// Resume after re-authentication.
    pub fn restart(&self) {
        self.halted.store(false, Ordering::SeqCst);
        self.needs_full_load.store(true, Ordering::SeqCst);
        self.store.write(|s| s.set_phase(DashboardPhase::Loading));
    }

    /// Run one acquisition cycle.
    ///
    /// Per-pair failures are logged and leave that pair's state untouched.
    /// A 401 from any request halts the adapter: this and every later tick
    /// return [`AuthExpired`] without touching the network until
    /// [`PollingAdapter::restart`].
    pub async fn tick(&self) -> Result<TickReport, AuthExpired> {
        if self.is_halted() {
            return Err(AuthExpired);
        }

        let full = self.strategy == FetchStrategy::Full
            || self.needs_full_load.swap(false, Ordering::SeqCst);

        let result = if full {
            self.full_refresh().await
        } else {
            self.incremental_update().await
        };

        match result {
            Ok(report) => {
                if full && report.updated == 0 && report.failed > 0 {
                    // Bootstrap never landed; try again next tick.
                    self.needs_full_load.store(true, Ordering::SeqCst);
                }
                Ok(report)
            }
            Err(AuthExpired) => {
                tracing::error!("Backend rejected credentials; halting polling until restart");
                let halted = &self.halted;
                self.store.write(|s| {
                    halted.store(true, Ordering::SeqCst);
                    s.set_phase(DashboardPhase::AuthExpired);
                });
                Err(AuthExpired)
            }
        }
    }

    async fn fetch_devices(&self, kind: TickKind) -> Result<Result<Vec<DeviceRecord>, TickReport>, AuthExpired> {
        match self.api.list_devices().await {
            Ok(devices) if devices.is_empty() => {
                tracing::info!("No devices found");
                Ok(Err(self.finish(kind, 0, 0, DashboardPhase::Empty)))
            }
            Ok(devices) => Ok(Ok(devices)),
            Err(FetchError::AuthExpired) => Err(AuthExpired),
            Err(e) if kind == TickKind::Incremental && self.store.read(|s| s.has_data()) => {
                // Loaded data stays on screen; the next tick retries.
                tracing::warn!("Error refreshing devices: {}", e);
                Ok(Err(self.report(kind, 0, 1)))
            }
            Err(e) => {
                tracing::error!("Error loading devices: {}", e);
                let phase = DashboardPhase::Unavailable {
                    reason: e.to_string(),
                };
                Ok(Err(self.finish(kind, 0, 1, phase)))
            }
        }
    }

    /// Publish `phase` unless the session has expired meanwhile. A tick that
    /// was in flight when another one hit a 401 must not hide `AuthExpired`.
    fn finish(&self, kind: TickKind, updated: usize, failed: usize, phase: DashboardPhase) -> TickReport {
        let halted = &self.halted;
        let phase = self.store.write(|s| {
            if !halted.load(Ordering::SeqCst) {
                s.set_phase(phase);
            }
            s.phase().clone()
        });
        TickReport {
            kind,
            updated,
            failed,
            phase,
        }
    }

    fn report(&self, kind: TickKind, updated: usize, failed: usize) -> TickReport {
        TickReport {
            kind,
            updated,
            failed,
            phase: self.store.read(|s| s.phase().clone()),
        }
    }

    async fn full_refresh(&self) -> Result<TickReport, AuthExpired> {
        tracing::debug!("Full refresh");
        let devices = match self.fetch_devices(TickKind::Full).await? {
            Ok(devices) => devices,
            Err(report) => return Ok(report),
        };

        self.store.write(|s| {
            for device in &devices {
                s.set_status(&device.device_id, device.status);
            }
        });

        let range = self.range();
        let range = &range;
        let mut pending: FuturesUnordered<_> = devices
            .iter()
            .flat_map(|d| {
                self.sensor_types
                    .iter()
                    .map(move |t| self.fetch_window(d.device_id.clone(), t.clone(), range))
            })
            .collect();

        let (mut updated, mut failed) = (0, 0);
        while let Some((device_id, sensor_type, result)) = pending.next().await {
            match result {
                Ok(window) => {
                    self.apply_window(&device_id, &sensor_type, window);
                    updated += 1;
                }
                Err(FetchError::AuthExpired) => return Err(AuthExpired),
                Err(e) => {
                    tracing::warn!("No data for {}/{}: {}", device_id, sensor_type, e);
                    failed += 1;
                }
            }
        }

        // Pairs that failed keep their earlier data, which is still shown.
        let phase = if updated > 0 || self.store.read(|s| s.has_data()) {
            DashboardPhase::Ready
        } else {
            tracing::info!("No sensor data in the selected range");
            DashboardPhase::Empty
        };
        tracing::info!("Full refresh done: {} pairs loaded, {} failed", updated, failed);
        Ok(self.finish(TickKind::Full, updated, failed, phase))
    }

    async fn fetch_window(
        &self,
        device_id: DeviceId,
        sensor_type: SensorType,
        range: &TimeRange,
    ) -> PairResult<PairWindow> {
        let result = futures::try_join!(
            self.api.latest_reading(&device_id, &sensor_type),
            self.api.window_stats(&device_id, &sensor_type, range),
            self.api.time_series(&device_id, &sensor_type, range),
        )
        .map(|(latest, stats, series)| PairWindow {
            latest,
            stats,
            series,
        });
        (device_id, sensor_type, result)
    }

    fn apply_window(&self, device_id: &str, sensor_type: &str, window: PairWindow) {
        let PairWindow {
            latest,
            stats,
            series,
        } = window;
        let samples = series.into_samples(&latest.unit);
        let stats_override = StatsOverride {
            min: stats.min_value,
            max: stats.max_value,
        };

        self.store.write(|s| {
            s.ingest_window(device_id, sensor_type, samples, Some(stats_override));
            s.record_latest(device_id, sensor_type, latest);
        });
    }

    async fn incremental_update(&self) -> Result<TickReport, AuthExpired> {
        tracing::debug!("Updating values");
        let devices = match self.fetch_devices(TickKind::Incremental).await? {
            Ok(devices) => devices,
            Err(report) => return Ok(report),
        };

        let statuses = join_all(devices.iter().map(|d| self.api.get_device(&d.device_id))).await;
        let mut failed = 0;
        for (device, status) in devices.iter().zip(statuses) {
            match status {
                Ok(record) => self.store.write(|s| s.set_status(&device.device_id, record.status)),
                Err(FetchError::AuthExpired) => return Err(AuthExpired),
                Err(e) => {
                    tracing::warn!("Error updating device status for {}: {}", device.device_id, e);
                    failed += 1;
                }
            }
        }

        let mut pending: FuturesUnordered<_> = devices
            .iter()
            .flat_map(|d| {
                self.sensor_types
                    .iter()
                    .map(move |t| self.fetch_latest(d.device_id.clone(), t.clone()))
            })
            .collect();

        let mut updated = 0;
        while let Some((device_id, sensor_type, result)) = pending.next().await {
            match result {
                Ok(sample) => {
                    self.store.write(|s| {
                        s.ingest_sample(&device_id, &sensor_type, sample);
                        s.recompute_from_buffer(&device_id, &sensor_type);
                    });
                    updated += 1;
                }
                Err(FetchError::AuthExpired) => return Err(AuthExpired),
                Err(e) => {
                    tracing::warn!("Error updating {}/{}: {}", device_id, sensor_type, e);
                    failed += 1;
                }
            }
        }

        let phase = if self.store.read(|s| s.has_data()) {
            DashboardPhase::Ready
        } else {
            DashboardPhase::Empty
        };
        Ok(self.finish(TickKind::Incremental, updated, failed, phase))
    }

    async fn fetch_latest(&self, device_id: DeviceId, sensor_type: SensorType) -> PairResult<Sample> {
        let result = self.api.latest_reading(&device_id, &sensor_type).await;
        (device_id, sensor_type, result)
    }
}
