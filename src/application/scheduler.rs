// Periodic drivers - acquisition ticks and relative-time refresh
use crate::application::errors::AuthExpired;
use crate::application::polling_service::PollingAdapter;
use crate::application::store_handle::StoreHandle;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio::time::{Interval, MissedTickBehavior};

fn new_timer(period: Duration) -> Interval {
    let mut timer = tokio::time::interval(period.max(Duration::from_millis(1)));
    timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
    timer
}

/// Drive `adapter` every `period` until the backend rejects the session.
///
/// A new value on `period` drops the pending timer and starts a fresh one,
/// which fires immediately. Ticks already in flight keep running and still
/// write into the store.
pub async fn run_polling(adapter: Arc<PollingAdapter>, mut period: watch::Receiver<Duration>) -> AuthExpired {
    let mut current = *period.borrow_and_update();
    let mut timer = new_timer(current);
    let mut in_flight = JoinSet::new();
    let mut watching = true;

    tracing::info!("Auto-update started (every {:?})", current);
    loop {
        tokio::select! {
            _ = timer.tick() => {
                if adapter.is_halted() {
                    return AuthExpired;
                }
                let adapter = adapter.clone();
                in_flight.spawn(async move { adapter.tick().await });
            }
            Some(joined) = in_flight.join_next(), if !in_flight.is_empty() => {
                match joined {
                    Ok(Ok(report)) => tracing::debug!(
                        "Tick finished: {} updated, {} failed",
                        report.updated,
                        report.failed
                    ),
                    Ok(Err(AuthExpired)) => return AuthExpired,
                    Err(e) => tracing::error!("Acquisition tick panicked: {}", e),
                }
            }
            changed = period.changed(), if watching => {
                if changed.is_err() {
                    // Settings source went away; keep the current cadence.
                    watching = false;
                    continue;
                }
                current = *period.borrow_and_update();
                tracing::info!("Refresh interval changed to {:?}", current);
                timer = new_timer(current);
            }
        }
    }
}

/// Refresh "last update" labels from stored timestamps. Never fetches.
pub async fn run_clock(store: StoreHandle, period: Duration) {
    let mut timer = new_timer(period);
    loop {
        timer.tick().await;
        store.write(|s| s.refresh_age_labels(Utc::now()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::errors::FetchError;
    use crate::application::polling_service::FetchStrategy;
    use crate::application::telemetry_api::{
        DeviceRecord, TelemetryApi, TimeRange, TimeSeriesWindow, WindowStats,
    };
    use crate::domain::sample::Sample;
    use crate::domain::store::TelemetryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingApi {
        list_calls: AtomicUsize,
        unauthorized: AtomicBool,
    }

    #[async_trait]
    impl TelemetryApi for CountingApi {
        async fn list_devices(&self) -> Result<Vec<DeviceRecord>, FetchError> {
            self.list_calls.fetch_add(1, Ordering::SeqCst);
            if self.unauthorized.load(Ordering::SeqCst) {
                return Err(FetchError::AuthExpired);
            }
            Ok(Vec::new())
        }

        async fn get_device(&self, _: &str) -> Result<DeviceRecord, FetchError> {
            Err(FetchError::Transient("unused".into()))
        }

        async fn latest_reading(&self, _: &str, _: &str) -> Result<Sample, FetchError> {
            Err(FetchError::Transient("unused".into()))
        }

        async fn window_stats(&self, _: &str, _: &str, _: &TimeRange) -> Result<WindowStats, FetchError> {
            Err(FetchError::Transient("unused".into()))
        }

        async fn time_series(&self, _: &str, _: &str, _: &TimeRange) -> Result<TimeSeriesWindow, FetchError> {
            Err(FetchError::Transient("unused".into()))
        }
    }

    fn adapter(api: &Arc<CountingApi>) -> Arc<PollingAdapter> {
        Arc::new(PollingAdapter::new(
            api.clone(),
            StoreHandle::new(TelemetryStore::new(10)),
            vec!["CT1".into()],
            FetchStrategy::Full,
            TimeRange::LastHours(1),
        ))
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_change_replaces_timer() {
        let api = Arc::new(CountingApi::default());
        let (tx, rx) = watch::channel(Duration::from_secs(10));
        let driver = tokio::spawn(run_polling(adapter(&api), rx));

        // ticks at 0s, then restart at 3s fires at 3s, 13s, 23s
        tokio::time::sleep(Duration::from_secs(3)).await;
        tx.send(Duration::from_secs(10)).unwrap();
        tokio::time::sleep(Duration::from_millis(21_500)).await;

        assert_eq!(api.list_calls.load(Ordering::SeqCst), 4);
        driver.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_polling_stops_on_auth_expiry() {
        let api = Arc::new(CountingApi::default());
        api.unauthorized.store(true, Ordering::SeqCst);
        let (_tx, rx) = watch::channel(Duration::from_secs(5));

        let outcome = tokio::time::timeout(Duration::from_secs(60), run_polling(adapter(&api), rx)).await;
        assert_eq!(outcome, Ok(AuthExpired));
        assert_eq!(api.list_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_settings_keep_cadence() {
        let api = Arc::new(CountingApi::default());
        let (tx, rx) = watch::channel(Duration::from_secs(5));
        let driver = tokio::spawn(run_polling(adapter(&api), rx));
        drop(tx);

        tokio::time::sleep(Duration::from_millis(11_000)).await;
        assert_eq!(api.list_calls.load(Ordering::SeqCst), 3);
        driver.abort();
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_refreshes_labels() {
        let store = StoreHandle::new(TelemetryStore::new(10));
        store.write(|s| {
            s.ingest_sample("LR1", "CT1", Sample::new(1.0, "A", Utc::now() - chrono::Duration::hours(2)))
        });

        let clock = tokio::spawn(run_clock(store.clone(), Duration::from_secs(1)));
        tokio::time::sleep(Duration::from_millis(1_500)).await;

        let label = store.read(|s| s.snapshot("LR1", "CT1")).unwrap().last_update_label;
        assert_eq!(label.as_deref(), Some("2 hours ago"));
        clock.abort();
    }
}
