// Shared handle to the session's telemetry store
use crate::domain::store::TelemetryStore;
use std::sync::{Arc, PoisonError, RwLock};

/// Cloneable reference to the one store of a session.
///
/// Closures passed to [`StoreHandle::write`] run to completion under the lock
/// and must not await, so readers never observe a half-applied mutation.
#[derive(Clone, Default)]
pub struct StoreHandle {
    inner: Arc<RwLock<TelemetryStore>>,
}

impl StoreHandle {
    pub fn new(store: TelemetryStore) -> Self {
        Self {
            inner: Arc::new(RwLock::new(store)),
        }
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut TelemetryStore) -> R) -> R {
        let mut guard = self.inner.write().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    pub fn read<R>(&self, f: impl FnOnce(&TelemetryStore) -> R) -> R {
        let guard = self.inner.read().unwrap_or_else(PoisonError::into_inner);
        f(&guard)
    }
}
