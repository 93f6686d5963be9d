// HTTP request handlers
use crate::presentation::app_state::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/healthz", get(health_check))
        .route("/dashboard", get(dashboard))
        .route("/devices/:id", get(device))
        .route("/devices/:id/sensors/:sensor_type", get(sensor))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check() -> &'static str {
    "ok"
}

/// Whole-dashboard view: phase, broker link and every device
pub async fn dashboard(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(state.store.read(|s| s.view()))
}

pub async fn device(Path(id): Path<String>, State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.store.read(|s| s.device_snapshot(&id)) {
        Some(snapshot) => Json(snapshot).into_response(),
        None => (StatusCode::NOT_FOUND, format!("unknown device {}", id)).into_response(),
    }
}

pub async fn sensor(
    Path((id, sensor_type)): Path<(String, String)>,
    State(state): State<Arc<AppState>>,
) -> impl IntoResponse {
    match state.store.read(|s| s.snapshot(&id, &sensor_type)) {
        Some(snapshot) => Json(snapshot).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            format!("no data for {}/{}", id, sensor_type),
        )
            .into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::store_handle::StoreHandle;
    use crate::domain::sample::{DeviceStatus, Sample};
    use crate::domain::store::TelemetryStore;
    use chrono::Utc;

    fn state() -> Arc<AppState> {
        let store = StoreHandle::new(TelemetryStore::new(10));
        store.write(|s| {
            s.set_status("LR1", DeviceStatus::Online);
            s.ingest_sample("LR1", "CT1", Sample::new(42.0, "A", Utc::now()));
        });
        Arc::new(AppState { store })
    }

    #[tokio::test]
    async fn test_sensor_lookup() {
        let response = sensor(Path(("LR1".into(), "CT1".into())), State(state()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let response = sensor(Path(("LR1".into(), "IR".into())), State(state()))
            .await
            .into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_device_lookup() {
        let response = device(Path("LR1".into()), State(state())).await.into_response();
        assert_eq!(response.status(), StatusCode::OK);

        let response = device(Path("LR9".into()), State(state())).await.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_view_serializes() {
        let view = state().store.read(|s| s.view());
        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["phase"]["kind"], "loading");
        assert_eq!(json["devices"][0]["status"], "online");
        assert_eq!(json["devices"][0]["sensors"][0]["latest_value"], 42.0);
        assert_eq!(json["devices"][0]["sensors"][0]["stats_source"], "local");
    }
}
