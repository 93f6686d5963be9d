// Backend REST client implementation
use crate::application::errors::FetchError;
use crate::application::telemetry_api::{
    DeviceRecord, TelemetryApi, TimeRange, TimeSeriesWindow, WindowStats,
};
use crate::domain::sample::{DeviceStatus, Sample};
use crate::domain::telemetry::TimeSeriesPoint;
use crate::infrastructure::config::{expand_endpoint, ApiSettings};
use crate::infrastructure::payload::deserialize_timestamp;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

const DEVICES_LIST: &str = "/api/v1/devices/";
const DEVICES_GET: &str = "/api/v1/devices/{device_id}";
const SENSOR_LATEST: &str = "/api/v1/devices/{device_id}/sensors/{sensor_type}/latest";
const SENSOR_STATS: &str = "/api/v1/devices/{device_id}/sensors/{sensor_type}/stats";
const SENSOR_TIMESERIES: &str = "/api/v1/devices/{device_id}/sensors/{sensor_type}/timeseries";

#[derive(Debug, Clone)]
pub struct HttpTelemetryApi {
    client: reqwest::Client,
    base_url: String,
    token: String,
}

#[derive(Debug, Deserialize)]
struct DeviceResponse {
    device_id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct LatestResponse {
    value: f64,
    #[serde(default)]
    unit: Option<String>,
    #[serde(deserialize_with = "deserialize_timestamp")]
    timestamp: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct StatsResponse {
    min_value: f64,
    max_value: f64,
    #[serde(default)]
    avg_value: Option<f64>,
    #[serde(default)]
    count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct TimeSeriesResponse {
    #[serde(default)]
    unit: Option<String>,
    data: Vec<PointResponse>,
}

#[derive(Debug, Deserialize)]
struct PointResponse {
    #[serde(deserialize_with = "deserialize_timestamp")]
    timestamp: DateTime<Utc>,
    value: f64,
}

impl TryFrom<DeviceResponse> for DeviceRecord {
    type Error = FetchError;

    fn try_from(device: DeviceResponse) -> Result<Self, Self::Error> {
        let status = DeviceStatus::from_token(&device.status).ok_or_else(|| {
            FetchError::Malformed(format!(
                "device {} has unknown status {:?}",
                device.device_id, device.status
            ))
        })?;
        Ok(DeviceRecord {
            device_id: device.device_id,
            status,
        })
    }
}

impl HttpTelemetryApi {
    pub fn new(settings: &ApiSettings) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs.max(1)))
            .build()?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            token: settings.token.clone(),
        })
    }

    fn build_url(&self, template: &str, device_id: &str, sensor_type: Option<&str>) -> String {
        let mut vars = HashMap::new();
        vars.insert("device_id", device_id);
        if let Some(sensor_type) = sensor_type {
            vars.insert("sensor_type", sensor_type);
        }
        format!("{}{}", self.base_url, expand_endpoint(template, &vars))
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T, FetchError> {
        tracing::debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .query(query)
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::UNAUTHORIZED {
            return Err(FetchError::AuthExpired);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Transient(format!("{} returned {}: {}", url, status, body)));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| FetchError::Transient(e.to_string()))?;
        serde_json::from_slice(&body).map_err(|e| FetchError::Malformed(format!("{}: {}", url, e)))
    }
}

/// Query parameters selecting the server window.
///
/// The backend only honours `quota_limit` on the time series endpoint with
/// an explicit date range.
fn range_query(range: &TimeRange, with_quota: bool) -> Vec<(&'static str, String)> {
    match range {
        TimeRange::LastHours(hours) => vec![("hours", hours.to_string())],
        TimeRange::Between {
            start_date,
            end_date,
            quota_limit,
        } => {
            let mut query = vec![("start_date", start_date.clone()), ("end_date", end_date.clone())];
            if let (true, Some(limit)) = (with_quota, quota_limit) {
                query.push(("quota_limit", limit.to_string()));
            }
            query
        }
    }
}

#[async_trait]
impl TelemetryApi for HttpTelemetryApi {
    async fn list_devices(&self) -> Result<Vec<DeviceRecord>, FetchError> {
        let url = format!("{}{}", self.base_url, DEVICES_LIST);
        let devices: Vec<DeviceResponse> = self.get_json(&url, &[]).await?;
        devices.into_iter().map(DeviceRecord::try_from).collect()
    }

    async fn get_device(&self, device_id: &str) -> Result<DeviceRecord, FetchError> {
        let url = self.build_url(DEVICES_GET, device_id, None);
        let device: DeviceResponse = self.get_json(&url, &[]).await?;
        DeviceRecord::try_from(device)
    }

    async fn latest_reading(&self, device_id: &str, sensor_type: &str) -> Result<Sample, FetchError> {
        let url = self.build_url(SENSOR_LATEST, device_id, Some(sensor_type));
        let latest: LatestResponse = self.get_json(&url, &[]).await?;
        Ok(Sample::new(latest.value, latest.unit.unwrap_or_default(), latest.timestamp))
    }

    async fn window_stats(
        &self,
        device_id: &str,
        sensor_type: &str,
        range: &TimeRange,
    ) -> Result<WindowStats, FetchError> {
        let url = self.build_url(SENSOR_STATS, device_id, Some(sensor_type));
        let stats: StatsResponse = self.get_json(&url, &range_query(range, false)).await?;
        Ok(WindowStats {
            min_value: stats.min_value,
            max_value: stats.max_value,
            avg_value: stats.avg_value,
            count: stats.count,
        })
    }

    async fn time_series(
        &self,
        device_id: &str,
        sensor_type: &str,
        range: &TimeRange,
    ) -> Result<TimeSeriesWindow, FetchError> {
        let url = self.build_url(SENSOR_TIMESERIES, device_id, Some(sensor_type));
        let series: TimeSeriesResponse = self.get_json(&url, &range_query(range, true)).await?;
        Ok(TimeSeriesWindow {
            unit: series.unit,
            points: series
                .data
                .into_iter()
                .map(|p| TimeSeriesPoint::new(p.timestamp, p.value))
                .collect(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn api() -> HttpTelemetryApi {
        HttpTelemetryApi::new(&ApiSettings {
            base_url: "http://localhost:8000/".into(),
            token: "secret".into(),
            timeout_secs: 1,
        })
        .unwrap()
    }

    #[test]
    fn test_build_url() {
        let api = api();
        assert_eq!(
            api.build_url(SENSOR_LATEST, "LR1", Some("K-Type")),
            "http://localhost:8000/api/v1/devices/LR1/sensors/K-Type/latest"
        );
        assert_eq!(
            api.build_url(DEVICES_GET, "LR2", None),
            "http://localhost:8000/api/v1/devices/LR2"
        );
    }

    #[test]
    fn test_range_query() {
        assert_eq!(range_query(&TimeRange::LastHours(6), true), vec![("hours", "6".to_string())]);

        let range = TimeRange::Between {
            start_date: "2025-03-01".into(),
            end_date: "2025-03-02".into(),
            quota_limit: Some(100),
        };
        assert_eq!(range_query(&range, false).len(), 2);
        assert_eq!(range_query(&range, true)[2], ("quota_limit", "100".to_string()));
    }

    #[test]
    fn test_decode_backend_shapes() {
        let latest: LatestResponse = serde_json::from_str(
            r#"{"id": 7, "device_id": 1, "sensor_type": "CT1", "value": 42.0, "unit": "A", "timestamp": "2025-03-01T12:00:00.123456"}"#,
        )
        .unwrap();
        assert_eq!(latest.value, 42.0);
        assert_eq!(latest.timestamp.timestamp(), Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap().timestamp());

        let series: TimeSeriesResponse = serde_json::from_str(
            r#"{"sensor_type": "CT1", "unit": null, "data": [{"timestamp": "2025-03-01T11:59:00Z", "value": 40}, {"timestamp": "2025-03-01T12:00:00", "value": 42}]}"#,
        )
        .unwrap();
        assert_eq!(series.data.len(), 2);
        assert_eq!(series.unit, None);

        let device: DeviceResponse =
            serde_json::from_str(r#"{"id": 1, "device_id": "LR1", "name": "Line 1", "status": "online"}"#).unwrap();
        assert_eq!(
            DeviceRecord::try_from(device).unwrap(),
            DeviceRecord {
                device_id: "LR1".into(),
                status: DeviceStatus::Online
            }
        );
    }

    #[test]
    fn test_missing_required_fields_are_rejected() {
        assert!(serde_json::from_str::<LatestResponse>(r#"{"unit": "A", "timestamp": "2025-03-01T12:00:00"}"#).is_err());
        assert!(serde_json::from_str::<StatsResponse>(r#"{"min_value": 1.0}"#).is_err());
        assert!(serde_json::from_str::<LatestResponse>(r#"{"value": 1.0, "timestamp": "noon"}"#).is_err());

        let device = DeviceResponse {
            device_id: "LR1".into(),
            status: "maintenance".into(),
        };
        assert!(matches!(DeviceRecord::try_from(device), Err(FetchError::Malformed(_))));
    }
}
