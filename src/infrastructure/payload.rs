// Payload decoding shared by the HTTP client and the broker feed
use crate::application::errors::PayloadError;
use crate::domain::sample::Sample;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::Deserialize;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse an ISO-8601 timestamp. Values without an offset (the backend drops
/// the trailing `Z`) are read as UTC.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Serde adapter for timestamp fields in backend responses.
pub fn deserialize_timestamp<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_timestamp(&raw).ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp {:?}", raw)))
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Numeric {
    Number(f64),
    Text(String),
}

#[derive(Debug, Deserialize)]
struct SensorPayload {
    value: Numeric,
    #[serde(default)]
    unit: Option<String>,
    #[serde(default)]
    timestamp: Option<String>,
}

/// Decode a `{value, unit, timestamp}` sensor message.
///
/// `value` is required and may be a number or a numeric string. A missing
/// unit becomes empty; a missing timestamp is replaced by `received_at`.
pub fn decode_sensor_payload(payload: &[u8], received_at: DateTime<Utc>) -> Result<Sample, PayloadError> {
    let data: SensorPayload =
        serde_json::from_slice(payload).map_err(|e| PayloadError::BadSample(e.to_string()))?;

    let value = match data.value {
        Numeric::Number(v) => v,
        Numeric::Text(s) => s
            .trim()
            .parse::<f64>()
            .map_err(|_| PayloadError::BadSample(format!("value {:?} is not a number", s)))?,
    };
    if !value.is_finite() {
        return Err(PayloadError::BadSample(format!("value {} is not finite", value)));
    }

    let timestamp = match data.timestamp.as_deref() {
        None | Some("") => received_at,
        Some(raw) => parse_timestamp(raw)
            .ok_or_else(|| PayloadError::BadSample(format!("invalid timestamp {:?}", raw)))?,
    };

    Ok(Sample::new(value, data.unit.unwrap_or_default(), timestamp))
}
