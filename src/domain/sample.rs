// Sample and device status domain models
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;

pub type DeviceId = String;
pub type SensorType = String;

/// A single timestamped scalar observation. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sample {
    pub value: f64,
    pub unit: String,
    pub timestamp: DateTime<Utc>,
}

impl Sample {
    pub fn new(value: f64, unit: impl Into<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            value,
            unit: unit.into(),
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    Online,
    #[default]
    Offline,
}

impl DeviceStatus {
    /// Parse a status token as published by devices ("online", "OFFLINE\n", ...)
    pub fn from_token(token: &str) -> Option<Self> {
        match token.trim().to_ascii_lowercase().as_str() {
            "online" => Some(Self::Online),
            "offline" => Some(Self::Offline),
            _ => None,
        }
    }

    pub fn is_online(self) -> bool {
        self == Self::Online
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Online => f.write_str("online"),
            Self::Offline => f.write_str("offline"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_tokens() {
        assert_eq!(DeviceStatus::from_token("online"), Some(DeviceStatus::Online));
        assert_eq!(DeviceStatus::from_token(" Offline\n"), Some(DeviceStatus::Offline));
        assert_eq!(DeviceStatus::from_token("ONLINE"), Some(DeviceStatus::Online));
        assert_eq!(DeviceStatus::from_token("rebooting"), None);
        assert_eq!(DeviceStatus::from_token(""), None);
    }

    #[test]
    fn test_status_display_matches_token() {
        for status in [DeviceStatus::Online, DeviceStatus::Offline] {
            assert_eq!(DeviceStatus::from_token(&status.to_string()), Some(status));
        }
    }
}
