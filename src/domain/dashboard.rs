// Dashboard-level state shared by every renderer
use super::telemetry::DeviceSnapshot;
use serde::Serialize;

/// What the dashboard body should show, independent of per-sensor data.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DashboardPhase {
    #[default]
    Loading,
    Ready,
    /// No devices, or no sensor with data in the selected window.
    Empty,
    /// The whole acquisition batch failed (e.g. the device list itself).
    Unavailable { reason: String },
    /// Credentials were rejected; the session needs re-authentication.
    AuthExpired,
}

/// Broker connection state for the push-based feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LinkState {
    Connecting,
    Connected,
    Disconnected,
}

#[derive(Debug, Clone, Serialize)]
pub struct DashboardView {
    pub phase: DashboardPhase,
    pub link: Option<LinkState>,
    pub devices: Vec<DeviceSnapshot>,
}

impl DashboardView {
    pub fn new(phase: DashboardPhase, link: Option<LinkState>, devices: Vec<DeviceSnapshot>) -> Self {
        Self {
            phase,
            link,
            devices,
        }
    }
}
