// Error taxonomy for acquisition adapters
use thiserror::Error;

/// Failure of a single backend request.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FetchError {
    /// 401 from any endpoint. Terminal for the session.
    #[error("authentication expired")]
    AuthExpired,
    /// Network error, timeout or non-2xx status other than 401.
    #[error("request failed: {0}")]
    Transient(String),
    /// Body was not the expected JSON shape.
    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// A pushed message that could not be turned into a store mutation.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PayloadError {
    #[error("topic {0} is not a status or sensor topic")]
    UnknownTopic(String),
    #[error("device {0} is not tracked by this dashboard")]
    UnknownDevice(String),
    #[error("sensor {0} is not tracked by this dashboard")]
    UnknownSensor(String),
    #[error("unrecognised status token {0:?}")]
    BadStatus(String),
    #[error("invalid sensor payload: {0}")]
    BadSample(String),
}

/// Returned by adapters once the backend has rejected the session credentials.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("session authentication expired; re-authentication required")]
pub struct AuthExpired;
