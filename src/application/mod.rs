// Application layer - Acquisition use cases over the telemetry store
pub mod errors;
pub mod polling_service;
pub mod scheduler;
pub mod store_handle;
pub mod stream_service;
pub mod telemetry_api;
