// Domain layer - Telemetry aggregation core, free of I/O
pub mod dashboard;
pub mod relative_time;
pub mod running_stats;
pub mod sample;
pub mod sample_buffer;
pub mod store;
pub mod telemetry;
