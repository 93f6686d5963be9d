// Telemetry dashboard core: acquisition adapters, session store and renderer feed
pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;
