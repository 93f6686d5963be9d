// Presentation layer - Read-only renderer feed over HTTP
pub mod app_state;
pub mod handlers;
