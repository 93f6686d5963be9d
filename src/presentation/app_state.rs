// Application state for HTTP handlers
use crate::application::store_handle::StoreHandle;

#[derive(Clone)]
pub struct AppState {
    pub store: StoreHandle,
}
