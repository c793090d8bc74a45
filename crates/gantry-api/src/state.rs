//! Application state.

use gantry_engine::Lifecycle;
use gantry_store::BuildStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn BuildStore>,
    pub lifecycle: Arc<Lifecycle>,
    /// Shared secret for webhook signature verification.
    pub webhook_secret: String,
}

impl AppState {
    pub fn new(store: Arc<dyn BuildStore>, webhook_secret: String) -> Self {
        let lifecycle = Arc::new(Lifecycle::new(store.clone()));
        Self {
            store,
            lifecycle,
            webhook_secret,
        }
    }
}
