//! API routes.

pub mod builds;
pub mod health;
pub mod webhooks;

use crate::AppState;
use axum::Router;

/// Build the main API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .nest("/api", builds::router())
        .nest("/webhooks", webhooks::router())
        .merge(health::router())
        .with_state(state)
}
