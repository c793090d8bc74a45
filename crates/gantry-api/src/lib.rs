//! API server for the Gantry CI orchestrator.
//!
//! Provides the HTTP trigger/query endpoints and the GitHub webhook ingress.

pub mod error;
pub mod routes;
pub mod state;

pub use state::AppState;
