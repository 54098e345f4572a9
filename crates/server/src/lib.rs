//! Orchestrator HTTP server: client API, worker dispatch and persistence.

pub mod api;
pub mod auth;
pub mod db;
pub mod repository;
pub mod router;
pub mod state;

pub use router::build_router;
pub use state::AppState;
