//! Transporter API Server module
//!
//! Provides an HTTP REST API over a drive directory.
//! Run with `transporter-server`.

pub mod handlers;
pub mod server;

pub use server::{build_router, run_api_server, ApiConfig, AppState};
