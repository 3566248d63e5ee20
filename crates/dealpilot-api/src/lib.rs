//! Dealpilot API crate - axum HTTP surface for the automation engine.
//!
//! Accepts call signals, exposes the rule list and the execution log, and
//! reports health. Everything except `/health` sits behind bearer-token auth.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::{create_router, start_server};
pub use state::AppState;
