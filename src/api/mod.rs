//! HTTP API for the quiz chain service.
//!
//! ## Endpoints
//!
//! - `POST /api/quiz` - Accept a quiz task and start a chain in the background
//! - `GET /api/chains` - List all chains known to this process
//! - `GET /api/chains/{id}` - Inspect one chain
//! - `GET /api/health` - Health check

mod auth;
mod routes;
pub mod types;

pub use routes::serve;
pub use types::*;
