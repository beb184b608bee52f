//! API request and response types.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Request to start a quiz chain.
#[derive(Debug, Clone, Deserialize)]
pub struct QuizTaskRequest {
    /// Email identifying the participant on the quiz platform
    pub email: String,

    /// Shared secret; must match the configured secret and is forwarded
    /// with every submission
    pub secret: String,

    /// URL of the first quiz page in the chain
    pub url: String,
}

/// Immediate acknowledgment returned before any quiz work happens.
#[derive(Debug, Clone, Serialize)]
pub struct AcceptedResponse {
    /// Identifier of the background chain
    pub id: Uuid,

    pub status: String,

    pub message: String,
}

/// Health check response.
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,

    /// Server version (from Cargo.toml)
    pub version: String,

    /// Number of chains currently running
    pub active_chains: usize,
}
