//! Route handlers

use axum::{Extension, Json};
use portier_auth::Identity;
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: portier_core::VERSION,
    })
}

/// GET /whoami
///
/// Echoes the identity attached by the auth middleware.
pub async fn whoami(Extension(identity): Extension<Identity>) -> Json<Identity> {
    Json(identity)
}
