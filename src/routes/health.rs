// Health check endpoints, unauthenticated
use crate::types::HealthResponse;
use actix_web::{get, HttpResponse, Result};

fn current_health() -> HealthResponse {
    HealthResponse {
        status: "ok".to_string(),
        time: crate::time::now(),
        version: option_env!("CARGO_PKG_VERSION").map(|s| s.to_string()),
    }
}

#[get("/healthz")]
pub async fn healthz() -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(current_health()))
}

/// Alias kept for load balancers that probe /health.
#[get("/health")]
pub async fn health() -> Result<HttpResponse> {
    Ok(HttpResponse::Ok().json(current_health()))
}
