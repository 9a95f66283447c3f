use crate::health::{HealthReport, HealthReporter};
use axum::{extract::State, response::Json, routing::get, Router};
use std::sync::Arc;

/// Create router with the health endpoint
pub fn create_health_router(reporter: Arc<HealthReporter>) -> Router {
    Router::new()
        .route("/health", get(health))
        .with_state(reporter)
}

/// GET /health - always 200; store outages are reported in the body
async fn health(State(reporter): State<Arc<HealthReporter>>) -> Json<HealthReport> {
    Json(reporter.report().await)
}
