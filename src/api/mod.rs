// HTTP and WebSocket APIs

pub mod health;
pub mod websocket;

pub use health::create_health_router;
pub use websocket::{create_ws_router, ws_handler, WsAppState};

use crate::config::OriginPolicy;
use crate::health::HealthReporter;
use crate::relay::Relay;
use axum::http::{request::Parts, HeaderValue, Method};
use axum::Router;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};

/// CORS for the live channel, driven by the origin allow-list
pub fn cors_layer(origins: OriginPolicy) -> CorsLayer {
    CorsLayer::new()
        .allow_origin(AllowOrigin::predicate(
            move |origin: &HeaderValue, _parts: &Parts| {
                origin.to_str().map(|o| origins.allows(o)).unwrap_or(false)
            },
        ))
        .allow_methods([Method::GET, Method::POST])
        .allow_credentials(true)
}

/// Full application router: /health and /ws
///
/// The allow-list only scopes /ws; plain HTTP routes accept any origin.
pub fn create_router(relay: Arc<Relay>, health: Arc<HealthReporter>, origins: OriginPolicy) -> Router {
    let ws_state = Arc::new(WsAppState {
        relay,
        origins: origins.clone(),
    });

    Router::new()
        .merge(create_health_router(health).layer(CorsLayer::permissive()))
        .merge(create_ws_router(ws_state).layer(cors_layer(origins)))
}
