use crate::config::OriginPolicy;
use crate::relay::Relay;
use crate::subscription::ConnectionManager;
use axum::{
    extract::{ws::WebSocketUpgrade, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use std::sync::Arc;
use tracing::{info, warn};

/// Shared application state for WebSocket handler
#[derive(Clone)]
pub struct WsAppState {
    pub relay: Arc<Relay>,
    pub origins: OriginPolicy,
}

/// Origin gate: browsers must come from an allowed origin.
///
/// Runs as a tower layer BEFORE WebSocket upgrade extraction so 403 can be
/// returned without a valid upgrade request. Requests without an Origin
/// header (non-browser producers) pass.
async fn ws_origin(
    State(state): State<Arc<WsAppState>>,
    req: Request,
    next: Next,
) -> Response {
    if let Some(origin) = req.headers().get(header::ORIGIN) {
        let allowed = origin
            .to_str()
            .map(|o| state.origins.allows(o))
            .unwrap_or(false);
        if !allowed {
            warn!(origin = ?origin, "Rejected WebSocket from disallowed origin");
            return (StatusCode::FORBIDDEN, "Origin not allowed").into_response();
        }
    }
    next.run(req).await
}

/// GET /ws - WebSocket upgrade handler (origin checked by ws_origin middleware)
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<Arc<WsAppState>>,
) -> Response {
    info!("WebSocket upgrade request received");
    ws.on_upgrade(move |socket| ConnectionManager::new(Arc::clone(&state.relay)).handle(socket))
}

/// Create WebSocket router with origin middleware applied
pub fn create_ws_router(state: Arc<WsAppState>) -> Router {
    Router::new()
        .route("/ws", get(ws_handler))
        .route_layer(middleware::from_fn_with_state(state.clone(), ws_origin))
        .with_state(state)
}
