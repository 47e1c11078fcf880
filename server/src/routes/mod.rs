//! Router assembly.

pub mod ws;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::get;
use tower_http::cors::{Any, CorsLayer};

use crate::state::AppState;

/// Relay routes: the websocket channel plus a health probe.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any);

    Router::new()
        .route("/channel", get(ws::handle_channel))
        .route("/healthz", get(healthz))
        .layer(cors)
        .with_state(state)
}

async fn healthz() -> StatusCode {
    StatusCode::OK
}
