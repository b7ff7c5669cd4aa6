//! HTTP surface of the relay.
//!
//! - `POST /api/chat` streams the relayed completion as server-sent events.
//!   Any other method gets a 405.
//! - `GET /api/modes` and `GET /api/modes/{id}` describe the available modes.
//! - `GET /health` reports liveness.
//!
//! Every non-streaming failure is a JSON [`ErrorBody`](crate::types::ErrorBody).

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};

use crate::relay::Relay;

mod config;
mod error;
mod routes;

pub use config::{DEFAULT_BIND, RelayArgs, RelayConfig};
pub use error::{ApiError, CHAT_FAILED, INVALID_BODY};

/// State shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub relay: Relay,
}

impl AppState {
    pub fn new(relay: Relay) -> Self {
        Self { relay }
    }
}

/// Build the relay's router.
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route(
            "/api/chat",
            post(routes::chat).fallback(routes::method_not_allowed),
        )
        .route("/api/modes", get(routes::list_modes))
        .route("/api/modes/{id}", get(routes::get_mode))
        .route("/health", get(routes::health))
        .layer(cors)
        .with_state(state)
}
