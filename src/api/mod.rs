pub mod admin;
pub mod auth;
pub mod dashboard;
pub mod discord;
pub mod health;
pub mod journal;
pub mod market;
pub mod notifications;
pub mod signals;

use axum::Router;
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::AppState;

/// API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Simple acknowledgement body.
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Create the API router.
pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(dashboard::router())
        .nest("/api/auth", auth::router())
        .nest("/api/admin", admin::router())
        .nest("/api/signals", signals::router())
        .nest("/api/journal", journal::router())
        .nest("/api/notifications", notifications::router())
        .nest("/api/market", market::router())
        .nest("/api/discord", discord::router())
}

/// Full application with state, CORS and request tracing.
pub fn app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    router()
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
