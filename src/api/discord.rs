//! Discord API (admin only)
//!
//! - POST /api/discord/test   - Probe the webhook
//! - POST /api/discord/send   - Post a custom or status message

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::auth::AdminUser;
use crate::api::ApiResponse;
use crate::error::{AppError, Result};
use crate::services::formatter::StatusKind;
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/test", post(test_connection))
        .route("/send", post(send_message))
}

#[derive(Debug, Serialize)]
pub struct ConnectionResponse {
    pub configured: bool,
    pub connected: bool,
}

#[derive(Debug, Deserialize)]
pub struct SendRequest {
    pub message: String,
    /// info, warning, error or success; sent verbatim when absent.
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub sent: bool,
}

async fn test_connection(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Json<ApiResponse<ConnectionResponse>> {
    let discord = state.notifier.discord();
    let configured = discord.is_configured();
    let connected = configured && discord.test_connection().await;

    Json(ApiResponse::new(ConnectionResponse {
        configured,
        connected,
    }))
}

async fn send_message(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(request): Json<SendRequest>,
) -> Result<Json<ApiResponse<SendResponse>>> {
    let message = request.message.trim();
    if message.is_empty() {
        return Err(AppError::BadRequest("Message is required".to_string()));
    }

    let discord = state.notifier.discord();
    if !discord.is_configured() {
        return Err(AppError::BadRequest("Discord webhook not configured".to_string()));
    }

    let sent = match request.status.as_deref() {
        Some(kind) => discord.send_status(message, StatusKind::from_str(kind)).await,
        None => discord.send(message).await,
    };
    if !sent {
        return Err(AppError::ExternalApi("Discord rejected the message".to_string()));
    }

    info!("{} posted a custom Discord message", admin.username);
    Ok(Json(ApiResponse::new(SendResponse { sent })))
}
