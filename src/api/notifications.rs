//! Notifications API
//!
//! Endpoints for managing user notifications:
//!
//! - GET  /api/notifications               - List notifications (paginated)
//! - POST /api/notifications/:id/read      - Mark one notification as read
//! - POST /api/notifications/read-all      - Mark all notifications as read
//! - GET  /api/notifications/unread-count  - Badge count

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use serde::Serialize;

use crate::api::auth::Authenticated;
use crate::api::ApiResponse;
use crate::error::{AppError, Result};
use crate::types::{NotificationListResponse, NotificationQuery};
use crate::AppState;

// =============================================================================
// Router
// =============================================================================

/// Create notifications router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_notifications))
        .route("/read-all", post(mark_all_read))
        .route("/unread-count", get(unread_count))
        .route("/:id/read", post(mark_read))
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize)]
pub struct AffectedResponse {
    pub success: bool,
    pub affected: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UnreadCountResponse {
    pub unread_count: i64,
}

fn total_pages(total: i64, page_size: i64) -> i64 {
    ((total as f64) / (page_size as f64)).ceil().max(1.0) as i64
}

// =============================================================================
// Handlers
// =============================================================================

/// GET /api/notifications
async fn list_notifications(
    auth: Authenticated,
    State(state): State<AppState>,
    Query(query): Query<NotificationQuery>,
) -> Result<Json<ApiResponse<NotificationListResponse>>> {
    let user_id = &auth.user.id;
    let page = query.page.unwrap_or(1).max(1);
    let page_size = query.page_size.unwrap_or(20).clamp(1, 100);

    let (notifications, total) = state.store.list_notifications(user_id, &query)?;
    let unread_count = state.store.unread_count(user_id)?;

    Ok(Json(ApiResponse::new(NotificationListResponse {
        notifications,
        total,
        page,
        page_size,
        total_pages: total_pages(total, page_size),
        unread_count,
    })))
}

/// POST /api/notifications/:id/read
async fn mark_read(
    auth: Authenticated,
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<AffectedResponse>>> {
    if !state.store.mark_notification_read(&auth.user.id, &id)? {
        return Err(AppError::NotFound(format!("Notification {} not found", id)));
    }
    Ok(Json(ApiResponse::new(AffectedResponse {
        success: true,
        affected: 1,
    })))
}

/// POST /api/notifications/read-all
async fn mark_all_read(
    auth: Authenticated,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<AffectedResponse>>> {
    let affected = state.store.mark_all_notifications_read(&auth.user.id)?;
    Ok(Json(ApiResponse::new(AffectedResponse {
        success: true,
        affected: affected as i64,
    })))
}

/// GET /api/notifications/unread-count
async fn unread_count(
    auth: Authenticated,
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<UnreadCountResponse>>> {
    let unread_count = state.store.unread_count(&auth.user.id)?;
    Ok(Json(ApiResponse::new(UnreadCountResponse { unread_count })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_pages() {
        assert_eq!(total_pages(0, 20), 1);
        assert_eq!(total_pages(20, 20), 1);
        assert_eq!(total_pages(21, 20), 2);
        assert_eq!(total_pages(101, 10), 11);
    }
}
