//! Admin API
//!
//! User management, restricted to the admin role:
//!
//! - GET  /api/admin/users                  - All users
//! - GET  /api/admin/users/pending          - Accounts awaiting approval
//! - POST /api/admin/users                  - Create a pre-approved user
//! - POST /api/admin/users/:id/approve      - Approve and email the user
//! - POST /api/admin/users/:id/reject       - Delete an unapproved account
//! - PUT  /api/admin/users/:id/role         - Change role
//! - POST /api/admin/users/:id/deactivate   - Disable login and end sessions
//! - POST /api/admin/users/:id/reactivate   - Re-enable login
//! - PUT  /api/admin/users/:id/password     - Set a new password

use axum::{
    extract::{Path, State},
    routing::{get, post, put},
    Json, Router,
};
use tracing::{info, warn};

use crate::api::auth::AdminUser;
use crate::api::ApiResponse;
use crate::services::AuthError;
use crate::types::{
    AdminCreateUserRequest, AdminPasswordRequest, NotificationType, RoleUpdateRequest, User,
};
use crate::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_users).post(create_user))
        .route("/users/pending", get(list_pending))
        .route("/users/:id/approve", post(approve_user))
        .route("/users/:id/reject", post(reject_user))
        .route("/users/:id/role", put(update_role))
        .route("/users/:id/deactivate", post(deactivate_user))
        .route("/users/:id/reactivate", post(reactivate_user))
        .route("/users/:id/password", put(reset_password))
}

type UserResult = Result<Json<ApiResponse<User>>, AuthError>;

async fn list_users(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<ApiResponse<Vec<User>>>, AuthError> {
    Ok(Json(ApiResponse::new(state.auth.list_users()?)))
}

async fn list_pending(
    State(state): State<AppState>,
    _admin: AdminUser,
) -> Result<Json<ApiResponse<Vec<User>>>, AuthError> {
    Ok(Json(ApiResponse::new(state.auth.list_pending_users()?)))
}

async fn create_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Json(request): Json<AdminCreateUserRequest>,
) -> UserResult {
    let user = state.auth.admin_create_user(&admin.id, &request)?;
    Ok(Json(ApiResponse::new(user)))
}

/// POST /api/admin/users/:id/approve
///
/// Approval email failures are logged; the approval itself stands.
async fn approve_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> UserResult {
    let user = state.auth.approve_user(&admin.id, &id)?;
    info!("{} approved by {}", user.username, admin.username);

    if let Err(e) = state.notifier.notify_user(
        &user.id,
        NotificationType::Success,
        "Account approved",
        Some("Welcome to BFI Signals".to_string()),
        None,
    ) {
        warn!("Failed to record approval notification: {}", e);
    }

    if let Err(e) = state.notifier.email().send_account_approved(&user).await {
        warn!("Approval email to {} failed: {}", user.email, e);
    }

    Ok(Json(ApiResponse::new(user)))
}

async fn reject_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> UserResult {
    Ok(Json(ApiResponse::new(state.auth.reject_user(&id)?)))
}

async fn update_role(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
    Json(request): Json<RoleUpdateRequest>,
) -> UserResult {
    Ok(Json(ApiResponse::new(
        state.auth.update_role(&admin.id, &id, request.role)?,
    )))
}

async fn deactivate_user(
    State(state): State<AppState>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> UserResult {
    Ok(Json(ApiResponse::new(
        state.auth.deactivate_user(&admin.id, &id)?,
    )))
}

async fn reactivate_user(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
) -> UserResult {
    Ok(Json(ApiResponse::new(state.auth.reactivate_user(&id)?)))
}

async fn reset_password(
    State(state): State<AppState>,
    _admin: AdminUser,
    Path(id): Path<String>,
    Json(request): Json<AdminPasswordRequest>,
) -> UserResult {
    Ok(Json(ApiResponse::new(
        state.auth.admin_reset_password(&id, &request.new_password)?,
    )))
}
