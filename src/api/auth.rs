/**
 * Authentication API
 *
 * Endpoints for accounts, sessions and profile management.
 *
 * Flow:
 * 1. POST /api/auth/register - Create an account (pending admin approval)
 * 2. POST /api/auth/login - Exchange credentials for a session token
 * 3. GET /api/auth/me - Current user (requires auth)
 * 4. PUT /api/auth/profile, /password, /preferences - Account settings
 * 5. POST /api/auth/logout - Invalidate the session
 * 6. POST /api/auth/reset/request, /reset/confirm - Password reset by email
 */

use axum::{
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, HeaderValue},
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;
use tracing::{info, warn};

use crate::api::{ApiResponse, SuccessResponse};
use crate::services::AuthError;
use crate::types::{
    ChangePasswordRequest, LoginRequest, NotificationPreferences, NotificationType, ProfileUpdate,
    RegisterRequest, ResetConfirmRequest, ResetRequest, User,
};
use crate::AppState;

pub const SESSION_COOKIE: &str = "session_token";
const SESSION_MAX_AGE_SECS: i64 = 30 * 24 * 60 * 60;

/// Create auth router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(get_me))
        .route("/profile", put(update_profile))
        .route("/password", put(change_password))
        .route("/preferences", put(update_preferences))
        .route("/reset/request", post(request_reset))
        .route("/reset/confirm", post(confirm_reset))
}

/// Registration response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterResponse {
    pub user: User,
    pub pending_approval: bool,
}

/// Password reset request response. Identical whether or not the account exists.
#[derive(Debug, Serialize)]
pub struct ResetRequestResponse {
    pub success: bool,
    pub message: &'static str,
}

fn session_cookie(token: &str, max_age: i64) -> Option<HeaderValue> {
    HeaderValue::from_str(&format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        SESSION_COOKIE, token, max_age
    ))
    .ok()
}

/// POST /api/auth/register
async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<ApiResponse<RegisterResponse>>, AuthError> {
    let user = state.auth.register(&request)?;

    if let Err(e) = state.notifier.notify_admins(
        NotificationType::Security,
        "New user registration",
        Some(format!("{} ({}) is waiting for approval", user.username, user.email)),
        None,
    ) {
        warn!("Failed to notify admins about {}: {}", user.username, e);
    }

    Ok(Json(ApiResponse::new(RegisterResponse {
        pending_approval: !user.is_approved,
        user,
    })))
}

/// POST /api/auth/login
///
/// Returns the session token in the body and as an HttpOnly cookie.
async fn login(
    State(state): State<AppState>,
    Json(request): Json<LoginRequest>,
) -> Result<Response, AuthError> {
    let response = state.auth.login(&request)?;

    let mut headers = HeaderMap::new();
    if let Some(cookie) = session_cookie(&response.session_token, SESSION_MAX_AGE_SECS) {
        headers.insert(header::SET_COOKIE, cookie);
    }

    Ok((headers, Json(ApiResponse::new(response))).into_response())
}

/// POST /api/auth/logout
async fn logout(State(state): State<AppState>, auth: Authenticated) -> Result<Response, AuthError> {
    state.auth.logout(&auth.token)?;

    let mut headers = HeaderMap::new();
    if let Some(cookie) = session_cookie("", 0) {
        headers.insert(header::SET_COOKIE, cookie);
    }

    Ok((headers, Json(ApiResponse::new(SuccessResponse { success: true }))).into_response())
}

/// GET /api/auth/me
async fn get_me(auth: Authenticated) -> Json<ApiResponse<User>> {
    Json(ApiResponse::new(auth.user))
}

/// PUT /api/auth/profile
async fn update_profile(
    State(state): State<AppState>,
    auth: Authenticated,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<ApiResponse<User>>, AuthError> {
    let user = state.auth.update_profile(&auth.user.id, &update)?;
    Ok(Json(ApiResponse::new(user)))
}

/// PUT /api/auth/password
async fn change_password(
    State(state): State<AppState>,
    auth: Authenticated,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<SuccessResponse>>, AuthError> {
    state.auth.change_password(&auth.user.id, &request)?;
    Ok(Json(ApiResponse::new(SuccessResponse { success: true })))
}

/// PUT /api/auth/preferences
async fn update_preferences(
    State(state): State<AppState>,
    auth: Authenticated,
    Json(preferences): Json<NotificationPreferences>,
) -> Result<Json<ApiResponse<User>>, AuthError> {
    let user = state.auth.update_preferences(&auth.user.id, preferences)?;
    Ok(Json(ApiResponse::new(user)))
}

/// POST /api/auth/reset/request
async fn request_reset(
    State(state): State<AppState>,
    Json(request): Json<ResetRequest>,
) -> Result<Json<ApiResponse<ResetRequestResponse>>, AuthError> {
    if let Some((user, token)) = state.auth.request_password_reset(&request.identifier)? {
        match state.notifier.email().send_password_reset(&user, &token).await {
            Ok(()) => info!("Password reset email sent to {}", user.email),
            Err(e) => warn!("Password reset email to {} failed: {}", user.email, e),
        }
    }

    Ok(Json(ApiResponse::new(ResetRequestResponse {
        success: true,
        message: "If the account exists, a reset link has been sent",
    })))
}

/// POST /api/auth/reset/confirm
async fn confirm_reset(
    State(state): State<AppState>,
    Json(request): Json<ResetConfirmRequest>,
) -> Result<Json<ApiResponse<SuccessResponse>>, AuthError> {
    state
        .auth
        .confirm_password_reset(&request.token, &request.new_password)?;
    Ok(Json(ApiResponse::new(SuccessResponse { success: true })))
}

// =============================================================================
// Extractors
// =============================================================================

/// Pull the session token from `Authorization: Bearer` or the session cookie.
pub fn session_token(parts: &Parts) -> Option<String> {
    if let Some(token) = parts
        .headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
    {
        return Some(token.trim().to_string());
    }

    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, value)| *name == SESSION_COOKIE && !value.is_empty())
        .map(|(_, value)| value.to_string())
}

/// Authenticated user extractor.
///
/// Use this in route handlers to require a valid session:
/// ```ignore
/// async fn my_handler(auth: Authenticated) -> impl IntoResponse {
///     let user = auth.user;
///     // ...
/// }
/// ```
pub struct Authenticated {
    pub user: User,
    pub token: String,
}

#[axum::async_trait]
impl FromRequestParts<AppState> for Authenticated {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = session_token(parts).ok_or(AuthError::Unauthorized)?;
        let user = state.auth.validate_session(&token)?;
        Ok(Authenticated { user, token })
    }
}

/// Extractor that additionally requires the admin role.
pub struct AdminUser(pub User);

#[axum::async_trait]
impl FromRequestParts<AppState> for AdminUser {
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth = Authenticated::from_request_parts(parts, state).await?;
        if !auth.user.is_admin() {
            return Err(AuthError::Forbidden);
        }
        Ok(AdminUser(auth.user))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts(name: header::HeaderName, value: &str) -> Parts {
        let (parts, _) = Request::builder()
            .header(name, value)
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    #[test]
    fn test_bearer_token() {
        let parts = parts(header::AUTHORIZATION, "Bearer abc123");
        assert_eq!(session_token(&parts).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_cookie_token() {
        let parts = parts(header::COOKIE, "theme=dark; session_token=tok42; other=1");
        assert_eq!(session_token(&parts).as_deref(), Some("tok42"));
    }

    #[test]
    fn test_missing_token() {
        let parts = parts(header::COOKIE, "session_token=");
        assert!(session_token(&parts).is_none());

        let parts = parts_without_headers();
        assert!(session_token(&parts).is_none());
    }

    fn parts_without_headers() -> Parts {
        Request::builder().body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_session_cookie_format() {
        let cookie = session_cookie("tok", SESSION_MAX_AGE_SECS).unwrap();
        let value = cookie.to_str().unwrap();
        assert!(value.starts_with("session_token=tok;"));
        assert!(value.contains("HttpOnly"));
        assert!(value.contains("Max-Age=2592000"));
    }
}
