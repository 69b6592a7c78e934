//! Account and session types.
//!
//! Passwords are stored as PBKDF2 hashes and session tokens are only ever
//! persisted as keyed hashes; the raw token is returned to the client once.

use serde::{Deserialize, Serialize};

/// Session lifetime (30 days).
pub const SESSION_TTL_MS: i64 = 30 * 24 * 60 * 60 * 1000;

/// Password reset token lifetime (24 hours).
pub const RESET_TOKEN_TTL_MS: i64 = 24 * 60 * 60 * 1000;

/// Account role.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "user" => Some(Role::User),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

/// User notification preferences, stored as JSON.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationPreferences {
    #[serde(default = "default_true")]
    pub signal_notifications: bool,
    #[serde(default)]
    pub market_notifications: bool,
    #[serde(default = "default_true")]
    pub system_notifications: bool,
    #[serde(default)]
    pub email_notifications: bool,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            signal_notifications: true,
            market_notifications: false,
            system_notifications: true,
            email_notifications: false,
        }
    }
}

fn default_true() -> bool {
    true
}

/// A user account (password hash never serialized).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub role: Role,
    pub is_active: bool,
    pub is_approved: bool,
    pub full_name: Option<String>,
    pub timezone: String,
    pub preferences: NotificationPreferences,
    /// Creation time (ms).
    pub created_at: i64,
    /// Last successful login (ms).
    pub last_login: Option<i64>,
    pub approved_by: Option<String>,
}

impl User {
    pub fn new(username: &str, email: &str, password_hash: String, role: Role) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            username: username.trim().to_string(),
            email: email.trim().to_lowercase(),
            password_hash,
            role,
            is_active: true,
            is_approved: false,
            full_name: None,
            timezone: "UTC".to_string(),
            preferences: NotificationPreferences::default(),
            created_at: chrono::Utc::now().timestamp_millis(),
            last_login: None,
            approved_by: None,
        }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Persisted session. `token_hash` is the keyed hash of the bearer token.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub token_hash: String,
    pub user_id: String,
    /// When session was created (ms)
    pub created_at: i64,
    /// When session expires (ms)
    pub expires_at: i64,
}

impl Session {
    pub fn new(token_hash: String, user_id: String) -> Self {
        let now = chrono::Utc::now().timestamp_millis();
        Self {
            token_hash,
            user_id,
            created_at: now,
            expires_at: now + SESSION_TTL_MS,
        }
    }

    pub fn is_expired(&self) -> bool {
        chrono::Utc::now().timestamp_millis() > self.expires_at
    }
}

/// Single-use password reset token.
#[derive(Debug, Clone)]
pub struct ResetToken {
    pub token_hash: String,
    pub user_id: String,
    pub expires_at: i64,
    pub used: bool,
}

impl ResetToken {
    pub fn is_valid(&self) -> bool {
        !self.used && chrono::Utc::now().timestamp_millis() <= self.expires_at
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

/// Login response.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub session_token: String,
    pub expires_at: i64,
    pub user: User,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    pub username: Option<String>,
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub timezone: Option<String>,
}

impl ProfileUpdate {
    pub fn is_empty(&self) -> bool {
        self.username.is_none()
            && self.email.is_none()
            && self.full_name.is_none()
            && self.timezone.is_none()
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetRequest {
    /// Email address or username.
    pub identifier: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetConfirmRequest {
    pub token: String,
    pub new_password: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminCreateUserRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleUpdateRequest {
    pub role: Role,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminPasswordRequest {
    pub new_password: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_serialization_hides_hash() {
        let user = User::new("alice", "Alice@Example.com", "secret-hash".to_string(), Role::User);
        let json = serde_json::to_string(&user).unwrap();
        assert!(!json.contains("secret-hash"));
        assert!(json.contains("\"email\":\"alice@example.com\""));
        assert!(json.contains("\"role\":\"user\""));
    }

    #[test]
    fn test_session_expiry() {
        let mut session = Session::new("hash".to_string(), "user".to_string());
        assert!(!session.is_expired());
        assert_eq!(session.expires_at - session.created_at, SESSION_TTL_MS);

        session.expires_at = chrono::Utc::now().timestamp_millis() - 1;
        assert!(session.is_expired());
    }

    #[test]
    fn test_preferences_defaults() {
        let prefs: NotificationPreferences = serde_json::from_str("{}").unwrap();
        assert_eq!(prefs, NotificationPreferences::default());
        assert!(prefs.signal_notifications);
        assert!(!prefs.email_notifications);
    }
}
