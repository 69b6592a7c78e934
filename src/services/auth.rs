/**
 * Authentication Service
 *
 * Handles accounts, password hashing and session management.
 * - Passwords: PBKDF2-HMAC-SHA256 with a random per-user salt
 * - Session and reset tokens: random, only stored as an HMAC of the token
 *
 * Storage:
 * - SQLite: users, sessions, reset tokens
 * - DashMap: in-memory session cache
 */

use crate::error::AppError;
use crate::services::SqliteStore;
use crate::types::{
    AdminCreateUserRequest, ChangePasswordRequest, LoginRequest, LoginResponse,
    NotificationPreferences, ProfileUpdate, RegisterRequest, ResetToken, Role, Session, User,
    RESET_TOKEN_TTL_MS,
};
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use std::sync::Arc;
use tracing::{debug, info, warn};

type HmacSha256 = Hmac<Sha256>;

/// PBKDF2 iterations for new hashes.
pub const DEFAULT_ROUNDS: u32 = 100_000;
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;
const TOKEN_LEN: usize = 32;
const HASH_SCHEME: &str = "pbkdf2_sha256";

pub const DEFAULT_ADMIN_USERNAME: &str = "admin";
pub const DEFAULT_ADMIN_PASSWORD: &str = "admin123";
const DEFAULT_ADMIN_EMAIL: &str = "admin@bfisignals.com";

const MIN_USERNAME_LEN: usize = 3;
const MIN_PASSWORD_LEN: usize = 6;

/// Hash a password as `pbkdf2_sha256$rounds$salt$hash` (hex fields).
pub fn hash_password(password: &str, rounds: u32) -> String {
    let mut salt = [0u8; SALT_LEN];
    rand::thread_rng().fill_bytes(&mut salt);

    let mut hash = [0u8; HASH_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, rounds, &mut hash);

    format!("{}${}${}${}", HASH_SCHEME, rounds, hex::encode(salt), hex::encode(hash))
}

/// Check a password against a stored hash.
pub fn verify_password(password: &str, stored: &str) -> bool {
    let parts: Vec<&str> = stored.split('$').collect();
    let [scheme, rounds, salt, expected] = parts.as_slice() else {
        return false;
    };
    if *scheme != HASH_SCHEME {
        return false;
    }

    let (Ok(rounds), Ok(salt), Ok(expected)) =
        (rounds.parse::<u32>(), hex::decode(salt), hex::decode(expected))
    else {
        return false;
    };
    if expected.len() != HASH_LEN {
        return false;
    }

    let mut hash = [0u8; HASH_LEN];
    pbkdf2::pbkdf2_hmac::<Sha256>(password.as_bytes(), &salt, rounds, &mut hash);

    // Constant-time comparison
    hash.iter()
        .zip(expected.iter())
        .fold(0u8, |acc, (a, b)| acc | (a ^ b))
        == 0
}

/// Random url-safe token (hex of 32 random bytes).
fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_LEN];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.len() < MIN_PASSWORD_LEN {
        return Err(AuthError::Validation(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

fn validate_username(username: &str) -> Result<(), AuthError> {
    let username = username.trim();
    if username.len() < MIN_USERNAME_LEN {
        return Err(AuthError::Validation(format!(
            "Username must be at least {} characters",
            MIN_USERNAME_LEN
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.')
    {
        return Err(AuthError::Validation(
            "Username may only contain letters, numbers, '.', '_' and '-'".to_string(),
        ));
    }
    Ok(())
}

fn validate_email(email: &str) -> Result<(), AuthError> {
    let email = email.trim();
    match email.split_once('@') {
        Some((local, domain)) if !local.is_empty() && domain.contains('.') => Ok(()),
        _ => Err(AuthError::Validation("Invalid email address".to_string())),
    }
}

/// Authentication service for accounts and sessions.
#[derive(Clone)]
pub struct AuthService {
    /// Active sessions (token_hash -> Session)
    sessions: Arc<DashMap<String, Session>>,
    store: Arc<SqliteStore>,
    /// Key for token hashing
    secret: Arc<Vec<u8>>,
    rounds: u32,
}

impl AuthService {
    pub fn new(store: Arc<SqliteStore>, secret: &str) -> Self {
        Self {
            sessions: Arc::new(DashMap::new()),
            store,
            secret: Arc::new(secret.as_bytes().to_vec()),
            rounds: DEFAULT_ROUNDS,
        }
    }

    /// Override PBKDF2 iterations for new hashes.
    pub fn with_rounds(mut self, rounds: u32) -> Self {
        self.rounds = rounds.max(1);
        self
    }

    /// Keyed hash of a bearer or reset token.
    pub fn hash_token(&self, token: &str) -> Result<String, AuthError> {
        let mut mac = HmacSha256::new_from_slice(&self.secret)
            .map_err(|e| AuthError::Internal(format!("Invalid session secret: {}", e)))?;
        mac.update(token.as_bytes());
        Ok(hex::encode(mac.finalize().into_bytes()))
    }

    fn load_user(&self, user_id: &str) -> Result<User, AuthError> {
        self.store.get_user(user_id)?.ok_or(AuthError::UserNotFound)
    }

    /// Create the default admin account when no `admin` user exists.
    pub fn ensure_default_admin(&self) -> Result<bool, AuthError> {
        if self.store.get_user_by_username(DEFAULT_ADMIN_USERNAME)?.is_some() {
            return Ok(false);
        }

        let mut admin = User::new(
            DEFAULT_ADMIN_USERNAME,
            DEFAULT_ADMIN_EMAIL,
            hash_password(DEFAULT_ADMIN_PASSWORD, self.rounds),
            Role::Admin,
        );
        admin.is_approved = true;
        admin.full_name = Some("Administrator".to_string());
        self.store.create_user(&admin)?;

        warn!(
            "Created default admin account '{}'; change its password",
            DEFAULT_ADMIN_USERNAME
        );
        Ok(true)
    }

    /// Register a new account. It stays unapproved until an admin approves it.
    pub fn register(&self, request: &RegisterRequest) -> Result<User, AuthError> {
        validate_username(&request.username)?;
        validate_email(&request.email)?;
        validate_password(&request.password)?;

        if self.store.username_taken(&request.username, "")? {
            return Err(AuthError::UsernameTaken);
        }
        if self.store.email_taken(&request.email, "")? {
            return Err(AuthError::EmailTaken);
        }

        let user = User::new(
            &request.username,
            &request.email,
            hash_password(&request.password, self.rounds),
            Role::User,
        );
        self.store.create_user(&user)?;

        info!("Registered user {} (pending approval)", user.username);
        Ok(user)
    }

    /// Authenticate by username (or email) and password.
    pub fn login(&self, request: &LoginRequest) -> Result<LoginResponse, AuthError> {
        let identifier = request.username.trim();
        let user = match self.store.get_user_by_username(identifier)? {
            Some(user) => Some(user),
            None if identifier.contains('@') => self.store.get_user_by_email(identifier)?,
            None => None,
        };

        let Some(mut user) = user else {
            warn!("Login attempt for unknown user {}", identifier);
            return Err(AuthError::InvalidCredentials);
        };

        if !verify_password(&request.password, &user.password_hash) {
            warn!("Invalid password for {}", user.username);
            return Err(AuthError::InvalidCredentials);
        }
        if !user.is_active {
            return Err(AuthError::Deactivated);
        }
        if !user.is_approved {
            return Err(AuthError::PendingApproval);
        }

        let token = generate_token();
        let session = Session::new(self.hash_token(&token)?, user.id.clone());
        self.store.save_session(&session)?;
        self.sessions.insert(session.token_hash.clone(), session.clone());

        user.last_login = Some(session.created_at);
        self.store.update_user(&user)?;

        info!("User {} logged in", user.username);
        Ok(LoginResponse {
            session_token: token,
            expires_at: session.expires_at,
            user,
        })
    }

    /// Invalidate a session token.
    pub fn logout(&self, token: &str) -> Result<(), AuthError> {
        let hash = self.hash_token(token)?;
        self.sessions.remove(&hash);
        self.store.delete_session(&hash)?;
        Ok(())
    }

    /// Resolve a bearer token to its active user.
    pub fn validate_session(&self, token: &str) -> Result<User, AuthError> {
        let hash = self.hash_token(token)?;

        // Clone out of the map before touching it again
        let cached = self.sessions.get(&hash).map(|s| s.clone());
        let session = match cached {
            Some(session) => session,
            None => {
                let session = self.store.get_session(&hash)?.ok_or(AuthError::SessionNotFound)?;
                self.sessions.insert(hash.clone(), session.clone());
                session
            }
        };

        if session.is_expired() {
            debug!("Evicting expired session for {}", session.user_id);
            self.sessions.remove(&hash);
            self.store.delete_session(&hash)?;
            return Err(AuthError::SessionNotFound);
        }

        let user = match self.store.get_user(&session.user_id)? {
            Some(user) if user.is_active => user,
            _ => {
                self.sessions.remove(&hash);
                return Err(AuthError::SessionNotFound);
            }
        };
        Ok(user)
    }

    fn invalidate_user_sessions(&self, user_id: &str) -> Result<usize, AuthError> {
        let hashes = self.store.delete_user_sessions(user_id)?;
        for hash in &hashes {
            self.sessions.remove(hash);
        }
        Ok(hashes.len())
    }

    /// Drop expired sessions from the store and cache.
    pub fn purge_expired_sessions(&self) -> Result<usize, AuthError> {
        let now = chrono::Utc::now().timestamp_millis();
        self.sessions.retain(|_, s| s.expires_at >= now);
        Ok(self.store.purge_expired_sessions(now)?)
    }

    // ========== Profile ==========

    /// Update profile fields, keeping username and email unique.
    pub fn update_profile(&self, user_id: &str, update: &ProfileUpdate) -> Result<User, AuthError> {
        if update.is_empty() {
            return Err(AuthError::Validation("No fields to update".to_string()));
        }

        let mut user = self.load_user(user_id)?;

        if let Some(username) = &update.username {
            validate_username(username)?;
            if self.store.username_taken(username, user_id)? {
                return Err(AuthError::UsernameTaken);
            }
            user.username = username.trim().to_string();
        }
        if let Some(email) = &update.email {
            validate_email(email)?;
            if self.store.email_taken(email, user_id)? {
                return Err(AuthError::EmailTaken);
            }
            user.email = email.trim().to_lowercase();
        }
        if let Some(full_name) = &update.full_name {
            let full_name = full_name.trim();
            user.full_name = (!full_name.is_empty()).then(|| full_name.to_string());
        }
        if let Some(timezone) = &update.timezone {
            user.timezone = timezone.trim().to_string();
        }

        self.store.update_user(&user)?;
        Ok(user)
    }

    /// Change password after verifying the current one.
    pub fn change_password(&self, user_id: &str, request: &ChangePasswordRequest) -> Result<(), AuthError> {
        let mut user = self.load_user(user_id)?;
        if !verify_password(&request.current_password, &user.password_hash) {
            return Err(AuthError::InvalidCredentials);
        }
        validate_password(&request.new_password)?;

        user.password_hash = hash_password(&request.new_password, self.rounds);
        self.store.update_user(&user)?;
        info!("Password changed for {}", user.username);
        Ok(())
    }

    pub fn update_preferences(
        &self,
        user_id: &str,
        preferences: NotificationPreferences,
    ) -> Result<User, AuthError> {
        let mut user = self.load_user(user_id)?;
        user.preferences = preferences;
        self.store.update_user(&user)?;
        Ok(user)
    }

    // ========== Admin ==========

    pub fn list_users(&self) -> Result<Vec<User>, AuthError> {
        Ok(self.store.list_users()?)
    }

    pub fn list_pending_users(&self) -> Result<Vec<User>, AuthError> {
        Ok(self.store.list_pending_users()?)
    }

    pub fn approve_user(&self, admin_id: &str, user_id: &str) -> Result<User, AuthError> {
        let mut user = self.load_user(user_id)?;
        user.is_approved = true;
        user.approved_by = Some(admin_id.to_string());
        self.store.update_user(&user)?;
        info!("User {} approved by {}", user.username, admin_id);
        Ok(user)
    }

    /// Reject a pending registration by deleting it.
    pub fn reject_user(&self, user_id: &str) -> Result<User, AuthError> {
        let user = self.load_user(user_id)?;
        if user.is_approved {
            return Err(AuthError::Validation("User is already approved".to_string()));
        }
        self.invalidate_user_sessions(user_id)?;
        self.store.delete_user(user_id)?;
        info!("Rejected registration for {}", user.username);
        Ok(user)
    }

    pub fn update_role(&self, admin_id: &str, user_id: &str, role: Role) -> Result<User, AuthError> {
        if admin_id == user_id && role != Role::Admin {
            return Err(AuthError::Validation("Cannot remove your own admin role".to_string()));
        }
        let mut user = self.load_user(user_id)?;
        user.role = role;
        self.store.update_user(&user)?;
        Ok(user)
    }

    /// Deactivate an account and end its sessions.
    pub fn deactivate_user(&self, admin_id: &str, user_id: &str) -> Result<User, AuthError> {
        if admin_id == user_id {
            return Err(AuthError::Validation("Cannot deactivate your own account".to_string()));
        }
        let mut user = self.load_user(user_id)?;
        user.is_active = false;
        self.store.update_user(&user)?;
        let ended = self.invalidate_user_sessions(user_id)?;
        info!("Deactivated {} ({} sessions ended)", user.username, ended);
        Ok(user)
    }

    pub fn reactivate_user(&self, user_id: &str) -> Result<User, AuthError> {
        let mut user = self.load_user(user_id)?;
        user.is_active = true;
        self.store.update_user(&user)?;
        Ok(user)
    }

    /// Create a pre-approved account.
    pub fn admin_create_user(&self, admin_id: &str, request: &AdminCreateUserRequest) -> Result<User, AuthError> {
        validate_username(&request.username)?;
        validate_email(&request.email)?;
        validate_password(&request.password)?;

        if self.store.username_taken(&request.username, "")? {
            return Err(AuthError::UsernameTaken);
        }
        if self.store.email_taken(&request.email, "")? {
            return Err(AuthError::EmailTaken);
        }

        let mut user = User::new(
            &request.username,
            &request.email,
            hash_password(&request.password, self.rounds),
            request.role,
        );
        user.is_approved = true;
        user.approved_by = Some(admin_id.to_string());
        self.store.create_user(&user)?;
        Ok(user)
    }

    /// Set a user's password and end their sessions.
    pub fn admin_reset_password(&self, user_id: &str, new_password: &str) -> Result<User, AuthError> {
        validate_password(new_password)?;
        let mut user = self.load_user(user_id)?;
        user.password_hash = hash_password(new_password, self.rounds);
        self.store.update_user(&user)?;
        self.invalidate_user_sessions(user_id)?;
        Ok(user)
    }

    // ========== Password Reset ==========

    /// Issue a reset token for an email or username.
    ///
    /// Returns None for unknown or inactive accounts so callers can answer
    /// the same way either way.
    pub fn request_password_reset(&self, identifier: &str) -> Result<Option<(User, String)>, AuthError> {
        let identifier = identifier.trim();
        let user = if identifier.contains('@') {
            self.store.get_user_by_email(identifier)?
        } else {
            self.store.get_user_by_username(identifier)?
        };

        let Some(user) = user.filter(|u| u.is_active) else {
            debug!("Password reset requested for unknown account");
            return Ok(None);
        };

        let token = generate_token();
        self.store.save_reset_token(&ResetToken {
            token_hash: self.hash_token(&token)?,
            user_id: user.id.clone(),
            expires_at: chrono::Utc::now().timestamp_millis() + RESET_TOKEN_TTL_MS,
            used: false,
        })?;

        info!("Password reset token issued for {}", user.username);
        Ok(Some((user, token)))
    }

    /// Consume a reset token and set the new password.
    pub fn confirm_password_reset(&self, token: &str, new_password: &str) -> Result<User, AuthError> {
        validate_password(new_password)?;

        let hash = self.hash_token(token)?;
        let reset = self
            .store
            .get_reset_token(&hash)?
            .filter(|t| t.is_valid())
            .ok_or(AuthError::InvalidResetToken)?;

        let mut user = self.load_user(&reset.user_id)?;
        user.password_hash = hash_password(new_password, self.rounds);
        self.store.update_user(&user)?;
        self.store.mark_reset_token_used(&hash)?;
        let ended = self.invalidate_user_sessions(&user.id)?;

        info!("Password reset for {} ({} sessions ended)", user.username, ended);
        Ok(user)
    }
}

/// Authentication errors.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Account is pending admin approval")]
    PendingApproval,

    #[error("Account has been deactivated")]
    Deactivated,

    #[error("Username already exists")]
    UsernameTaken,

    #[error("Email already exists")]
    EmailTaken,

    #[error("{0}")]
    Validation(String),

    #[error("Invalid or expired session")]
    SessionNotFound,

    #[error("User not found")]
    UserNotFound,

    #[error("Invalid or expired reset token")]
    InvalidResetToken,

    #[error("Unauthorized")]
    Unauthorized,

    #[error("Admin access required")]
    Forbidden,

    #[error("{0}")]
    Internal(String),

    #[error(transparent)]
    Store(#[from] AppError),
}

impl From<rusqlite::Error> for AuthError {
    fn from(e: rusqlite::Error) -> Self {
        AuthError::Store(AppError::Database(e))
    }
}

impl axum::response::IntoResponse for AuthError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match &self {
            AuthError::InvalidCredentials | AuthError::SessionNotFound | AuthError::Unauthorized => {
                StatusCode::UNAUTHORIZED
            }
            AuthError::PendingApproval | AuthError::Deactivated | AuthError::Forbidden => {
                StatusCode::FORBIDDEN
            }
            AuthError::UsernameTaken | AuthError::EmailTaken => StatusCode::CONFLICT,
            AuthError::Validation(_) | AuthError::InvalidResetToken => StatusCode::BAD_REQUEST,
            AuthError::UserNotFound => StatusCode::NOT_FOUND,
            AuthError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AuthError::Store(_) => {
                if let AuthError::Store(e) = self {
                    return e.into_response();
                }
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = axum::Json(serde_json::json!({
            "error": self.to_string(),
            "status": status.as_u16(),
        }));

        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_ROUNDS: u32 = 10;

    fn service() -> AuthService {
        let store = Arc::new(SqliteStore::new_in_memory().unwrap());
        AuthService::new(store, "test-secret").with_rounds(TEST_ROUNDS)
    }

    fn register(auth: &AuthService, username: &str) -> User {
        auth.register(&RegisterRequest {
            username: username.to_string(),
            email: format!("{}@example.com", username),
            password: "password1".to_string(),
        })
        .unwrap()
    }

    fn login(auth: &AuthService, username: &str, password: &str) -> Result<LoginResponse, AuthError> {
        auth.login(&LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        })
    }

    // =========================================================================
    // Passwords
    // =========================================================================

    #[test]
    fn test_password_hash_roundtrip() {
        let hash = hash_password("hunter22", TEST_ROUNDS);
        assert!(hash.starts_with("pbkdf2_sha256$10$"));
        assert!(verify_password("hunter22", &hash));
        assert!(!verify_password("hunter23", &hash));
        assert!(!verify_password("hunter22", "garbage"));

        // Random salt
        assert_ne!(hash, hash_password("hunter22", TEST_ROUNDS));
    }

    #[test]
    fn test_token_hash_is_keyed() {
        let a = service();
        let b = AuthService::new(Arc::new(SqliteStore::new_in_memory().unwrap()), "other");
        assert_eq!(a.hash_token("tok").unwrap(), a.hash_token("tok").unwrap());
        assert_ne!(a.hash_token("tok").unwrap(), b.hash_token("tok").unwrap());
    }

    // =========================================================================
    // Registration and login
    // =========================================================================

    #[test]
    fn test_default_admin_created_once() {
        let auth = service();
        assert!(auth.ensure_default_admin().unwrap());
        assert!(!auth.ensure_default_admin().unwrap());

        let response = login(&auth, "admin", "admin123").unwrap();
        assert!(response.user.is_admin());
        assert_eq!(response.session_token.len(), 64);
    }

    #[test]
    fn test_register_requires_approval() {
        let auth = service();
        auth.ensure_default_admin().unwrap();
        let user = register(&auth, "trader");
        assert!(!user.is_approved);

        assert!(matches!(
            login(&auth, "trader", "password1"),
            Err(AuthError::PendingApproval)
        ));
        assert!(matches!(
            login(&auth, "trader", "wrong"),
            Err(AuthError::InvalidCredentials)
        ));

        let admin = auth.store.get_user_by_username("admin").unwrap().unwrap();
        auth.approve_user(&admin.id, &user.id).unwrap();
        let response = login(&auth, "trader", "password1").unwrap();
        assert_eq!(response.user.approved_by.as_deref(), Some(admin.id.as_str()));
    }

    #[test]
    fn test_register_validation_and_uniqueness() {
        let auth = service();
        register(&auth, "trader");

        let dup = auth.register(&RegisterRequest {
            username: "TRADER".to_string(),
            email: "new@example.com".to_string(),
            password: "password1".to_string(),
        });
        assert!(matches!(dup, Err(AuthError::UsernameTaken)));

        let dup_email = auth.register(&RegisterRequest {
            username: "other".to_string(),
            email: "Trader@Example.com".to_string(),
            password: "password1".to_string(),
        });
        assert!(matches!(dup_email, Err(AuthError::EmailTaken)));

        let short = auth.register(&RegisterRequest {
            username: "ab".to_string(),
            email: "ab@example.com".to_string(),
            password: "password1".to_string(),
        });
        assert!(matches!(short, Err(AuthError::Validation(_))));
    }

    #[test]
    fn test_session_lifecycle() {
        let auth = service();
        auth.ensure_default_admin().unwrap();
        let response = login(&auth, "admin", "admin123").unwrap();
        let token = response.session_token;

        assert_eq!(auth.validate_session(&token).unwrap().username, "admin");

        // Survives a cold cache
        auth.sessions.clear();
        assert!(auth.validate_session(&token).is_ok());

        auth.logout(&token).unwrap();
        assert!(matches!(
            auth.validate_session(&token),
            Err(AuthError::SessionNotFound)
        ));
    }

    #[test]
    fn test_expired_session_is_evicted() {
        let auth = service();
        auth.ensure_default_admin().unwrap();
        let token = login(&auth, "admin", "admin123").unwrap().session_token;
        let hash = auth.hash_token(&token).unwrap();

        let mut session = auth.store.get_session(&hash).unwrap().unwrap();
        session.expires_at = 0;
        auth.store.save_session(&session).unwrap();
        auth.sessions.insert(hash.clone(), session);

        assert!(auth.validate_session(&token).is_err());
        assert!(auth.store.get_session(&hash).unwrap().is_none());
        assert!(!auth.sessions.contains_key(&hash));
    }

    #[test]
    fn test_deactivate_ends_sessions() {
        let auth = service();
        auth.ensure_default_admin().unwrap();
        let admin = auth.store.get_user_by_username("admin").unwrap().unwrap();
        let user = register(&auth, "trader");
        auth.approve_user(&admin.id, &user.id).unwrap();
        let token = login(&auth, "trader", "password1").unwrap().session_token;

        auth.deactivate_user(&admin.id, &user.id).unwrap();
        assert!(auth.validate_session(&token).is_err());
        assert!(matches!(
            login(&auth, "trader", "password1"),
            Err(AuthError::Deactivated)
        ));
        assert!(auth.deactivate_user(&admin.id, &admin.id).is_err());

        auth.reactivate_user(&user.id).unwrap();
        assert!(login(&auth, "trader", "password1").is_ok());
    }

    // =========================================================================
    // Profile and passwords
    // =========================================================================

    #[test]
    fn test_profile_update_uniqueness() {
        let auth = service();
        let a = register(&auth, "alice");
        register(&auth, "bobby");

        let clash = ProfileUpdate {
            username: Some("bobby".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            auth.update_profile(&a.id, &clash),
            Err(AuthError::UsernameTaken)
        ));

        let ok = ProfileUpdate {
            full_name: Some("Alice Smith".to_string()),
            timezone: Some("Africa/Johannesburg".to_string()),
            ..Default::default()
        };
        let user = auth.update_profile(&a.id, &ok).unwrap();
        assert_eq!(user.full_name.as_deref(), Some("Alice Smith"));
        assert_eq!(user.timezone, "Africa/Johannesburg");
    }

    #[test]
    fn test_change_password() {
        let auth = service();
        auth.ensure_default_admin().unwrap();
        let admin = auth.store.get_user_by_username("admin").unwrap().unwrap();

        let wrong = ChangePasswordRequest {
            current_password: "nope".to_string(),
            new_password: "newpass1".to_string(),
        };
        assert!(matches!(
            auth.change_password(&admin.id, &wrong),
            Err(AuthError::InvalidCredentials)
        ));

        let right = ChangePasswordRequest {
            current_password: "admin123".to_string(),
            new_password: "newpass1".to_string(),
        };
        auth.change_password(&admin.id, &right).unwrap();
        assert!(login(&auth, "admin", "newpass1").is_ok());
    }

    #[test]
    fn test_password_reset_single_use() {
        let auth = service();
        auth.ensure_default_admin().unwrap();
        let old_token = login(&auth, "admin", "admin123").unwrap().session_token;

        assert!(auth.request_password_reset("nobody@example.com").unwrap().is_none());

        let (user, token) = auth
            .request_password_reset("admin@bfisignals.com")
            .unwrap()
            .unwrap();
        assert_eq!(user.username, "admin");

        auth.confirm_password_reset(&token, "resetpass").unwrap();
        assert!(auth.validate_session(&old_token).is_err());
        assert!(login(&auth, "admin", "resetpass").is_ok());

        assert!(matches!(
            auth.confirm_password_reset(&token, "another1"),
            Err(AuthError::InvalidResetToken)
        ));
    }

    #[test]
    fn test_reject_deletes_pending_user() {
        let auth = service();
        let user = register(&auth, "pending");
        auth.reject_user(&user.id).unwrap();
        assert!(auth.store.get_user(&user.id).unwrap().is_none());
        assert!(matches!(auth.reject_user(&user.id), Err(AuthError::UserNotFound)));
    }
}
