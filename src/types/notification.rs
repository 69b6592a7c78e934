//! Notification types for the notification system.

use serde::{Deserialize, Serialize};

/// Notification type categories.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum NotificationType {
    Signal,
    System,
    Security,
    Success,
    Error,
    Warning,
    Info,
}

impl NotificationType {
    pub fn as_str(&self) -> &str {
        match self {
            NotificationType::Signal => "signal",
            NotificationType::System => "system",
            NotificationType::Security => "security",
            NotificationType::Success => "success",
            NotificationType::Error => "error",
            NotificationType::Warning => "warning",
            NotificationType::Info => "info",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "signal" => NotificationType::Signal,
            "system" => NotificationType::System,
            "security" => NotificationType::Security,
            "success" => NotificationType::Success,
            "error" => NotificationType::Error,
            "warning" => NotificationType::Warning,
            _ => NotificationType::Info,
        }
    }
}

/// A notification record stored in the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    /// Owning user ID
    pub user_id: String,
    #[serde(rename = "type")]
    pub notification_type: NotificationType,
    pub title: String,
    pub message: Option<String>,
    /// Related signal row, for signal notifications
    pub signal_id: Option<i64>,
    pub read: bool,
    /// Timestamp in milliseconds
    pub timestamp: i64,
}

impl Notification {
    pub fn new(
        user_id: &str,
        notification_type: NotificationType,
        title: impl Into<String>,
        message: Option<String>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            notification_type,
            title: title.into(),
            message,
            signal_id: None,
            read: false,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// Paginated notification list response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationListResponse {
    pub notifications: Vec<Notification>,
    pub total: i64,
    /// Current page (1-indexed)
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    pub unread_count: i64,
}

/// Query parameters for listing notifications.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationQuery {
    /// Page number (1-indexed, default 1)
    pub page: Option<i64>,
    /// Page size (default 20, max 100)
    pub page_size: Option<i64>,
    pub unread_only: Option<bool>,
}
