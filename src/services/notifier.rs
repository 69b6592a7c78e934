//! Outbound delivery: Discord webhook, WhatsApp providers, SMTP email and
//! in-app notifications.
//!
//! Senders report success as a bool and log failures; nothing here retries.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Context};
use lettre::message::{Mailbox, MultiPart};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use reqwest::{Client, StatusCode};
use serde_json::json;
use tracing::{debug, error, info, warn};

use crate::config::{Config, SmtpConfig, WhatsAppConfig, WhatsAppProvider};
use crate::error::Result;
use crate::services::formatter::{self, StatusKind};
use crate::services::SqliteStore;
use crate::types::{FormatOptions, Notification, NotificationType, Signal, User};

/// Discord's per-message character limit.
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;

const SEND_TIMEOUT: Duration = Duration::from_secs(30);
const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Split a message at line boundaries into chunks of at most `limit` chars.
pub fn split_message(content: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for line in content.split('\n') {
        let line_len = line.chars().count();

        if current_len > 0 && current_len + 1 + line_len > limit {
            chunks.push(std::mem::take(&mut current));
            current_len = 0;
        }

        if line_len > limit {
            // Hard-wrap a single oversized line
            let chars: Vec<char> = line.chars().collect();
            for piece in chars.chunks(limit) {
                if current_len > 0 {
                    chunks.push(std::mem::take(&mut current));
                }
                current = piece.iter().collect();
                current_len = piece.len();
            }
            continue;
        }

        if current_len > 0 {
            current.push('\n');
            current_len += 1;
        }
        current.push_str(line);
        current_len += line_len;
    }

    if !current.trim().is_empty() {
        chunks.push(current);
    }
    chunks
}

// ========== Discord ==========

/// Discord webhook client.
#[derive(Clone)]
pub struct DiscordNotifier {
    client: Client,
    webhook_url: Option<String>,
}

impl DiscordNotifier {
    pub fn new(webhook_url: Option<String>) -> Self {
        let client = Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self { client, webhook_url }
    }

    pub fn is_configured(&self) -> bool {
        self.webhook_url.is_some()
    }

    /// Post a message, split to fit Discord's limit. False on any failure.
    pub async fn send(&self, content: &str) -> bool {
        let Some(url) = &self.webhook_url else {
            warn!("Discord webhook URL not configured");
            return false;
        };

        let chunks = split_message(content, DISCORD_MESSAGE_LIMIT);
        if chunks.is_empty() {
            warn!("Refusing to send empty Discord message");
            return false;
        }

        for (i, chunk) in chunks.iter().enumerate() {
            let result = self
                .client
                .post(url)
                .timeout(SEND_TIMEOUT)
                .json(&json!({ "content": chunk }))
                .send()
                .await;

            match result {
                Ok(response) if response.status().is_success() => {
                    debug!("Discord chunk {}/{} delivered", i + 1, chunks.len());
                }
                Ok(response) => {
                    error!("Discord webhook returned {}", response.status());
                    return false;
                }
                Err(e) => {
                    error!("Failed to post to Discord: {}", e);
                    return false;
                }
            }
        }

        info!("Posted message to Discord ({} chunk(s))", chunks.len());
        true
    }

    pub async fn send_status(&self, message: &str, kind: StatusKind) -> bool {
        self.send(&formatter::format_status(message, kind)).await
    }

    /// Probe the webhook without posting a visible message.
    ///
    /// Discord answers an empty message with 400, which still proves the
    /// webhook exists.
    pub async fn test_connection(&self) -> bool {
        let Some(url) = &self.webhook_url else {
            warn!("Discord webhook URL not configured");
            return false;
        };

        let result = self
            .client
            .post(url)
            .timeout(PROBE_TIMEOUT)
            .json(&json!({ "content": "", "embeds": [] }))
            .send()
            .await;

        match result {
            Ok(response) => {
                let status = response.status();
                let ok = matches!(
                    status,
                    StatusCode::OK | StatusCode::NO_CONTENT | StatusCode::BAD_REQUEST
                );
                if ok {
                    info!("Discord connection test passed ({})", status);
                } else {
                    error!("Discord connection test failed: HTTP {}", status);
                }
                ok
            }
            Err(e) => {
                error!("Discord connection test failed: {}", e);
                false
            }
        }
    }
}

// ========== WhatsApp ==========

/// A provider-specific send request.
#[derive(Debug, Clone, PartialEq)]
pub struct WhatsAppRequest {
    pub url: String,
    pub bearer: Option<String>,
    pub body: serde_json::Value,
}

/// Build the request for the configured provider.
pub fn whatsapp_request(config: &WhatsAppConfig, message: &str) -> std::result::Result<WhatsAppRequest, String> {
    match config.provider {
        WhatsAppProvider::Green => {
            let (Some(instance), Some(token)) = (&config.green_instance_id, &config.green_token) else {
                return Err("GREEN API credentials not configured".to_string());
            };
            Ok(WhatsAppRequest {
                url: format!(
                    "https://api.green-api.com/waInstance{}/sendMessage/{}",
                    instance, token
                ),
                bearer: None,
                body: json!({ "chatId": config.recipient, "message": message }),
            })
        }
        WhatsAppProvider::Wassenger => {
            let (Some(key), Some(device)) = (&config.wassenger_api_key, &config.wassenger_device_id) else {
                return Err("Wassenger credentials not configured".to_string());
            };
            Ok(WhatsAppRequest {
                url: "https://api.wassenger.com/v1/messages".to_string(),
                bearer: Some(key.clone()),
                body: json!({
                    "device": device,
                    "recipient": config.recipient,
                    "type": "text",
                    "message": message,
                }),
            })
        }
        WhatsAppProvider::Whapi => {
            let Some(token) = &config.whapi_token else {
                return Err("Whapi token not configured".to_string());
            };
            Ok(WhatsAppRequest {
                url: "https://gate.whapi.cloud/messages/text".to_string(),
                bearer: Some(token.clone()),
                body: json!({ "to": config.recipient, "body": message }),
            })
        }
    }
}

/// WhatsApp delivery through one provider.
#[derive(Clone)]
pub struct WhatsAppNotifier {
    client: Client,
    config: WhatsAppConfig,
}

impl WhatsAppNotifier {
    pub fn new(config: WhatsAppConfig) -> Self {
        let client = Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .unwrap_or_default();

        Self { client, config }
    }

    pub fn provider(&self) -> WhatsAppProvider {
        self.config.provider
    }

    pub async fn send(&self, message: &str) -> bool {
        let request = match whatsapp_request(&self.config, message) {
            Ok(r) => r,
            Err(e) => {
                error!("{}", e);
                return false;
            }
        };

        let mut builder = self.client.post(&request.url).json(&request.body);
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token);
        }

        match builder.send().await {
            Ok(response) if response.status().is_success() => {
                info!("Sent WhatsApp message via {:?}", self.config.provider);
                true
            }
            Ok(response) => {
                error!("WhatsApp {:?} returned {}", self.config.provider, response.status());
                false
            }
            Err(e) => {
                error!("Failed to send WhatsApp message: {}", e);
                false
            }
        }
    }
}

// ========== Email ==========

/// Link to the reset page for a token.
pub fn reset_url(base_url: &str, token: &str) -> String {
    format!("{}/reset-password?token={}", base_url.trim_end_matches('/'), token)
}

/// Account emails over SMTP (STARTTLS).
#[derive(Clone)]
pub struct EmailService {
    config: SmtpConfig,
}

impl EmailService {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    pub fn is_configured(&self) -> bool {
        self.config.is_configured()
    }

    pub async fn send(&self, to: &str, subject: &str, html: String, text: String) -> anyhow::Result<()> {
        if !self.is_configured() {
            return Err(anyhow!("SMTP credentials not configured"));
        }

        let from = Mailbox::new(
            Some(self.config.from_name.clone()),
            self.config.from_email.parse().context("invalid FROM_EMAIL")?,
        );
        let to: Mailbox = to.parse().context("invalid recipient address")?;

        let email = Message::builder()
            .from(from)
            .to(to)
            .subject(subject)
            .multipart(MultiPart::alternative_plain_html(text, html))?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.server)?
            .port(self.config.port)
            .credentials(Credentials::new(
                self.config.username.clone(),
                self.config.password.clone(),
            ))
            .build();

        mailer.send(email).await?;
        info!("Sent '{}' email", subject);
        Ok(())
    }

    pub async fn send_password_reset(&self, user: &User, token: &str) -> anyhow::Result<()> {
        let url = reset_url(&self.config.base_url, token);

        let html = format!(
            "<h2>Password Reset Request</h2>\
             <p>Hello {name},</p>\
             <p>We received a request to reset the password for your BFI Signals account.</p>\
             <p><a href=\"{url}\">Reset My Password</a></p>\
             <ul><li>This link will expire in 24 hours</li>\
             <li>It can only be used once</li>\
             <li>Never share this link with anyone</li></ul>\
             <p>If the button doesn't work, paste this link into your browser:</p>\
             <p>{url}</p>\
             <p>If you didn't request this, you can ignore this email.</p>",
            name = user.username,
            url = url,
        );
        let text = format!(
            "Hello {},\n\nTo reset your password, please visit this link:\n{}\n\n\
             This link will expire in 24 hours.\n\n\
             If you didn't request this, you can ignore this email.",
            user.username, url
        );

        self.send(&user.email, "Password Reset - BFI Dashboard", html, text)
            .await
    }

    pub async fn send_account_approved(&self, user: &User) -> anyhow::Result<()> {
        let login_url = format!("{}/", self.config.base_url.trim_end_matches('/'));

        let html = format!(
            "<h2>Welcome to BFI Signals</h2>\
             <p>Hello {name},</p>\
             <p>Your account has been approved. You can now sign in:</p>\
             <p><a href=\"{url}\">{url}</a></p>",
            name = user.username,
            url = login_url,
        );
        let text = format!(
            "Hello {},\n\nYour BFI Signals account has been approved. You can now sign in at {}",
            user.username, login_url
        );

        self.send(&user.email, "Your BFI Signals account is approved", html, text)
            .await
    }
}

// ========== Manager ==========

/// Which channels accepted a broadcast.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryReport {
    pub discord: bool,
    pub whatsapp: bool,
}

impl DeliveryReport {
    pub fn any(&self) -> bool {
        self.discord || self.whatsapp
    }
}

/// Fans signals out to chat channels and records in-app notifications.
pub struct NotificationManager {
    store: Arc<SqliteStore>,
    discord: DiscordNotifier,
    whatsapp: Option<WhatsAppNotifier>,
    email: EmailService,
    use_simple_discord: bool,
}

impl NotificationManager {
    pub fn new(config: &Config, store: Arc<SqliteStore>) -> Self {
        Self {
            store,
            discord: DiscordNotifier::new(config.discord_webhook_url.clone()),
            whatsapp: config.whatsapp.clone().map(WhatsAppNotifier::new),
            email: EmailService::new(config.smtp.clone()),
            use_simple_discord: config.use_simple_discord,
        }
    }

    pub fn discord(&self) -> &DiscordNotifier {
        &self.discord
    }

    pub fn email(&self) -> &EmailService {
        &self.email
    }

    /// Discord message for a signal in the configured layout.
    pub fn discord_message(&self, signal: &Signal, options: &FormatOptions) -> String {
        if self.use_simple_discord {
            formatter::format_discord_simple(signal)
        } else {
            formatter::format_discord(signal, options)
        }
    }

    /// Post a signal to every configured channel.
    pub async fn broadcast_signal(&self, signal: &Signal, options: &FormatOptions) -> DeliveryReport {
        let mut report = DeliveryReport::default();

        if self.discord.is_configured() {
            report.discord = self.discord.send(&self.discord_message(signal, options)).await;
        }

        if let Some(whatsapp) = &self.whatsapp {
            report.whatsapp = whatsapp.send(&formatter::format_whatsapp(signal)).await;
        }

        if !report.any() {
            warn!("Signal for {} was not delivered to any channel", signal.symbol);
        }
        report
    }

    pub fn notify_user(
        &self,
        user_id: &str,
        kind: NotificationType,
        title: &str,
        message: Option<String>,
        signal_id: Option<i64>,
    ) -> Result<Notification> {
        let mut notification = Notification::new(user_id, kind, title, message);
        notification.signal_id = signal_id;
        self.store.insert_notification(&notification)?;
        Ok(notification)
    }

    /// Record a notification for every active admin.
    pub fn notify_admins(
        &self,
        kind: NotificationType,
        title: &str,
        message: Option<String>,
        signal_id: Option<i64>,
    ) -> Result<usize> {
        let admins = self.store.admin_ids()?;
        for admin_id in &admins {
            self.notify_user(admin_id, kind, title, message.clone(), signal_id)?;
        }
        Ok(admins.len())
    }
}
