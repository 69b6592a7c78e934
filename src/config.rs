use std::env;

/// WhatsApp delivery provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WhatsAppProvider {
    Green,
    Wassenger,
    Whapi,
}

impl WhatsAppProvider {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "green" | "green_api" | "greenapi" => Some(WhatsAppProvider::Green),
            "wassenger" => Some(WhatsAppProvider::Wassenger),
            "whapi" => Some(WhatsAppProvider::Whapi),
            _ => None,
        }
    }
}

/// WhatsApp provider credentials.
#[derive(Debug, Clone)]
pub struct WhatsAppConfig {
    pub provider: WhatsAppProvider,
    /// GREEN-API instance ID.
    pub green_instance_id: Option<String>,
    /// GREEN-API token.
    pub green_token: Option<String>,
    /// Wassenger API key.
    pub wassenger_api_key: Option<String>,
    /// Wassenger device ID.
    pub wassenger_device_id: Option<String>,
    /// Whapi.Cloud token.
    pub whapi_token: Option<String>,
    /// Chat ID or phone number that receives signals.
    pub recipient: String,
}

/// SMTP settings for account emails.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub server: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_email: String,
    pub from_name: String,
    /// Public base URL used in reset links.
    pub base_url: String,
}

impl SmtpConfig {
    /// SMTP is usable once credentials are present.
    pub fn is_configured(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }
}

/// LLM vendor API keys for sentiment analysis.
#[derive(Debug, Clone, Default)]
pub struct LlmConfig {
    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,
}

/// Daily job schedule (UTC).
#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub capture_hour: u32,
    pub capture_minute: u32,
    pub signal_hour: u32,
    pub signal_minute: u32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            capture_hour: 21,
            capture_minute: 5,
            signal_hour: 13,
            signal_minute: 0,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Server host address.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// SQLite database file.
    pub database_path: String,
    /// Directory for journal chart uploads.
    pub upload_dir: String,
    /// Secret used to hash session and reset tokens.
    pub session_secret: String,
    /// Symbols processed by the signal pipeline.
    pub trading_symbols: Vec<String>,
    /// Run news sentiment before posting signals.
    pub include_news_analysis: bool,
    /// Post the compact Discord format.
    pub use_simple_discord: bool,
    /// Discord webhook URL.
    pub discord_webhook_url: Option<String>,
    /// WhatsApp delivery (None when no provider is configured).
    pub whatsapp: Option<WhatsAppConfig>,
    pub smtp: SmtpConfig,
    pub llm: LlmConfig,
    pub scheduler: SchedulerConfig,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port: u16 = env::var("PORT")
            .ok()
            .and_then(|p| p.parse().ok())
            .unwrap_or(5000);

        let trading_symbols = parse_symbols(
            &env::var("TRADING_SYMBOLS").unwrap_or_else(|_| "^NDX".to_string()),
        );

        let smtp = SmtpConfig {
            server: env::var("SMTP_SERVER").unwrap_or_else(|_| "mail.bonangfinance.co.za".to_string()),
            port: env::var("SMTP_PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(587),
            username: env::var("SMTP_USERNAME").unwrap_or_default(),
            password: env::var("SMTP_PASSWORD").unwrap_or_default(),
            from_email: env::var("FROM_EMAIL").unwrap_or_else(|_| "noreply@bonangfinance.co.za".to_string()),
            from_name: env::var("FROM_NAME").unwrap_or_else(|_| "BFI Signals".to_string()),
            base_url: env::var("BASE_URL").unwrap_or_else(|_| format!("http://localhost:{}", port)),
        };

        let defaults = SchedulerConfig::default();
        let scheduler = SchedulerConfig {
            enabled: env_bool("SCHEDULER_ENABLED", defaults.enabled),
            capture_hour: env_u32("CAPTURE_HOUR_UTC", defaults.capture_hour),
            capture_minute: env_u32("CAPTURE_MINUTE_UTC", defaults.capture_minute),
            signal_hour: env_u32("SIGNAL_HOUR_UTC", defaults.signal_hour),
            signal_minute: env_u32("SIGNAL_MINUTE_UTC", defaults.signal_minute),
        };

        Self {
            host,
            port,
            database_path: env::var("DATABASE_PATH").unwrap_or_else(|_| "ai_learning.db".to_string()),
            upload_dir: env::var("UPLOAD_DIR").unwrap_or_else(|_| "uploads/charts".to_string()),
            session_secret: env::var("SESSION_SECRET")
                .unwrap_or_else(|_| "bfi-signals-dev-secret".to_string()),
            trading_symbols,
            include_news_analysis: env_bool("INCLUDE_NEWS_ANALYSIS", true),
            use_simple_discord: env_bool("USE_SIMPLE_DISCORD", false),
            discord_webhook_url: non_empty(env::var("DISCORD_WEBHOOK_URL").ok()),
            whatsapp: Self::whatsapp_from_env(),
            smtp,
            llm: LlmConfig {
                gemini_api_key: non_empty(env::var("GEMINI_API_KEY").ok()),
                openai_api_key: non_empty(env::var("OPENAI_API_KEY").ok()),
            },
            scheduler,
        }
    }

    fn whatsapp_from_env() -> Option<WhatsAppConfig> {
        let provider = WhatsAppProvider::from_str(&env::var("WHATSAPP_PROVIDER").ok()?)?;
        let recipient = non_empty(env::var("WHATSAPP_RECIPIENT").ok())?;

        Some(WhatsAppConfig {
            provider,
            green_instance_id: non_empty(env::var("GREEN_API_INSTANCE_ID").ok()),
            green_token: non_empty(env::var("GREEN_API_TOKEN").ok()),
            wassenger_api_key: non_empty(env::var("WASSENGER_API_KEY").ok()),
            wassenger_device_id: non_empty(env::var("WASSENGER_DEVICE_ID").ok()),
            whapi_token: non_empty(env::var("WHAPI_TOKEN").ok()),
            recipient,
        })
    }

    /// Configuration for tests: in-memory friendly, no outbound channels.
    pub fn for_tests() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 0,
            database_path: ":memory:".to_string(),
            upload_dir: std::env::temp_dir()
                .join("bfi-signals-test-uploads")
                .to_string_lossy()
                .into_owned(),
            session_secret: "test-secret".to_string(),
            trading_symbols: vec!["^NDX".to_string()],
            include_news_analysis: false,
            use_simple_discord: false,
            discord_webhook_url: None,
            whatsapp: None,
            smtp: SmtpConfig {
                server: "localhost".to_string(),
                port: 587,
                username: String::new(),
                password: String::new(),
                from_email: "noreply@example.com".to_string(),
                from_name: "BFI Signals".to_string(),
                base_url: "http://localhost:5000".to_string(),
            },
            llm: LlmConfig::default(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

/// Split a comma-separated symbol list, dropping blanks.
pub fn parse_symbols(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .collect()
}

fn env_bool(key: &str, default: bool) -> bool {
    env::var(key)
        .ok()
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "true" | "1" | "yes" | "on"))
        .unwrap_or(default)
}

fn env_u32(key: &str, default: u32) -> u32 {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_symbols() {
        assert_eq!(parse_symbols("^ndx, us30,,GC=F "), vec!["^NDX", "US30", "GC=F"]);
        assert!(parse_symbols(" , ").is_empty());
    }

    #[test]
    fn test_whatsapp_provider_from_str() {
        assert_eq!(WhatsAppProvider::from_str("GREEN"), Some(WhatsAppProvider::Green));
        assert_eq!(WhatsAppProvider::from_str("wassenger"), Some(WhatsAppProvider::Wassenger));
        assert_eq!(WhatsAppProvider::from_str(" whapi "), Some(WhatsAppProvider::Whapi));
        assert_eq!(WhatsAppProvider::from_str("telegram"), None);
    }

    #[test]
    fn test_smtp_is_configured() {
        let mut smtp = Config::for_tests().smtp;
        assert!(!smtp.is_configured());
        smtp.username = "user".to_string();
        smtp.password = "pass".to_string();
        assert!(smtp.is_configured());
    }
}
