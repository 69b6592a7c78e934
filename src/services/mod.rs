pub mod auth;
pub mod formatter;
pub mod journal;
pub mod learning;
pub mod market_clock;
pub mod notifier;
pub mod pipeline;
pub mod scheduler;
pub mod sentiment;
pub mod sqlite_store;
pub mod strategy;

pub use auth::{AuthError, AuthService};
pub use journal::JournalService;
pub use learning::LearningEngine;
pub use notifier::{DiscordNotifier, EmailService, NotificationManager, WhatsAppNotifier};
pub use sentiment::{KeywordAnalyzer, SentimentService};
pub use sqlite_store::SqliteStore;
