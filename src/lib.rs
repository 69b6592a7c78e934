//! BFI Signals - Hybrid Math trading signal dashboard

pub mod api;
pub mod config;
pub mod error;
pub mod services;
pub mod sources;
pub mod types;

use std::sync::Arc;

use config::Config;
use services::{
    auth, AuthService, JournalService, LearningEngine, NotificationManager, SentimentService,
    SqliteStore,
};
use sources::MarketDataService;

/// Application state shared across handlers and background jobs.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<SqliteStore>,
    pub auth: Arc<AuthService>,
    pub journal: Arc<JournalService>,
    pub market: Arc<MarketDataService>,
    pub sentiment: Arc<SentimentService>,
    pub learning: Arc<LearningEngine>,
    pub notifier: Arc<NotificationManager>,
    /// Serializes pipeline runs (scheduler and API).
    pub pipeline_lock: Arc<tokio::sync::Mutex<()>>,
}

impl AppState {
    /// Open the configured database and wire up services.
    pub fn new(config: Config) -> error::Result<Self> {
        let store = Arc::new(SqliteStore::new(&config.database_path)?);
        Ok(Self::with_store(config, store, auth::DEFAULT_ROUNDS))
    }

    /// In-memory state with cheap password hashing.
    pub fn for_tests(config: Config) -> error::Result<Self> {
        let store = Arc::new(SqliteStore::new_in_memory()?);
        Ok(Self::with_store(config, store, 10))
    }

    fn with_store(config: Config, store: Arc<SqliteStore>, rounds: u32) -> Self {
        let auth = AuthService::new(store.clone(), &config.session_secret).with_rounds(rounds);

        Self {
            auth: Arc::new(auth),
            journal: Arc::new(JournalService::new(store.clone(), config.upload_dir.clone())),
            market: Arc::new(MarketDataService::new()),
            sentiment: Arc::new(SentimentService::new(&config.llm)),
            learning: Arc::new(LearningEngine::new(store.clone())),
            notifier: Arc::new(NotificationManager::new(&config, store.clone())),
            pipeline_lock: Arc::new(tokio::sync::Mutex::new(())),
            store,
            config: Arc::new(config),
        }
    }
}
