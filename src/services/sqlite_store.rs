//! SQLite persistence layer.
//!
//! One connection behind a mutex holds every table the dashboard uses:
//! - Accounts, sessions and reset tokens
//! - Per-user notifications and journal entries
//! - Signal history, news sentiment and learned patterns
//! - Daily market close captures

use crate::error::{AppError, Result};
use crate::types::{
    JournalEntry, JournalQuery, LearnedPattern, MarketClose, Notification, NotificationPreferences,
    NotificationQuery, NotificationType, ResetToken, Role, SentimentResult, Session, Signal,
    SignalOutcome, SignalRecord, RiskLevel, TradeOutcome, User,
};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension, Row};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use tracing::{debug, info, warn};

const USER_COLUMNS: &str = "id, username, email, password_hash, role, is_active, is_approved,
    full_name, timezone, preferences_json, created_at, last_login, approved_by";

const JOURNAL_COLUMNS: &str = "id, user_id, symbol, trade_type, entry_price, exit_price, quantity,
    outcome, profit_loss, trade_date, entry_time, exit_time, notes, chart_image_path,
    created_at, updated_at";

const SIGNAL_COLUMNS: &str = "id, symbol, bias, probability, risk_level, outcome, profit_loss,
    news_hash, posted, signal_json, created_at";

/// Fields written when a signal is recorded.
#[derive(Debug, Clone)]
pub struct NewSignalRecord<'a> {
    pub signal: &'a Signal,
    pub risk_level: RiskLevel,
    pub news_hash: Option<&'a str>,
    pub created_at: i64,
}

/// SQLite store for all persistent dashboard data.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Create a new SQLite store at the given path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self> {
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        info!("SQLite store initialized");
        Ok(store)
    }

    /// Create an in-memory SQLite store (for testing).
    pub fn new_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        debug!("In-memory SQLite store initialized");
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| AppError::Internal("Database lock poisoned".to_string()))
    }

    /// Initialize database schema.
    fn init_schema(&self) -> Result<()> {
        let conn = self.conn()?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS users (
                id TEXT PRIMARY KEY,
                username TEXT NOT NULL UNIQUE COLLATE NOCASE,
                email TEXT NOT NULL UNIQUE COLLATE NOCASE,
                password_hash TEXT NOT NULL,
                role TEXT NOT NULL DEFAULT 'user',
                is_active INTEGER NOT NULL DEFAULT 1,
                is_approved INTEGER NOT NULL DEFAULT 0,
                full_name TEXT,
                timezone TEXT NOT NULL DEFAULT 'UTC',
                preferences_json TEXT NOT NULL DEFAULT '{}',
                created_at INTEGER NOT NULL,
                last_login INTEGER,
                approved_by TEXT
            );

            CREATE TABLE IF NOT EXISTS sessions (
                token_hash TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                created_at INTEGER NOT NULL,
                expires_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_user ON sessions(user_id);

            CREATE TABLE IF NOT EXISTS reset_tokens (
                token_hash TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                expires_at INTEGER NOT NULL,
                used INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS notifications (
                id TEXT PRIMARY KEY,
                user_id TEXT NOT NULL,
                type TEXT NOT NULL,
                title TEXT NOT NULL,
                message TEXT,
                signal_id INTEGER,
                read INTEGER NOT NULL DEFAULT 0,
                timestamp INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_notifications_user
                ON notifications(user_id, timestamp DESC);

            CREATE TABLE IF NOT EXISTS manual_journal_entries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id TEXT NOT NULL,
                symbol TEXT NOT NULL,
                trade_type TEXT NOT NULL,
                entry_price REAL NOT NULL,
                exit_price REAL,
                quantity INTEGER NOT NULL DEFAULT 1,
                outcome TEXT NOT NULL DEFAULT 'PENDING',
                profit_loss REAL NOT NULL DEFAULT 0,
                trade_date TEXT,
                entry_time TEXT,
                exit_time TEXT,
                notes TEXT NOT NULL DEFAULT '',
                chart_image_path TEXT,
                created_at INTEGER NOT NULL,
                updated_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_journal_user ON manual_journal_entries(user_id);

            CREATE TABLE IF NOT EXISTS signal_performance (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                bias TEXT NOT NULL,
                probability INTEGER NOT NULL,
                risk_level TEXT NOT NULL,
                outcome TEXT NOT NULL DEFAULT 'pending',
                profit_loss REAL,
                news_hash TEXT,
                posted INTEGER NOT NULL DEFAULT 0,
                signal_json TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );
            CREATE INDEX IF NOT EXISTS idx_signals_symbol
                ON signal_performance(symbol, created_at DESC);

            CREATE TABLE IF NOT EXISTS news_sentiment (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                symbol TEXT NOT NULL,
                news_hash TEXT,
                score REAL NOT NULL,
                label TEXT NOT NULL,
                confidence REAL NOT NULL,
                model_used TEXT NOT NULL,
                article_count INTEGER NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS learned_patterns (
                pattern_key TEXT PRIMARY KEY,
                success_rate REAL NOT NULL,
                usage_count INTEGER NOT NULL,
                last_updated INTEGER NOT NULL
            );

            CREATE TABLE IF NOT EXISTS market_close (
                date TEXT NOT NULL,
                instrument TEXT NOT NULL,
                price REAL NOT NULL,
                previous_close REAL NOT NULL,
                change REAL NOT NULL,
                change_percent REAL NOT NULL,
                captured_at INTEGER NOT NULL,
                PRIMARY KEY (date, instrument)
            );

            CREATE TABLE IF NOT EXISTS scheduler_runs (
                job TEXT NOT NULL,
                date TEXT NOT NULL,
                started_at INTEGER NOT NULL,
                PRIMARY KEY (job, date)
            );",
        )?;

        info!("SQLite schema initialized");
        Ok(())
    }

    // ========== User Methods ==========

    /// Insert a new user. Duplicate username or email is a conflict.
    pub fn create_user(&self, user: &User) -> Result<()> {
        let conn = self.conn()?;
        let preferences_json = serde_json::to_string(&user.preferences)?;

        let result = conn.execute(
            "INSERT INTO users (id, username, email, password_hash, role, is_active, is_approved,
                full_name, timezone, preferences_json, created_at, last_login, approved_by)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
            params![
                user.id,
                user.username,
                user.email,
                user.password_hash,
                user.role.as_str(),
                user.is_active,
                user.is_approved,
                user.full_name,
                user.timezone,
                preferences_json,
                user.created_at,
                user.last_login,
                user.approved_by,
            ],
        );

        match result {
            Ok(_) => {
                debug!("Created user {}", user.username);
                Ok(())
            }
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => Err(
                AppError::Conflict("Username or email already exists".to_string()),
            ),
            Err(e) => Err(e.into()),
        }
    }

    /// Persist every mutable user field.
    pub fn update_user(&self, user: &User) -> Result<()> {
        let conn = self.conn()?;
        let preferences_json = serde_json::to_string(&user.preferences)?;

        let result = conn.execute(
            "UPDATE users SET username = ?2, email = ?3, password_hash = ?4, role = ?5,
                is_active = ?6, is_approved = ?7, full_name = ?8, timezone = ?9,
                preferences_json = ?10, last_login = ?11, approved_by = ?12
             WHERE id = ?1",
            params![
                user.id,
                user.username,
                user.email,
                user.password_hash,
                user.role.as_str(),
                user.is_active,
                user.is_approved,
                user.full_name,
                user.timezone,
                preferences_json,
                user.last_login,
                user.approved_by,
            ],
        );

        match result {
            Ok(0) => Err(AppError::NotFound("User not found".to_string())),
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => Err(
                AppError::Conflict("Username or email already exists".to_string()),
            ),
            Err(e) => Err(e.into()),
        }
    }

    pub fn get_user(&self, id: &str) -> Result<Option<User>> {
        self.query_user("id = ?1", id)
    }

    /// Case-insensitive username lookup.
    pub fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        self.query_user("username = ?1", username.trim())
    }

    /// Case-insensitive email lookup.
    pub fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        self.query_user("email = ?1", email.trim())
    }

    fn query_user(&self, condition: &str, value: &str) -> Result<Option<User>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM users WHERE {}", USER_COLUMNS, condition);
        let user = conn.query_row(&sql, params![value], user_from_row).optional()?;
        Ok(user)
    }

    /// All users, newest first.
    pub fn list_users(&self) -> Result<Vec<User>> {
        self.query_users("1 = 1")
    }

    /// Active accounts waiting for approval.
    pub fn list_pending_users(&self) -> Result<Vec<User>> {
        self.query_users("is_approved = 0 AND is_active = 1")
    }

    /// IDs of active admins.
    pub fn admin_ids(&self) -> Result<Vec<String>> {
        Ok(self
            .query_users("role = 'admin' AND is_active = 1")?
            .into_iter()
            .map(|u| u.id)
            .collect())
    }

    fn query_users(&self, condition: &str) -> Result<Vec<User>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM users WHERE {} ORDER BY created_at DESC",
            USER_COLUMNS, condition
        );
        let mut stmt = conn.prepare(&sql)?;
        let users = stmt
            .query_map([], user_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(users)
    }

    /// Whether another account already uses `username`.
    pub fn username_taken(&self, username: &str, exclude_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE username = ?1 AND id != ?2",
            params![username.trim(), exclude_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Whether another account already uses `email`.
    pub fn email_taken(&self, email: &str, exclude_id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE email = ?1 AND id != ?2",
            params![email.trim(), exclude_id],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Delete a user with their sessions and notifications.
    pub fn delete_user(&self, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        conn.execute("DELETE FROM sessions WHERE user_id = ?1", params![id])?;
        conn.execute("DELETE FROM reset_tokens WHERE user_id = ?1", params![id])?;
        conn.execute("DELETE FROM notifications WHERE user_id = ?1", params![id])?;
        let deleted = conn.execute("DELETE FROM users WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    pub fn user_count(&self) -> Result<i64> {
        let conn = self.conn()?;
        Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?)
    }

    // ========== Session Methods ==========

    pub fn save_session(&self, session: &Session) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO sessions (token_hash, user_id, created_at, expires_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![session.token_hash, session.user_id, session.created_at, session.expires_at],
        )?;
        Ok(())
    }

    pub fn get_session(&self, token_hash: &str) -> Result<Option<Session>> {
        let conn = self.conn()?;
        let session = conn
            .query_row(
                "SELECT token_hash, user_id, created_at, expires_at FROM sessions WHERE token_hash = ?1",
                params![token_hash],
                |row| {
                    Ok(Session {
                        token_hash: row.get(0)?,
                        user_id: row.get(1)?,
                        created_at: row.get(2)?,
                        expires_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(session)
    }

    pub fn delete_session(&self, token_hash: &str) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM sessions WHERE token_hash = ?1", params![token_hash])?;
        Ok(deleted > 0)
    }

    /// Remove every session of a user, returning their hashes.
    pub fn delete_user_sessions(&self, user_id: &str) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT token_hash FROM sessions WHERE user_id = ?1")?;
        let hashes = stmt
            .query_map(params![user_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        conn.execute("DELETE FROM sessions WHERE user_id = ?1", params![user_id])?;
        Ok(hashes)
    }

    /// Drop sessions that expired before `now` (ms).
    pub fn purge_expired_sessions(&self, now: i64) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM sessions WHERE expires_at < ?1", params![now])?;
        if deleted > 0 {
            info!("Purged {} expired sessions", deleted);
        }
        Ok(deleted)
    }

    // ========== Reset Token Methods ==========

    pub fn save_reset_token(&self, token: &ResetToken) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO reset_tokens (token_hash, user_id, expires_at, used)
             VALUES (?1, ?2, ?3, ?4)",
            params![token.token_hash, token.user_id, token.expires_at, token.used],
        )?;
        Ok(())
    }

    pub fn get_reset_token(&self, token_hash: &str) -> Result<Option<ResetToken>> {
        let conn = self.conn()?;
        let token = conn
            .query_row(
                "SELECT token_hash, user_id, expires_at, used FROM reset_tokens WHERE token_hash = ?1",
                params![token_hash],
                |row| {
                    Ok(ResetToken {
                        token_hash: row.get(0)?,
                        user_id: row.get(1)?,
                        expires_at: row.get(2)?,
                        used: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(token)
    }

    pub fn mark_reset_token_used(&self, token_hash: &str) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE reset_tokens SET used = 1 WHERE token_hash = ?1",
            params![token_hash],
        )?;
        Ok(())
    }

    // ========== Notification Methods ==========

    pub fn insert_notification(&self, notification: &Notification) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO notifications (id, user_id, type, title, message, signal_id, read, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                notification.id,
                notification.user_id,
                notification.notification_type.as_str(),
                notification.title,
                notification.message,
                notification.signal_id,
                notification.read,
                notification.timestamp,
            ],
        )?;
        Ok(())
    }

    /// One page of a user's notifications (newest first) and the filtered total.
    pub fn list_notifications(
        &self,
        user_id: &str,
        query: &NotificationQuery,
    ) -> Result<(Vec<Notification>, i64)> {
        let conn = self.conn()?;
        let unread_only = query.unread_only.unwrap_or(false);
        let page = query.page.unwrap_or(1).max(1);
        let page_size = query.page_size.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * page_size;

        let total: i64 = conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND (?2 = 0 OR read = 0)",
            params![user_id, unread_only],
            |row| row.get(0),
        )?;

        let mut stmt = conn.prepare(
            "SELECT id, user_id, type, title, message, signal_id, read, timestamp
             FROM notifications
             WHERE user_id = ?1 AND (?2 = 0 OR read = 0)
             ORDER BY timestamp DESC
             LIMIT ?3 OFFSET ?4",
        )?;
        let notifications = stmt
            .query_map(params![user_id, unread_only, page_size, offset], |row| {
                let type_str: String = row.get(2)?;
                Ok(Notification {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    notification_type: NotificationType::from_str(&type_str),
                    title: row.get(3)?,
                    message: row.get(4)?,
                    signal_id: row.get(5)?,
                    read: row.get(6)?,
                    timestamp: row.get(7)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok((notifications, total))
    }

    pub fn unread_count(&self, user_id: &str) -> Result<i64> {
        let conn = self.conn()?;
        Ok(conn.query_row(
            "SELECT COUNT(*) FROM notifications WHERE user_id = ?1 AND read = 0",
            params![user_id],
            |row| row.get(0),
        )?)
    }

    /// Mark one notification read. False when it does not belong to the user.
    pub fn mark_notification_read(&self, user_id: &str, id: &str) -> Result<bool> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE notifications SET read = 1 WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(updated > 0)
    }

    pub fn mark_all_notifications_read(&self, user_id: &str) -> Result<usize> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE notifications SET read = 1 WHERE user_id = ?1 AND read = 0",
            params![user_id],
        )?;
        Ok(updated)
    }

    // ========== Journal Methods ==========

    /// Insert an entry, returning its row id.
    pub fn insert_journal_entry(&self, entry: &JournalEntry) -> Result<i64> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO manual_journal_entries (user_id, symbol, trade_type, entry_price,
                exit_price, quantity, outcome, profit_loss, trade_date, entry_time, exit_time,
                notes, chart_image_path, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
            params![
                entry.user_id,
                entry.symbol,
                entry.trade_type,
                entry.entry_price,
                entry.exit_price,
                entry.quantity,
                entry.outcome.as_str(),
                entry.profit_loss,
                entry.trade_date,
                entry.entry_time,
                entry.exit_time,
                entry.notes,
                entry.chart_image_path,
                entry.created_at,
                entry.updated_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn get_journal_entry(&self, user_id: &str, id: i64) -> Result<Option<JournalEntry>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM manual_journal_entries WHERE id = ?1 AND user_id = ?2",
            JOURNAL_COLUMNS
        );
        let entry = conn
            .query_row(&sql, params![id, user_id], journal_from_row)
            .optional()?;
        Ok(entry)
    }

    /// A user's entries, newest trade date first.
    pub fn list_journal_entries(&self, user_id: &str, query: &JournalQuery) -> Result<Vec<JournalEntry>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM manual_journal_entries
             WHERE user_id = ?1
               AND (?2 IS NULL OR symbol = ?2)
               AND (?3 IS NULL OR outcome = ?3)
             ORDER BY trade_date DESC, created_at DESC, id DESC
             LIMIT ?4 OFFSET ?5",
            JOURNAL_COLUMNS
        );

        let symbol = query.symbol.as_ref().map(|s| s.trim().to_uppercase());
        let outcome = query.outcome.map(|o| o.as_str());
        let limit = query.limit.unwrap_or(-1);
        let offset = query.offset.unwrap_or(0).max(0);

        let mut stmt = conn.prepare(&sql)?;
        let entries = stmt
            .query_map(params![user_id, symbol, outcome, limit, offset], journal_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Replace an entry's editable fields. False when missing.
    pub fn update_journal_entry(&self, entry: &JournalEntry) -> Result<bool> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE manual_journal_entries SET symbol = ?3, trade_type = ?4, entry_price = ?5,
                exit_price = ?6, quantity = ?7, outcome = ?8, profit_loss = ?9, trade_date = ?10,
                entry_time = ?11, exit_time = ?12, notes = ?13, chart_image_path = ?14,
                updated_at = ?15
             WHERE id = ?1 AND user_id = ?2",
            params![
                entry.id,
                entry.user_id,
                entry.symbol,
                entry.trade_type,
                entry.entry_price,
                entry.exit_price,
                entry.quantity,
                entry.outcome.as_str(),
                entry.profit_loss,
                entry.trade_date,
                entry.entry_time,
                entry.exit_time,
                entry.notes,
                entry.chart_image_path,
                entry.updated_at,
            ],
        )?;
        Ok(updated > 0)
    }

    pub fn delete_journal_entry(&self, user_id: &str, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute(
            "DELETE FROM manual_journal_entries WHERE id = ?1 AND user_id = ?2",
            params![id, user_id],
        )?;
        Ok(deleted > 0)
    }

    // ========== Signal Methods ==========

    /// Record a generated signal, returning its row id.
    pub fn insert_signal(&self, record: &NewSignalRecord<'_>) -> Result<i64> {
        let conn = self.conn()?;
        let signal_json = serde_json::to_string(record.signal)?;
        conn.execute(
            "INSERT INTO signal_performance (symbol, bias, probability, risk_level, outcome,
                news_hash, posted, signal_json, created_at)
             VALUES (?1, ?2, ?3, ?4, 'pending', ?5, 0, ?6, ?7)",
            params![
                record.signal.symbol,
                record.signal.bias.as_str(),
                record.signal.probability_percentage,
                record.risk_level.as_str(),
                record.news_hash,
                signal_json,
                record.created_at,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    pub fn set_signal_posted(&self, id: i64, posted: bool) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "UPDATE signal_performance SET posted = ?2 WHERE id = ?1",
            params![id, posted],
        )?;
        Ok(())
    }

    pub fn get_signal(&self, id: i64) -> Result<Option<SignalRecord>> {
        let conn = self.conn()?;
        let sql = format!("SELECT {} FROM signal_performance WHERE id = ?1", SIGNAL_COLUMNS);
        let record = conn.query_row(&sql, params![id], signal_from_row).optional()?;
        Ok(record)
    }

    /// Latest signals, optionally for one symbol.
    pub fn list_signals(&self, symbol: Option<&str>, limit: i64) -> Result<Vec<SignalRecord>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM signal_performance
             WHERE (?1 IS NULL OR symbol = ?1)
             ORDER BY created_at DESC, id DESC
             LIMIT ?2",
            SIGNAL_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params![symbol, limit], signal_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    /// Signals created after `since` (ms).
    pub fn signals_since(&self, since: i64) -> Result<Vec<SignalRecord>> {
        let conn = self.conn()?;
        let sql = format!(
            "SELECT {} FROM signal_performance WHERE created_at > ?1 ORDER BY created_at DESC, id DESC",
            SIGNAL_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let records = stmt
            .query_map(params![since], signal_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(records)
    }

    pub fn delete_signal(&self, id: i64) -> Result<bool> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM signal_performance WHERE id = ?1", params![id])?;
        Ok(deleted > 0)
    }

    /// Record an outcome. False when the signal does not exist.
    pub fn set_signal_outcome(&self, id: i64, outcome: SignalOutcome, profit_loss: Option<f64>) -> Result<bool> {
        let conn = self.conn()?;
        let updated = conn.execute(
            "UPDATE signal_performance SET outcome = ?2, profit_loss = ?3 WHERE id = ?1",
            params![id, outcome.as_str(), profit_loss],
        )?;
        Ok(updated > 0)
    }

    /// Decided outcomes for a symbol since `since` (ms), newest first.
    ///
    /// `bias` narrows to one direction; `limit` of None returns all rows.
    pub fn completed_outcomes(
        &self,
        symbol: &str,
        bias: Option<&str>,
        since: i64,
        limit: Option<i64>,
    ) -> Result<Vec<(SignalOutcome, Option<f64>)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT outcome, profit_loss FROM signal_performance
             WHERE symbol = ?1
               AND (?2 IS NULL OR bias = ?2)
               AND created_at > ?3
               AND outcome != 'pending'
             ORDER BY created_at DESC, id DESC
             LIMIT ?4",
        )?;
        let rows = stmt
            .query_map(params![symbol, bias, since, limit.unwrap_or(-1)], |row| {
                let outcome: String = row.get(0)?;
                Ok((SignalOutcome::from_str(&outcome), row.get(1)?))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ========== Sentiment & Pattern Methods ==========

    pub fn insert_news_sentiment(&self, symbol: &str, result: &SentimentResult, created_at: i64) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO news_sentiment (symbol, news_hash, score, label, confidence, model_used,
                article_count, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                symbol,
                result.news_hash,
                result.score,
                result.label.as_str(),
                result.confidence,
                result.model.as_str(),
                result.article_count as i64,
                created_at,
            ],
        )?;
        Ok(())
    }

    /// Sentiment rows per model.
    pub fn model_usage(&self) -> Result<Vec<(String, i64)>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT model_used, COUNT(*) FROM news_sentiment GROUP BY model_used ORDER BY model_used",
        )?;
        let rows = stmt
            .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn get_pattern(&self, pattern_key: &str) -> Result<Option<LearnedPattern>> {
        let conn = self.conn()?;
        let pattern = conn
            .query_row(
                "SELECT pattern_key, success_rate, usage_count, last_updated
                 FROM learned_patterns WHERE pattern_key = ?1",
                params![pattern_key],
                pattern_from_row,
            )
            .optional()?;
        Ok(pattern)
    }

    pub fn save_pattern(&self, pattern: &LearnedPattern) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO learned_patterns (pattern_key, success_rate, usage_count, last_updated)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(pattern_key) DO UPDATE SET
                success_rate = excluded.success_rate,
                usage_count = excluded.usage_count,
                last_updated = excluded.last_updated",
            params![
                pattern.pattern_key,
                pattern.success_rate,
                pattern.usage_count,
                pattern.last_updated,
            ],
        )?;
        Ok(())
    }

    pub fn list_patterns(&self) -> Result<Vec<LearnedPattern>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT pattern_key, success_rate, usage_count, last_updated
             FROM learned_patterns ORDER BY usage_count DESC, pattern_key",
        )?;
        let rows = stmt
            .query_map([], pattern_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ========== Market Close Methods ==========

    /// Save a close; a second capture on the same date replaces the first.
    pub fn save_market_close(&self, close: &MarketClose) -> Result<()> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT OR REPLACE INTO market_close (date, instrument, price, previous_close, change,
                change_percent, captured_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                close.date,
                close.instrument,
                close.price,
                close.previous_close,
                close.change,
                close.change_percent,
                close.captured_at,
            ],
        )?;
        Ok(())
    }

    /// Latest captures, newest date first.
    pub fn list_market_closes(&self, limit: i64) -> Result<Vec<MarketClose>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT date, instrument, price, previous_close, change, change_percent, captured_at
             FROM market_close ORDER BY date DESC, instrument LIMIT ?1",
        )?;
        let rows = stmt
            .query_map(params![limit], |row| {
                Ok(MarketClose {
                    date: row.get(0)?,
                    instrument: row.get(1)?,
                    price: row.get(2)?,
                    previous_close: row.get(3)?,
                    change: row.get(4)?,
                    change_percent: row.get(5)?,
                    captured_at: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    /// Whether a close was captured for `date` (YYYY-MM-DD).
    pub fn has_market_close(&self, date: &str) -> Result<bool> {
        let conn = self.conn()?;
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM market_close WHERE date = ?1",
            params![date],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    /// Record that a scheduled job ran for a date. Returns false when it was
    /// already recorded.
    pub fn claim_job_run(&self, job: &str, date: &str, started_at: i64) -> Result<bool> {
        let conn = self.conn()?;
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO scheduler_runs (job, date, started_at) VALUES (?1, ?2, ?3)",
            params![job, date, started_at],
        )?;
        Ok(inserted > 0)
    }

    /// Clear captured market closes.
    pub fn clear_market_data(&self) -> Result<usize> {
        let conn = self.conn()?;
        let deleted = conn.execute("DELETE FROM market_close", [])?;
        warn!("Cleared {} market close rows", deleted);
        Ok(deleted)
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let role: String = row.get(4)?;
    let preferences_json: String = row.get(9)?;
    let preferences: NotificationPreferences =
        serde_json::from_str(&preferences_json).unwrap_or_default();

    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        role: Role::from_str(&role).unwrap_or_default(),
        is_active: row.get(5)?,
        is_approved: row.get(6)?,
        full_name: row.get(7)?,
        timezone: row.get(8)?,
        preferences,
        created_at: row.get(10)?,
        last_login: row.get(11)?,
        approved_by: row.get(12)?,
    })
}

fn journal_from_row(row: &Row<'_>) -> rusqlite::Result<JournalEntry> {
    let outcome: String = row.get(7)?;
    Ok(JournalEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        symbol: row.get(2)?,
        trade_type: row.get(3)?,
        entry_price: row.get(4)?,
        exit_price: row.get(5)?,
        quantity: row.get(6)?,
        outcome: TradeOutcome::from_str(&outcome).unwrap_or_default(),
        profit_loss: row.get(8)?,
        trade_date: row.get(9)?,
        entry_time: row.get(10)?,
        exit_time: row.get(11)?,
        notes: row.get(12)?,
        chart_image_path: row.get(13)?,
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

fn signal_from_row(row: &Row<'_>) -> rusqlite::Result<SignalRecord> {
    let bias: String = row.get(2)?;
    let risk_level: String = row.get(4)?;
    let outcome: String = row.get(5)?;
    let signal_json: String = row.get(9)?;
    let signal: Signal = serde_json::from_str(&signal_json).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(9, rusqlite::types::Type::Text, Box::new(e))
    })?;

    Ok(SignalRecord {
        id: row.get(0)?,
        symbol: row.get(1)?,
        bias: crate::types::Bias::from_str(&bias).unwrap_or(signal.bias),
        probability: row.get(3)?,
        risk_level: RiskLevel::from_str(&risk_level),
        outcome: SignalOutcome::from_str(&outcome),
        profit_loss: row.get(6)?,
        news_hash: row.get(7)?,
        posted: row.get(8)?,
        signal,
        created_at: row.get(10)?,
    })
}

fn pattern_from_row(row: &Row<'_>) -> rusqlite::Result<LearnedPattern> {
    Ok(LearnedPattern {
        pattern_key: row.get(0)?,
        success_rate: row.get(1)?,
        usage_count: row.get(2)?,
        last_updated: row.get(3)?,
    })
}
