//! Manual trade journal.
//!
//! Entries are scoped to their owner. Chart screenshots are written to the
//! upload directory and referenced from the entry by bare file name.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::error::{AppError, Result};
use crate::services::SqliteStore;
use crate::types::{
    JournalEntry, JournalEntryInput, JournalGroupStats, JournalQuery, JournalStats, JournalTotals,
    TradeOutcome,
};

/// Accepted chart image extensions.
pub const ALLOWED_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif"];

/// Largest accepted upload (10 MB).
pub const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

const TRADE_TYPES: &[&str] = &["BUY", "SELL", "LONG", "SHORT"];

/// Lowercased extension when it is an accepted image type.
fn allowed_extension(filename: &str) -> Option<String> {
    let (_, ext) = filename.rsplit_once('.')?;
    let ext = ext.to_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Check the file signature against the extension.
fn matches_signature(ext: &str, bytes: &[u8]) -> bool {
    match ext {
        "png" => bytes.starts_with(&[0x89, b'P', b'N', b'G']),
        "jpg" | "jpeg" => bytes.starts_with(&[0xFF, 0xD8, 0xFF]),
        "gif" => bytes.starts_with(b"GIF87a") || bytes.starts_with(b"GIF89a"),
        _ => false,
    }
}

/// Accept only a bare file name inside the upload directory.
pub fn validate_chart_name(name: &str) -> Result<&str> {
    let name = name.trim();
    if name.is_empty() || name.contains('/') || name.contains('\\') || name.contains("..") {
        return Err(AppError::BadRequest("Invalid chart name".to_string()));
    }
    Ok(name)
}

/// Build a validated entry from request input.
fn entry_from_input(user_id: &str, input: &JournalEntryInput, now: i64) -> Result<JournalEntry> {
    let symbol = input.symbol.trim().to_uppercase();
    if symbol.is_empty() {
        return Err(AppError::BadRequest("Symbol is required".to_string()));
    }

    let trade_type = input.trade_type.trim().to_uppercase();
    if !TRADE_TYPES.contains(&trade_type.as_str()) {
        return Err(AppError::BadRequest(format!(
            "Trade type must be one of {}",
            TRADE_TYPES.join(", ")
        )));
    }

    if !input.entry_price.is_finite() || input.entry_price <= 0.0 {
        return Err(AppError::BadRequest("Entry price must be positive".to_string()));
    }

    let chart_image_path = match input.chart_image_path.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => Some(validate_chart_name(name)?.to_string()),
        _ => None,
    };

    let quantity = input.quantity.unwrap_or(1);
    if quantity < 1 {
        return Err(AppError::BadRequest("Quantity must be at least 1".to_string()));
    }

    Ok(JournalEntry {
        id: 0,
        user_id: user_id.to_string(),
        symbol,
        trade_type,
        entry_price: input.entry_price,
        exit_price: input.exit_price,
        quantity,
        outcome: input.outcome.unwrap_or_default(),
        profit_loss: input.profit_loss.unwrap_or(0.0),
        trade_date: input.trade_date.clone().filter(|d| !d.trim().is_empty()),
        entry_time: input.entry_time.clone().filter(|t| !t.trim().is_empty()),
        exit_time: input.exit_time.clone().filter(|t| !t.trim().is_empty()),
        notes: input.notes.clone().unwrap_or_default(),
        chart_image_path,
        created_at: now,
        updated_at: now,
    })
}

/// Aggregate a set of entries.
pub fn totals(entries: &[JournalEntry]) -> JournalTotals {
    if entries.is_empty() {
        return JournalTotals::default();
    }

    let count = |outcome: TradeOutcome| entries.iter().filter(|e| e.outcome == outcome).count() as i64;
    let wins = count(TradeOutcome::Win);
    let losses = count(TradeOutcome::Loss);
    let breakevens = count(TradeOutcome::Breakeven);
    let pending = count(TradeOutcome::Pending);

    let total_pnl: f64 = entries.iter().map(|e| e.profit_loss).sum();
    let best_trade = entries.iter().map(|e| e.profit_loss).fold(f64::MIN, f64::max);
    let worst_trade = entries.iter().map(|e| e.profit_loss).fold(f64::MAX, f64::min);

    let decided = wins + losses + breakevens;
    let win_rate = if decided > 0 {
        wins as f64 / decided as f64 * 100.0
    } else {
        0.0
    };

    JournalTotals {
        total_trades: entries.len() as i64,
        wins,
        losses,
        breakevens,
        pending,
        total_pnl,
        avg_pnl: total_pnl / entries.len() as f64,
        best_trade,
        worst_trade,
        win_rate,
    }
}

/// Group entries by a key, most traded first.
fn group_by<F>(entries: &[JournalEntry], key: F) -> Vec<JournalGroupStats>
where
    F: Fn(&JournalEntry) -> &str,
{
    let mut groups: HashMap<String, JournalGroupStats> = HashMap::new();
    for entry in entries {
        let k = key(entry);
        let group = groups.entry(k.to_string()).or_insert_with(|| JournalGroupStats {
            key: k.to_string(),
            trades: 0,
            wins: 0,
            pnl: 0.0,
        });
        group.trades += 1;
        if entry.outcome == TradeOutcome::Win {
            group.wins += 1;
        }
        group.pnl += entry.profit_loss;
    }

    let mut groups: Vec<JournalGroupStats> = groups.into_values().collect();
    groups.sort_by(|a, b| b.trades.cmp(&a.trades).then_with(|| a.key.cmp(&b.key)));
    groups
}

/// Journal CRUD and chart uploads.
pub struct JournalService {
    store: Arc<SqliteStore>,
    upload_dir: PathBuf,
}

impl JournalService {
    pub fn new(store: Arc<SqliteStore>, upload_dir: impl Into<PathBuf>) -> Self {
        Self {
            store,
            upload_dir: upload_dir.into(),
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn create(&self, user_id: &str, input: &JournalEntryInput) -> Result<JournalEntry> {
        let now = chrono::Utc::now().timestamp_millis();
        let mut entry = entry_from_input(user_id, input, now)?;
        entry.id = self.store.insert_journal_entry(&entry)?;

        info!("Journal entry {} created for {} ({})", entry.id, user_id, entry.symbol);
        Ok(entry)
    }

    pub fn get(&self, user_id: &str, id: i64) -> Result<JournalEntry> {
        self.store
            .get_journal_entry(user_id, id)?
            .ok_or_else(|| AppError::NotFound(format!("Journal entry {} not found", id)))
    }

    pub fn list(&self, user_id: &str, query: &JournalQuery) -> Result<Vec<JournalEntry>> {
        let mut query = query.clone();
        if query.limit.is_none() {
            query.limit = Some(50);
        }
        self.store.list_journal_entries(user_id, &query)
    }

    /// Replace an entry's fields, keeping its id and creation time.
    pub fn update(&self, user_id: &str, id: i64, input: &JournalEntryInput) -> Result<JournalEntry> {
        let existing = self.get(user_id, id)?;

        let now = chrono::Utc::now().timestamp_millis();
        let mut entry = entry_from_input(user_id, input, now)?;
        entry.id = id;
        entry.created_at = existing.created_at;
        if entry.chart_image_path.is_none() {
            entry.chart_image_path = existing.chart_image_path.clone();
        }

        if !self.store.update_journal_entry(&entry)? {
            return Err(AppError::NotFound(format!("Journal entry {} not found", id)));
        }

        // Replaced chart
        if let Some(old) = existing.chart_image_path {
            if entry.chart_image_path.as_deref() != Some(old.as_str()) {
                self.remove_chart(&old);
            }
        }

        Ok(entry)
    }

    /// Delete an entry and its chart image.
    pub fn delete(&self, user_id: &str, id: i64) -> Result<()> {
        let entry = self.get(user_id, id)?;
        if !self.store.delete_journal_entry(user_id, id)? {
            return Err(AppError::NotFound(format!("Journal entry {} not found", id)));
        }

        if let Some(name) = entry.chart_image_path {
            self.remove_chart(&name);
        }
        info!("Journal entry {} deleted", id);
        Ok(())
    }

    /// Full path of a stored chart.
    pub fn chart_path(&self, name: &str) -> Result<PathBuf> {
        Ok(self.upload_dir.join(validate_chart_name(name)?))
    }

    fn remove_chart(&self, name: &str) {
        let path = match self.chart_path(name) {
            Ok(path) => path,
            Err(_) => {
                warn!("Not removing chart with invalid name: {}", name);
                return;
            }
        };
        match fs::remove_file(&path) {
            Ok(()) => debug!("Removed chart {}", path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove chart {}: {}", path.display(), e),
        }
    }

    /// Overall, per-symbol and per-trade-type aggregates.
    pub fn stats(&self, user_id: &str) -> Result<JournalStats> {
        let entries = self.store.list_journal_entries(user_id, &JournalQuery::default())?;

        Ok(JournalStats {
            overall: totals(&entries),
            by_symbol: group_by(&entries, |e| e.symbol.as_str()),
            by_type: group_by(&entries, |e| e.trade_type.as_str()),
        })
    }

    /// Validate and store an uploaded chart image, returning its file name.
    pub async fn save_chart(&self, filename: &str, bytes: &[u8]) -> Result<String> {
        let ext = allowed_extension(filename).ok_or_else(|| {
            AppError::BadRequest(format!(
                "File type not allowed (accepted: {})",
                ALLOWED_EXTENSIONS.join(", ")
            ))
        })?;

        if bytes.is_empty() {
            return Err(AppError::BadRequest("Empty file".to_string()));
        }
        if bytes.len() > MAX_UPLOAD_BYTES {
            return Err(AppError::BadRequest("File too large (max 10MB)".to_string()));
        }
        if !matches_signature(&ext, bytes) {
            return Err(AppError::BadRequest("Invalid image file".to_string()));
        }

        let digest = hex::encode(Sha256::digest(bytes));
        let name = format!(
            "chart_{}_{}.{}",
            chrono::Utc::now().format("%Y%m%d_%H%M%S"),
            &digest[..8],
            ext
        );

        tokio::fs::create_dir_all(&self.upload_dir).await?;
        let path = self.upload_dir.join(&name);
        tokio::fs::write(&path, bytes).await?;

        info!("Saved chart image {} ({} bytes)", path.display(), bytes.len());
        Ok(name)
    }
}
