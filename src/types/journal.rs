use serde::{Deserialize, Serialize};

/// Journal trade outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum TradeOutcome {
    Win,
    Loss,
    Breakeven,
    #[default]
    Pending,
}

impl TradeOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            TradeOutcome::Win => "WIN",
            TradeOutcome::Loss => "LOSS",
            TradeOutcome::Breakeven => "BREAKEVEN",
            TradeOutcome::Pending => "PENDING",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "WIN" => Some(TradeOutcome::Win),
            "LOSS" => Some(TradeOutcome::Loss),
            "BREAKEVEN" => Some(TradeOutcome::Breakeven),
            "PENDING" => Some(TradeOutcome::Pending),
            _ => None,
        }
    }
}

/// A manually entered trade.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntry {
    pub id: i64,
    pub user_id: String,
    pub symbol: String,
    /// BUY/SELL/LONG/SHORT, stored uppercased.
    pub trade_type: String,
    pub entry_price: f64,
    pub exit_price: Option<f64>,
    pub quantity: i64,
    pub outcome: TradeOutcome,
    pub profit_loss: f64,
    /// Trade date (YYYY-MM-DD).
    pub trade_date: Option<String>,
    pub entry_time: Option<String>,
    pub exit_time: Option<String>,
    pub notes: String,
    pub chart_image_path: Option<String>,
    pub created_at: i64,
    pub updated_at: i64,
}

/// Fields for creating or replacing an entry.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalEntryInput {
    pub symbol: String,
    pub trade_type: String,
    pub entry_price: f64,
    #[serde(default)]
    pub exit_price: Option<f64>,
    #[serde(default)]
    pub quantity: Option<i64>,
    #[serde(default)]
    pub outcome: Option<TradeOutcome>,
    #[serde(default)]
    pub profit_loss: Option<f64>,
    #[serde(default)]
    pub trade_date: Option<String>,
    #[serde(default)]
    pub entry_time: Option<String>,
    #[serde(default)]
    pub exit_time: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub chart_image_path: Option<String>,
}

/// List filters.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalQuery {
    pub symbol: Option<String>,
    pub outcome: Option<TradeOutcome>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

/// Aggregate over a set of entries.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalTotals {
    pub total_trades: i64,
    pub wins: i64,
    pub losses: i64,
    pub breakevens: i64,
    pub pending: i64,
    pub total_pnl: f64,
    pub avg_pnl: f64,
    pub best_trade: f64,
    pub worst_trade: f64,
    /// Wins over decided trades, as a percentage.
    pub win_rate: f64,
}

/// Per-group breakdown (symbol or trade type).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalGroupStats {
    pub key: String,
    pub trades: i64,
    pub wins: i64,
    pub pnl: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JournalStats {
    pub overall: JournalTotals,
    pub by_symbol: Vec<JournalGroupStats>,
    pub by_type: Vec<JournalGroupStats>,
}
