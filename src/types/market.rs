use serde::{Deserialize, Serialize};

/// One OHLC bar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OhlcBar {
    /// Bar open time (unix seconds, 0 when synthesized).
    #[serde(default)]
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

impl OhlcBar {
    pub fn new(time: i64, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            time,
            open,
            high,
            low,
            close,
        }
    }
}

/// Where a set of bars came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataSource {
    Yahoo,
    MarketWatch,
    Manual,
}

/// Bars fetched for signal calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketBars {
    pub symbol: String,
    pub source: DataSource,
    pub bars: Vec<OhlcBar>,
}

/// A live quote snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Quote {
    pub symbol: String,
    pub price: f64,
    pub previous_close: f64,
    pub change: f64,
    pub change_percent: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_high: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub day_low: Option<f64>,
    /// Fetch time (ms).
    pub timestamp: i64,
}

impl Quote {
    pub fn new(symbol: &str, price: f64, previous_close: f64) -> Self {
        let change = price - previous_close;
        let change_percent = if previous_close != 0.0 {
            change / previous_close * 100.0
        } else {
            0.0
        };

        Self {
            symbol: symbol.to_string(),
            price,
            previous_close,
            change,
            change_percent,
            day_high: None,
            day_low: None,
            timestamp: chrono::Utc::now().timestamp_millis(),
        }
    }
}

/// A tracked instrument's quote for the dashboard.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveQuote {
    pub instrument: Instrument,
    /// Served from the last successful fetch.
    pub stale: bool,
    #[serde(flatten)]
    pub quote: Quote,
}

/// Tracked instruments on the dashboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Instrument {
    Nasdaq,
    Dow,
    Gold,
}

impl Instrument {
    pub const ALL: [Instrument; 3] = [Instrument::Nasdaq, Instrument::Dow, Instrument::Gold];

    /// Quote symbol for this instrument.
    pub fn symbol(&self) -> &'static str {
        match self {
            Instrument::Nasdaq => "^NDX",
            Instrument::Dow => "^DJI",
            Instrument::Gold => "GC=F",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Instrument::Nasdaq => "nasdaq",
            Instrument::Dow => "dow",
            Instrument::Gold => "gold",
        }
    }
}

/// A saved market close row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketClose {
    /// Capture date (YYYY-MM-DD).
    pub date: String,
    pub instrument: String,
    pub price: f64,
    pub previous_close: f64,
    pub change: f64,
    pub change_percent: f64,
    /// Capture time (ms).
    pub captured_at: i64,
}

/// Market session status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarketStatus {
    Open,
    Closed,
}

/// Countdown breakdown.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Countdown {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub days: Option<i64>,
    pub hours: i64,
    pub minutes: i64,
    pub seconds: i64,
}

/// US market timer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketTimer {
    pub status: MarketStatus,
    pub total_seconds: i64,
    pub countdown: Countdown,
    pub formatted_time: String,
    pub message: String,
    /// Next open, formatted "%Y-%m-%d %H:%M ET" (None while open).
    pub next_open: Option<String>,
}
