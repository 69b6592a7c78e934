use serde::{Deserialize, Serialize};

use crate::types::SentimentResult;

/// Directional call derived from the sign of the net change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Bias {
    Long,
    Short,
}

impl Bias {
    pub fn as_str(&self) -> &'static str {
        match self {
            Bias::Long => "LONG",
            Bias::Short => "SHORT",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_uppercase().as_str() {
            "LONG" | "BUY" => Some(Bias::Long),
            "SHORT" | "SELL" => Some(Bias::Short),
            _ => None,
        }
    }

    /// Order verb used in trade plans.
    pub fn action(&self) -> &'static str {
        match self {
            Bias::Long => "BUY",
            Bias::Short => "SELL",
        }
    }

    pub fn opposite(&self) -> Self {
        match self {
            Bias::Long => Bias::Short,
            Bias::Short => Bias::Long,
        }
    }
}

/// Where the current value sits within the day's range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CvZone {
    /// Bottom 30% of the range.
    NearLows,
    Middle,
    /// Top 30% of the range.
    NearHighs,
}

impl CvZone {
    pub fn from_position(cv_position: f64) -> Self {
        if cv_position <= 0.3 {
            CvZone::NearLows
        } else if cv_position >= 0.7 {
            CvZone::NearHighs
        } else {
            CvZone::Middle
        }
    }

    pub fn is_extreme(&self) -> bool {
        !matches!(self, CvZone::Middle)
    }

    pub fn label(&self) -> &'static str {
        match self {
            CvZone::NearLows => "CV Low Range",
            CvZone::Middle => "CV Mid Range",
            CvZone::NearHighs => "CV High Range",
        }
    }
}

/// Coarse probability bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ProbabilityLabel {
    High,
    Medium,
}

impl ProbabilityLabel {
    pub fn from_percentage(p: u32) -> Self {
        if p >= 75 {
            ProbabilityLabel::High
        } else {
            ProbabilityLabel::Medium
        }
    }
}

/// A computed Hybrid Math signal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Signal {
    pub symbol: String,
    pub display_name: String,
    pub bias: Bias,
    pub current_value: f64,
    pub previous_close: f64,
    pub net_change: f64,
    pub change_pct: f64,
    pub today_high: f64,
    pub today_low: f64,
    pub cv_position: f64,
    pub take_profit: f64,
    pub entry1: f64,
    pub entry2: f64,
    pub tp1: f64,
    pub tp2: f64,
    pub sl_tight: f64,
    pub sl_wide: f64,
    pub probability_percentage: u32,
    pub probability_label: ProbabilityLabel,
    /// Trading date, e.g. "14 July 2025".
    pub timestamp: String,
    pub is_weekend_signal: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentiment: Option<SentimentResult>,
}

impl Signal {
    pub fn zone(&self) -> CvZone {
        CvZone::from_position(self.cv_position)
    }
}

/// An entry level with its own stops.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanEntry {
    pub price: f64,
    pub sl_tight: f64,
    pub sl_wide: f64,
}

/// Counter-trade (or extension) alternative to the main plan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskyPlay {
    pub direction: Bias,
    pub entry: f64,
    pub tp1: f64,
    pub tp2: f64,
    pub sl_tight: f64,
    pub sl_wide: f64,
}

/// The full trade plan rendered into messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TradePlan {
    pub zone: CvZone,
    pub bias: Bias,
    pub entries: [PlanEntry; 2],
    pub tp1: f64,
    pub tp2: f64,
    pub risky_play: RiskyPlay,
}

/// Manual target/stop overrides applied when formatting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManualOverrides {
    pub tp1: Option<f64>,
    pub tp2: Option<f64>,
    pub sl_tight: Option<f64>,
    pub sl_wide: Option<f64>,
}

impl ManualOverrides {
    pub fn is_empty(&self) -> bool {
        self.tp1.is_none() && self.tp2.is_none() && self.sl_tight.is_none() && self.sl_wide.is_none()
    }
}

/// Options for the full Discord message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormatOptions {
    #[serde(default)]
    pub overrides: ManualOverrides,
    #[serde(default)]
    pub comments: Option<String>,
    /// Omit the risky play section.
    #[serde(default)]
    pub hide_risky_play: bool,
}

/// Outcome of a posted signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SignalOutcome {
    Pending,
    Win,
    Loss,
}

impl SignalOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalOutcome::Pending => "pending",
            SignalOutcome::Win => "win",
            SignalOutcome::Loss => "loss",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "win" => SignalOutcome::Win,
            "loss" => SignalOutcome::Loss,
            _ => SignalOutcome::Pending,
        }
    }
}

/// Risk bucket from the learning engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
    Extreme,
}

impl RiskLevel {
    pub fn from_score(score: f64) -> Self {
        if score <= 0.0 {
            RiskLevel::Low
        } else if score <= 2.0 {
            RiskLevel::Medium
        } else if score <= 4.0 {
            RiskLevel::High
        } else {
            RiskLevel::Extreme
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Extreme => "extreme",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "low" => RiskLevel::Low,
            "high" => RiskLevel::High,
            "extreme" => RiskLevel::Extreme,
            _ => RiskLevel::Medium,
        }
    }
}

/// A persisted signal row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignalRecord {
    pub id: i64,
    pub symbol: String,
    pub bias: Bias,
    pub probability: u32,
    pub risk_level: RiskLevel,
    pub outcome: SignalOutcome,
    pub profit_loss: Option<f64>,
    pub news_hash: Option<String>,
    /// Whether the signal reached at least one channel.
    pub posted: bool,
    pub signal: Signal,
    /// Creation time (ms).
    pub created_at: i64,
}

/// Request to record an outcome.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutcomeRequest {
    pub outcome: SignalOutcome,
    #[serde(default)]
    pub profit_loss: Option<f64>,
}

/// Aggregate signal performance.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSummary {
    pub total_signals: i64,
    pub completed: i64,
    pub wins: i64,
    pub losses: i64,
    pub success_rate: f64,
    pub total_profit_loss: f64,
    pub average_probability: f64,
    pub by_symbol: Vec<SymbolPerformance>,
    /// Sentiment model usage counts.
    pub model_usage: Vec<(String, i64)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SymbolPerformance {
    pub symbol: String,
    pub total: i64,
    pub wins: i64,
    pub losses: i64,
    pub success_rate: f64,
}

/// A learned pattern row (symbol + bias + risk).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LearnedPattern {
    pub pattern_key: String,
    pub success_rate: f64,
    pub usage_count: i64,
    pub last_updated: i64,
}

/// Result of one pipeline run.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationReport {
    pub signals: Vec<Signal>,
    pub posted: usize,
    pub failed: Vec<String>,
    pub average_probability: f64,
}
