//! Outcome learning and risk assessment.
//!
//! Recorded signal outcomes feed back into two places: a risk bucket stored
//! with each new signal, and a small probability adjustment for symbols whose
//! recent record is clearly good or bad.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::services::strategy::{MAX_PROBABILITY, MIN_PROBABILITY};
use crate::services::SqliteStore;
use crate::types::{
    Bias, LearnedPattern, PerformanceSummary, RiskLevel, SentimentLabel, SentimentResult,
    SignalOutcome, SignalRecord, SymbolPerformance,
};

const DAY_MS: i64 = 24 * 60 * 60 * 1000;

/// Look-back window for history-based adjustments.
pub const HISTORY_DAYS: i64 = 30;
/// Recent outcomes considered for historical risk.
const RISK_SAMPLE: i64 = 20;
/// Completed trades required before adjusting probability.
const MIN_HISTORY: usize = 5;
pub const HISTORY_BONUS: f64 = 5.0;

/// Risk bucket for a new signal.
///
/// `historical_risk` comes from [`LearningEngine::historical_risk`].
pub fn assess_risk(
    probability: u32,
    bias: Bias,
    sentiment: Option<&SentimentResult>,
    historical_risk: f64,
) -> RiskLevel {
    let mut score = 0.0;

    if probability < 40 {
        score += 2.0;
    } else if probability < 50 {
        score += 1.0;
    } else if probability > 70 {
        score -= 1.0;
    }

    if let Some(s) = sentiment.filter(|s| s.label != SentimentLabel::TechnicalOnly) {
        let conflicting = match bias {
            Bias::Long => s.score < -0.3,
            Bias::Short => s.score > 0.3,
        };
        if conflicting {
            score += 2.0;
        }
        if s.confidence < 30.0 {
            score += 1.0;
        }
    }

    RiskLevel::from_score(score + historical_risk)
}

/// Apply a historical adjustment and keep the probability in bounds.
pub fn enhanced_probability(base: u32, adjustment: f64) -> u32 {
    (base as f64 + adjustment)
        .round()
        .clamp(MIN_PROBABILITY as f64, MAX_PROBABILITY as f64) as u32
}

/// Share of wins among decided outcomes.
fn success_rate(outcomes: &[(SignalOutcome, Option<f64>)]) -> f64 {
    if outcomes.is_empty() {
        return 0.0;
    }
    let wins = outcomes.iter().filter(|(o, _)| *o == SignalOutcome::Win).count();
    wins as f64 / outcomes.len() as f64
}

/// Key a pattern by symbol, direction and risk.
pub fn pattern_key(symbol: &str, bias: Bias, risk: RiskLevel) -> String {
    format!("{}_{}_{}", symbol, bias.as_str(), risk.as_str())
}

/// Learning engine backed by the signal history table.
pub struct LearningEngine {
    store: Arc<SqliteStore>,
}

impl LearningEngine {
    pub fn new(store: Arc<SqliteStore>) -> Self {
        Self { store }
    }

    fn window_start(now: i64) -> i64 {
        now - HISTORY_DAYS * DAY_MS
    }

    /// Extra risk from the symbol's last 20 decided signals.
    pub fn historical_risk(&self, symbol: &str, now: i64) -> Result<f64> {
        let outcomes =
            self.store
                .completed_outcomes(symbol, None, Self::window_start(now), Some(RISK_SAMPLE))?;
        if outcomes.is_empty() {
            return Ok(0.0);
        }

        let mut risk = 0.0;
        if success_rate(&outcomes) < 0.4 {
            risk += 1.0;
        }

        let pnl: Vec<f64> = outcomes.iter().filter_map(|(_, p)| *p).collect();
        if !pnl.is_empty() && pnl.iter().sum::<f64>() / (pnl.len() as f64) < 0.0 {
            risk += 0.5;
        }

        Ok(risk)
    }

    /// +5 for a strong record, -5 for a weak one, 0 with too little history.
    pub fn historical_adjustment(&self, symbol: &str, bias: Bias, now: i64) -> Result<f64> {
        let outcomes = self.store.completed_outcomes(
            symbol,
            Some(bias.as_str()),
            Self::window_start(now),
            None,
        )?;

        if outcomes.len() < MIN_HISTORY {
            return Ok(0.0);
        }

        let rate = success_rate(&outcomes);
        let adjustment = if rate > 0.7 {
            HISTORY_BONUS
        } else if rate < 0.3 {
            -HISTORY_BONUS
        } else {
            0.0
        };

        debug!(
            "Historical adjustment for {} {}: {} trades, {:.0}% success, {:+}",
            symbol,
            bias.as_str(),
            outcomes.len(),
            rate * 100.0,
            adjustment
        );
        Ok(adjustment)
    }

    /// Record an outcome and update the matching pattern.
    pub fn learn_from_outcome(
        &self,
        signal_id: i64,
        outcome: SignalOutcome,
        profit_loss: Option<f64>,
        now: i64,
    ) -> Result<SignalRecord> {
        let previous = self
            .store
            .get_signal(signal_id)?
            .ok_or_else(|| AppError::NotFound(format!("Signal {} not found", signal_id)))?;

        self.store.set_signal_outcome(signal_id, outcome, profit_loss)?;

        // Re-grading an already decided signal would double count it.
        if outcome != SignalOutcome::Pending && previous.outcome == SignalOutcome::Pending {
            let key = pattern_key(&previous.symbol, previous.bias, previous.risk_level);
            let hit = if outcome == SignalOutcome::Win { 1.0 } else { 0.0 };

            let pattern = match self.store.get_pattern(&key)? {
                Some(existing) => {
                    let count = existing.usage_count + 1;
                    LearnedPattern {
                        success_rate: (existing.success_rate * existing.usage_count as f64 + hit)
                            / count as f64,
                        usage_count: count,
                        last_updated: now,
                        pattern_key: key,
                    }
                }
                None => LearnedPattern {
                    pattern_key: key,
                    success_rate: hit,
                    usage_count: 1,
                    last_updated: now,
                },
            };
            self.store.save_pattern(&pattern)?;

            info!(
                "Learned from signal {}: {} ({:?}), pattern {} now {:.0}% over {}",
                signal_id,
                outcome.as_str(),
                profit_loss,
                pattern.pattern_key,
                pattern.success_rate * 100.0,
                pattern.usage_count
            );
        }

        Ok(SignalRecord {
            outcome,
            profit_loss,
            ..previous
        })
    }

    /// Aggregate performance over the last `days`.
    pub fn performance_summary(&self, days: i64, now: i64) -> Result<PerformanceSummary> {
        let records = self.store.signals_since(now - days.max(1) * DAY_MS)?;

        let mut summary = PerformanceSummary {
            total_signals: records.len() as i64,
            model_usage: self.store.model_usage()?,
            ..Default::default()
        };

        let mut by_symbol: BTreeMap<String, SymbolPerformance> = BTreeMap::new();
        let mut probability_sum = 0.0;

        for record in &records {
            probability_sum += record.probability as f64;

            let entry = by_symbol
                .entry(record.symbol.clone())
                .or_insert_with(|| SymbolPerformance {
                    symbol: record.symbol.clone(),
                    total: 0,
                    wins: 0,
                    losses: 0,
                    success_rate: 0.0,
                });
            entry.total += 1;

            match record.outcome {
                SignalOutcome::Win => {
                    summary.wins += 1;
                    entry.wins += 1;
                }
                SignalOutcome::Loss => {
                    summary.losses += 1;
                    entry.losses += 1;
                }
                SignalOutcome::Pending => {}
            }
            summary.total_profit_loss += record.profit_loss.unwrap_or(0.0);
        }

        summary.completed = summary.wins + summary.losses;
        if summary.completed > 0 {
            summary.success_rate = summary.wins as f64 / summary.completed as f64 * 100.0;
        }
        if !records.is_empty() {
            summary.average_probability = probability_sum / records.len() as f64;
        }

        summary.by_symbol = by_symbol
            .into_values()
            .map(|mut s| {
                let decided = s.wins + s.losses;
                if decided > 0 {
                    s.success_rate = s.wins as f64 / decided as f64 * 100.0;
                }
                s
            })
            .collect();

        Ok(summary)
    }
}
