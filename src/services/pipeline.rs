//! Signal generation pipeline.
//!
//! For each symbol: fetch bars, calculate, blend sentiment, adjust from
//! history, persist, broadcast and notify admins. A failing symbol is logged
//! and skipped.

use chrono::Utc;
use tracing::{error, info, warn};

use crate::error::Result;
use crate::services::learning::{assess_risk, enhanced_probability};
use crate::services::sqlite_store::NewSignalRecord;
use crate::services::notifier::DeliveryReport;
use crate::services::strategy::{self, calculate_signal};
use crate::types::{
    FormatOptions, GenerationReport, NotificationType, OhlcBar, SentimentResult, Signal,
};
use crate::AppState;

/// Result of processing one symbol.
#[derive(Debug, Clone)]
pub struct ProcessedSignal {
    pub record_id: i64,
    pub signal: Signal,
    pub delivery: DeliveryReport,
}

/// Turn bars into a stored (and optionally broadcast) signal.
pub async fn process_bars(
    state: &AppState,
    symbol: &str,
    bars: &[OhlcBar],
    options: &FormatOptions,
    broadcast: bool,
) -> Result<ProcessedSignal> {
    let now = Utc::now().timestamp_millis();
    let mut signal = calculate_signal(symbol, bars)?;

    let sentiment = if state.config.include_news_analysis {
        let result = state.sentiment.analyze(symbol).await;
        if result.article_count > 0 {
            if let Err(e) = state.store.insert_news_sentiment(symbol, &result, now) {
                warn!("Failed to record sentiment for {}: {}", symbol, e);
            }
        }
        result
    } else {
        SentimentResult::technical_only()
    };
    strategy::apply_sentiment(&mut signal, sentiment);

    let adjustment = state.learning.historical_adjustment(symbol, signal.bias, now)?;
    if adjustment != 0.0 {
        let adjusted = enhanced_probability(signal.probability_percentage, adjustment);
        info!(
            "Historical adjustment for {} {}: {:+} -> {}%",
            symbol,
            signal.bias.as_str(),
            adjustment,
            adjusted
        );
        strategy::set_probability(&mut signal, adjusted as f64);
    }

    let historical_risk = state.learning.historical_risk(symbol, now)?;
    let risk_level = assess_risk(
        signal.probability_percentage,
        signal.bias,
        signal.sentiment.as_ref(),
        historical_risk,
    );

    let news_hash = signal.sentiment.as_ref().and_then(|s| s.news_hash.clone());
    let record_id = state.store.insert_signal(&NewSignalRecord {
        signal: &signal,
        risk_level,
        news_hash: news_hash.as_deref(),
        created_at: now,
    })?;

    info!(
        "Signal {} for {}: {} at {:.2}, TP {:.2}, {}% ({} risk)",
        record_id,
        signal.display_name,
        signal.bias.as_str(),
        signal.current_value,
        signal.take_profit,
        signal.probability_percentage,
        risk_level.as_str()
    );

    let delivery = if broadcast {
        let delivery = state.notifier.broadcast_signal(&signal, options).await;
        if delivery.any() {
            state.store.set_signal_posted(record_id, true)?;
        }
        delivery
    } else {
        DeliveryReport::default()
    };

    let title = format!("{} {} signal", signal.display_name, signal.bias.as_str());
    let message = format!(
        "Entry {:.2} | TP {:.2} | {}% probability | {} risk",
        signal.entry1,
        signal.take_profit,
        signal.probability_percentage,
        risk_level.as_str()
    );
    if let Err(e) = state
        .notifier
        .notify_admins(NotificationType::Signal, &title, Some(message), Some(record_id))
    {
        warn!("Failed to notify admins about signal {}: {}", record_id, e);
    }

    Ok(ProcessedSignal {
        record_id,
        signal,
        delivery,
    })
}

/// Run the full pipeline over `symbols`, in order.
pub async fn generate_signals(state: &AppState, symbols: &[String]) -> GenerationReport {
    let _guard = state.pipeline_lock.lock().await;
    info!("Generating signals for {} symbol(s)", symbols.len());

    let mut report = GenerationReport::default();
    let options = FormatOptions::default();

    for symbol in symbols {
        let bars = match state.market.fetch_signal_bars(symbol).await {
            Ok(bars) => bars,
            Err(e) => {
                error!("Skipping {}: failed to fetch bars: {}", symbol, e);
                report.failed.push(symbol.clone());
                continue;
            }
        };

        match process_bars(state, symbol, &bars.bars, &options, true).await {
            Ok(processed) => {
                if processed.delivery.any() {
                    report.posted += 1;
                }
                report.signals.push(processed.signal);
            }
            Err(e) => {
                error!("Skipping {}: {}", symbol, e);
                report.failed.push(symbol.clone());
            }
        }
    }

    if !report.signals.is_empty() {
        let total: u32 = report.signals.iter().map(|s| s.probability_percentage).sum();
        report.average_probability = total as f64 / report.signals.len() as f64;
    }

    info!(
        "Pipeline finished: {} signal(s), {} posted, {} failed",
        report.signals.len(),
        report.posted,
        report.failed.len()
    );
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::types::{Bias, NotificationQuery, RiskLevel, Role, SentimentLabel, SignalOutcome, User};

    fn bars() -> Vec<OhlcBar> {
        vec![
            OhlcBar::new(0, 100.0, 105.0, 95.0, 100.0),
            OhlcBar::new(0, 100.0, 112.0, 98.0, 110.0),
        ]
    }

    fn state() -> AppState {
        AppState::for_tests(Config::for_tests()).unwrap()
    }

    #[tokio::test]
    async fn test_process_bars_persists_signal() {
        let state = state();
        let mut admin = User::new("admin", "admin@example.com", String::new(), Role::Admin);
        admin.is_approved = true;
        state.store.create_user(&admin).unwrap();

        let processed = process_bars(&state, "^NDX", &bars(), &FormatOptions::default(), false)
            .await
            .unwrap();

        assert_eq!(processed.signal.bias, Bias::Long);
        assert_eq!(processed.signal.take_profit, 120.0);
        assert_eq!(
            processed.signal.sentiment.as_ref().map(|s| s.label),
            Some(SentimentLabel::TechnicalOnly)
        );
        assert!(!processed.delivery.any());

        let record = state.store.get_signal(processed.record_id).unwrap().unwrap();
        assert_eq!(record.outcome, SignalOutcome::Pending);
        assert!(!record.posted);
        assert_eq!(record.probability, processed.signal.probability_percentage);

        let (notifications, _) = state
            .store
            .list_notifications(&admin.id, &NotificationQuery::default())
            .unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].signal_id, Some(processed.record_id));
    }

    #[tokio::test]
    async fn test_history_raises_probability() {
        let state = state();

        // Five winning LONG signals in the window
        for _ in 0..5 {
            let p = process_bars(&state, "^NDX", &bars(), &FormatOptions::default(), false)
                .await
                .unwrap();
            state.store.set_signal_outcome(p.record_id, SignalOutcome::Win, Some(10.0)).unwrap();
        }

        let base = process_bars(&state, "^NDX", &bars(), &FormatOptions::default(), false)
            .await
            .unwrap();
        // cv 110 in 95..112 is near the highs: base 80, +5 from history
        assert_eq!(base.signal.probability_percentage, 85);

        let record = state.store.get_signal(base.record_id).unwrap().unwrap();
        assert_eq!(record.risk_level, RiskLevel::Low);
    }

    #[tokio::test]
    async fn test_process_rejects_short_history() {
        let state = state();
        let one = vec![OhlcBar::new(0, 1.0, 1.0, 1.0, 1.0)];
        assert!(process_bars(&state, "X", &one, &FormatOptions::default(), false)
            .await
            .is_err());
        assert!(state.store.list_signals(None, 10).unwrap().is_empty());
    }
}
