//! Hybrid Math signal calculation.
//!
//! Maps the last two OHLC bars of a symbol to a directional bias with entry,
//! target and stop levels, and scores the setup with a probability that can
//! be nudged by news sentiment.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::error::AppError;
use crate::services::market_clock;
use crate::types::{
    Bias, CvZone, OhlcBar, PlanEntry, ProbabilityLabel, RiskyPlay, SentimentResult, Signal,
    TradePlan,
};

/// Flat stop offsets in price units.
pub const TIGHT_STOP: f64 = 100.0;
pub const WIDE_STOP: f64 = 200.0;

/// Probability bounds after blending.
pub const MIN_PROBABILITY: u32 = 25;
pub const MAX_PROBABILITY: u32 = 88;

#[derive(Error, Debug, PartialEq)]
pub enum StrategyError {
    #[error("At least 2 bars are required, got {0}")]
    InsufficientData(usize),

    #[error("Bar {0} has a non-finite price")]
    InvalidPrice(usize),
}

impl From<StrategyError> for AppError {
    fn from(e: StrategyError) -> Self {
        AppError::BadRequest(e.to_string())
    }
}

/// Round to 2 decimals.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Dashboard name for a quote symbol. Unmapped symbols are returned as given.
pub fn display_name(symbol: &str) -> String {
    match symbol.trim().to_uppercase().as_str() {
        "^NDX" | "NDX" | "^IXIC" | "IXIC" => "NAS100".to_string(),
        "US30" | "^DJI" | "DJI" => "US30".to_string(),
        "^GSPC" | "SPX" => "SPX500".to_string(),
        _ => symbol.to_string(),
    }
}

/// Position of `current` within [low, high]; 0.5 when the range is empty.
pub fn cv_position(current: f64, low: f64, high: f64) -> f64 {
    let range = high - low;
    if range > 0.0 {
        (current - low) / range
    } else {
        0.5
    }
}

/// Starting probability: outer 60% of the range scores higher.
pub fn base_probability(cv_position: f64) -> u32 {
    if CvZone::from_position(cv_position).is_extreme() {
        80
    } else {
        65
    }
}

/// Blend the base probability with an optional sentiment read.
pub fn blend_probability(base: u32, bias: Bias, sentiment: Option<&SentimentResult>) -> u32 {
    let Some(sentiment) = sentiment else {
        return base.clamp(MIN_PROBABILITY, MAX_PROBABILITY);
    };

    let mut probability = if sentiment.label.agrees_with(bias) {
        (base + 10).min(85)
    } else if sentiment.label.contradicts(bias) {
        base.saturating_sub(15).max(45)
    } else {
        base
    };

    if sentiment.confidence >= 80.0 && probability > base {
        probability = (probability + 3).min(MAX_PROBABILITY);
    }

    probability.clamp(MIN_PROBABILITY, MAX_PROBABILITY)
}

/// Calculate a signal from bars using the current date.
pub fn calculate_signal(symbol: &str, bars: &[OhlcBar]) -> Result<Signal, StrategyError> {
    calculate_signal_at(symbol, bars, Utc::now())
}

/// Calculate a signal from bars as of `now`.
///
/// Only the last two bars set current value and previous close; high and low
/// span every supplied bar.
pub fn calculate_signal_at(
    symbol: &str,
    bars: &[OhlcBar],
    now: DateTime<Utc>,
) -> Result<Signal, StrategyError> {
    if bars.len() < 2 {
        return Err(StrategyError::InsufficientData(bars.len()));
    }
    for (i, bar) in bars.iter().enumerate() {
        if ![bar.open, bar.high, bar.low, bar.close].iter().all(|v| v.is_finite()) {
            return Err(StrategyError::InvalidPrice(i));
        }
    }

    let current_value = bars[bars.len() - 1].close;
    let previous_close = bars[bars.len() - 2].close;
    let net_change = current_value - previous_close;
    let change_pct = if previous_close != 0.0 {
        net_change / previous_close * 100.0
    } else {
        0.0
    };

    let today_high = bars.iter().map(|b| b.high).fold(f64::MIN, f64::max);
    let today_low = bars.iter().map(|b| b.low).fold(f64::MAX, f64::min);
    let position = cv_position(current_value, today_low, today_high);

    let bias = if net_change > 0.0 { Bias::Long } else { Bias::Short };
    let take_profit = match bias {
        Bias::Long => current_value + net_change.abs(),
        Bias::Short => current_value - net_change.abs(),
    };

    let (entry1, sl_tight, sl_wide) = match bias {
        Bias::Long => {
            let anchor = today_low.min(current_value);
            (today_low, anchor - TIGHT_STOP, anchor - WIDE_STOP)
        }
        Bias::Short => {
            let anchor = today_high.max(current_value);
            (today_high, anchor + TIGHT_STOP, anchor + WIDE_STOP)
        }
    };

    let probability = base_probability(position);
    let (date, is_weekend_signal) = market_clock::trading_date(now.date_naive());

    Ok(Signal {
        symbol: symbol.to_string(),
        display_name: display_name(symbol),
        bias,
        current_value: round2(current_value),
        previous_close: round2(previous_close),
        net_change: round2(net_change),
        change_pct: round2(change_pct),
        today_high: round2(today_high),
        today_low: round2(today_low),
        cv_position: position,
        take_profit: round2(take_profit),
        entry1: round2(entry1),
        entry2: round2(current_value),
        tp1: round2(current_value),
        tp2: round2(take_profit),
        sl_tight: round2(sl_tight),
        sl_wide: round2(sl_wide),
        probability_percentage: probability,
        probability_label: ProbabilityLabel::from_percentage(probability),
        timestamp: market_clock::format_trading_date(date),
        is_weekend_signal,
        sentiment: None,
    })
}

/// Re-score a signal with sentiment and attach it.
///
/// A `TechnicalOnly` result keeps the base probability.
pub fn apply_sentiment(signal: &mut Signal, sentiment: SentimentResult) {
    let base = base_probability(signal.cv_position);
    let probability = blend_probability(base, signal.bias, Some(&sentiment));
    signal.probability_percentage = probability;
    signal.probability_label = ProbabilityLabel::from_percentage(probability);
    signal.sentiment = Some(sentiment);
}

/// Override the probability (e.g. after historical adjustment), keeping bounds.
pub fn set_probability(signal: &mut Signal, probability: f64) {
    let p = probability
        .round()
        .clamp(MIN_PROBABILITY as f64, MAX_PROBABILITY as f64) as u32;
    signal.probability_percentage = p;
    signal.probability_label = ProbabilityLabel::from_percentage(p);
}

fn plan_entry(price: f64, bias: Bias) -> PlanEntry {
    let (tight, wide) = stops_from(price, bias);
    PlanEntry {
        price: round2(price),
        sl_tight: tight,
        sl_wide: wide,
    }
}

fn stops_from(price: f64, bias: Bias) -> (f64, f64) {
    match bias {
        Bias::Long => (round2(price - TIGHT_STOP), round2(price - WIDE_STOP)),
        Bias::Short => (round2(price + TIGHT_STOP), round2(price + WIDE_STOP)),
    }
}

/// Zone-aware trade plan used for message rendering.
pub fn trade_plan(signal: &Signal) -> TradePlan {
    let cv = signal.current_value;
    let pc = signal.previous_close;
    let high = signal.today_high;
    let low = signal.today_low;
    let nc = signal.net_change.abs();
    let zone = signal.zone();
    let bias = signal.bias;

    let (entries, tp1, tp2) = match (bias, zone) {
        (Bias::Long, CvZone::NearLows) => {
            let extension = cv + nc;
            (
                [plan_entry(cv, bias), plan_entry(low, bias)],
                high.max(extension),
                high.min(extension),
            )
        }
        (Bias::Long, _) => (
            [plan_entry(low, bias), plan_entry(pc, bias)],
            high,
            signal.take_profit,
        ),
        (Bias::Short, CvZone::NearHighs) => {
            let extension = cv - nc;
            (
                [plan_entry(cv, bias), plan_entry(high, bias)],
                low.min(extension),
                low.max(extension),
            )
        }
        (Bias::Short, _) => (
            [plan_entry(high, bias), plan_entry(pc, bias)],
            low,
            signal.take_profit,
        ),
    };

    TradePlan {
        zone,
        bias,
        entries,
        tp1: round2(tp1),
        tp2: round2(tp2),
        risky_play: risky_play(signal),
    }
}

/// Counter-trade at range extremes, extension otherwise.
pub fn risky_play(signal: &Signal) -> RiskyPlay {
    let cv = signal.current_value;
    let pc = signal.previous_close;
    let high = signal.today_high;
    let low = signal.today_low;
    let nc = signal.net_change.abs();

    let (direction, tp1, tp2) = match (signal.bias, signal.zone()) {
        (Bias::Long, CvZone::NearHighs) => {
            let tp1 = low.min(pc);
            (Bias::Short, tp1, tp1 - nc)
        }
        (Bias::Short, CvZone::NearLows) => {
            let tp1 = high.max(pc);
            (Bias::Long, tp1, tp1 + nc)
        }
        (Bias::Long, _) => (Bias::Long, high.max(pc), signal.take_profit),
        (Bias::Short, _) => {
            let tp1 = low.min(pc);
            (Bias::Short, tp1, tp1 - nc)
        }
    };

    let (sl_tight, sl_wide) = stops_from(cv, direction);

    RiskyPlay {
        direction,
        entry: round2(cv),
        tp1: round2(tp1),
        tp2: round2(tp2),
        sl_tight,
        sl_wide,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SentimentLabel, SentimentModel};
    use chrono::TimeZone;

    fn monday() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 7, 14, 15, 0, 0).unwrap()
    }

    fn bars(prev: (f64, f64, f64), cur: (f64, f64, f64)) -> Vec<OhlcBar> {
        // (high, low, close)
        vec![
            OhlcBar::new(0, prev.2, prev.0, prev.1, prev.2),
            OhlcBar::new(0, prev.2, cur.0, cur.1, cur.2),
        ]
    }

    fn sentiment(label: SentimentLabel, confidence: f64) -> SentimentResult {
        SentimentResult {
            score: 0.0,
            label,
            confidence,
            bullish_count: 0,
            bearish_count: 0,
            high_impact_count: 0,
            article_count: 3,
            model: SentimentModel::Keyword,
            news_hash: None,
        }
    }

    // =========================================================================
    // Core formula
    // =========================================================================

    #[test]
    fn test_nasdaq_long_example() {
        let bars = bars((44600.0, 44350.0, 44458.29), (44775.47, 44372.92, 44650.63));
        let signal = calculate_signal_at("^NDX", &bars, monday()).unwrap();

        assert_eq!(signal.bias, Bias::Long);
        assert_eq!(signal.display_name, "NAS100");
        assert_eq!(signal.net_change, 192.34);
        assert_eq!(signal.take_profit, 44842.97);
        assert_eq!(signal.today_high, 44775.47);
        assert_eq!(signal.today_low, 44350.0);
        assert_eq!(signal.entry1, 44350.0);
        assert_eq!(signal.entry2, 44650.63);
        assert_eq!(signal.sl_tight, 44250.0);
        assert_eq!(signal.sl_wide, 44150.0);
        assert_eq!(signal.timestamp, "14 July 2025");
        assert!(!signal.is_weekend_signal);
    }

    #[test]
    fn test_short_signal_levels() {
        let bars = bars((110.0, 95.0, 105.0), (106.0, 96.0, 100.0));
        let signal = calculate_signal_at("GC=F", &bars, monday()).unwrap();

        assert_eq!(signal.bias, Bias::Short);
        assert_eq!(signal.net_change, -5.0);
        assert_eq!(signal.take_profit, 95.0);
        assert_eq!(signal.entry1, 110.0);
        assert_eq!(signal.sl_tight, 210.0);
        assert_eq!(signal.sl_wide, 310.0);
        assert_eq!(signal.display_name, "GC=F");
    }

    #[test]
    fn test_zero_change_is_short() {
        let bars = bars((101.0, 99.0, 100.0), (101.0, 99.0, 100.0));
        let signal = calculate_signal_at("X", &bars, monday()).unwrap();
        assert_eq!(signal.bias, Bias::Short);
        assert_eq!(signal.take_profit, 100.0);
    }

    #[test]
    fn test_flat_range_position_is_half() {
        let bars = bars((100.0, 100.0, 100.0), (100.0, 100.0, 100.0));
        let signal = calculate_signal_at("X", &bars, monday()).unwrap();
        assert_eq!(signal.cv_position, 0.5);
        assert_eq!(signal.probability_percentage, 65);
    }

    #[test]
    fn test_insufficient_bars() {
        let one = vec![OhlcBar::new(0, 1.0, 1.0, 1.0, 1.0)];
        assert_eq!(
            calculate_signal_at("X", &one, monday()),
            Err(StrategyError::InsufficientData(1))
        );
        assert_eq!(
            calculate_signal_at("X", &[], monday()),
            Err(StrategyError::InsufficientData(0))
        );
    }

    #[test]
    fn test_nan_rejected() {
        let bars = bars((101.0, 99.0, 100.0), (101.0, f64::NAN, 100.0));
        assert_eq!(
            calculate_signal_at("X", &bars, monday()),
            Err(StrategyError::InvalidPrice(1))
        );
    }

    #[test]
    fn test_weekend_signal_rolls_to_monday() {
        let saturday = Utc.with_ymd_and_hms(2025, 7, 12, 10, 0, 0).unwrap();
        let bars = bars((101.0, 99.0, 100.0), (102.0, 99.0, 101.0));
        let signal = calculate_signal_at("X", &bars, saturday).unwrap();
        assert!(signal.is_weekend_signal);
        assert_eq!(signal.timestamp, "14 July 2025");
    }

    #[test]
    fn test_take_profit_property() {
        for (prev, cur) in [(100.0_f64, 130.5_f64), (250.25, 180.0), (44458.29, 44650.63), (1.0, 0.5)] {
            let bars = bars((prev.max(cur) + 10.0, prev.min(cur) - 10.0, prev), (prev.max(cur) + 5.0, prev.min(cur) - 5.0, cur));
            let signal = calculate_signal_at("X", &bars, monday()).unwrap();
            let nc = cur - prev;
            if nc > 0.0 {
                assert_eq!(signal.bias, Bias::Long);
                assert_eq!(signal.take_profit, round2(cur + nc));
            } else {
                assert_eq!(signal.bias, Bias::Short);
                assert_eq!(signal.take_profit, round2(cur - nc.abs()));
            }
            assert!((0.0..=1.0).contains(&signal.cv_position));
        }
    }

    // =========================================================================
    // Probability
    // =========================================================================

    #[test]
    fn test_base_probability() {
        assert_eq!(base_probability(0.1), 80);
        assert_eq!(base_probability(0.3), 80);
        assert_eq!(base_probability(0.5), 65);
        assert_eq!(base_probability(0.7), 80);
    }

    #[test]
    fn test_blend_agreement_and_conflict() {
        let bull = sentiment(SentimentLabel::Bullish, 60.0);
        let bear = sentiment(SentimentLabel::Bearish, 60.0);
        let neutral = sentiment(SentimentLabel::Neutral, 90.0);

        assert_eq!(blend_probability(80, Bias::Long, Some(&bull)), 85);
        assert_eq!(blend_probability(65, Bias::Long, Some(&bull)), 75);
        assert_eq!(blend_probability(80, Bias::Long, Some(&bear)), 65);
        assert_eq!(blend_probability(65, Bias::Short, Some(&bull)), 50);
        assert_eq!(blend_probability(65, Bias::Short, Some(&neutral)), 65);
        assert_eq!(blend_probability(65, Bias::Short, None), 65);
    }

    #[test]
    fn test_blend_high_confidence_bonus() {
        let bull = sentiment(SentimentLabel::Bullish, 85.0);
        assert_eq!(blend_probability(80, Bias::Long, Some(&bull)), 88);
        assert_eq!(blend_probability(65, Bias::Long, Some(&bull)), 78);

        // No bonus when the score did not rise
        let bear = sentiment(SentimentLabel::Bearish, 95.0);
        assert_eq!(blend_probability(80, Bias::Long, Some(&bear)), 65);
    }

    #[test]
    fn test_blend_always_in_bounds() {
        let labels = [
            SentimentLabel::Bullish,
            SentimentLabel::Bearish,
            SentimentLabel::Neutral,
            SentimentLabel::TechnicalOnly,
        ];
        for base in [65, 80] {
            for bias in [Bias::Long, Bias::Short] {
                for label in labels {
                    for confidence in [0.0, 50.0, 80.0, 100.0] {
                        let s = sentiment(label, confidence);
                        let p = blend_probability(base, bias, Some(&s));
                        assert!((MIN_PROBABILITY..=MAX_PROBABILITY).contains(&p));
                        assert!(p >= 45);
                    }
                }
            }
        }
    }

    #[test]
    fn test_apply_sentiment_updates_label() {
        // cv near the high, base 80
        let bars = bars((100.0, 90.0, 95.0), (101.0, 94.0, 100.0));
        let mut signal = calculate_signal_at("X", &bars, monday()).unwrap();
        assert_eq!(signal.probability_percentage, 80);

        apply_sentiment(&mut signal, sentiment(SentimentLabel::Bearish, 50.0));
        assert_eq!(signal.probability_percentage, 65);
        assert_eq!(signal.probability_label, ProbabilityLabel::Medium);
        assert!(signal.sentiment.is_some());
    }

    #[test]
    fn test_set_probability_clamps() {
        let bars = bars((100.0, 90.0, 95.0), (101.0, 94.0, 100.0));
        let mut signal = calculate_signal_at("X", &bars, monday()).unwrap();
        set_probability(&mut signal, 93.0);
        assert_eq!(signal.probability_percentage, 88);
        set_probability(&mut signal, 10.0);
        assert_eq!(signal.probability_percentage, 25);
    }

    // =========================================================================
    // Trade plan
    // =========================================================================

    #[test]
    fn test_plan_long_near_lows() {
        // range 100..200, cv 120 => position 0.2
        let bars = bars((200.0, 100.0, 110.0), (150.0, 100.0, 120.0));
        let signal = calculate_signal_at("X", &bars, monday()).unwrap();
        let plan = trade_plan(&signal);

        assert_eq!(plan.zone, CvZone::NearLows);
        assert_eq!(plan.entries[0].price, 120.0);
        assert_eq!(plan.entries[1].price, 100.0);
        assert_eq!(plan.entries[0].sl_tight, 20.0);
        assert_eq!(plan.entries[1].sl_wide, -100.0);
        assert_eq!(plan.tp1, 200.0);
        assert_eq!(plan.tp2, 130.0);
        // LONG away from highs extends the move
        assert_eq!(plan.risky_play.direction, Bias::Long);
        assert_eq!(plan.risky_play.tp1, 200.0);
        assert_eq!(plan.risky_play.tp2, 130.0);
        assert_eq!(plan.risky_play.sl_tight, 20.0);
    }

    #[test]
    fn test_plan_long_near_highs_counter_trade() {
        // range 100..200, cv 190 => position 0.9
        let bars = bars((180.0, 100.0, 150.0), (200.0, 140.0, 190.0));
        let signal = calculate_signal_at("X", &bars, monday()).unwrap();
        let plan = trade_plan(&signal);

        assert_eq!(plan.zone, CvZone::NearHighs);
        assert_eq!(plan.entries[0].price, 100.0);
        assert_eq!(plan.entries[1].price, 150.0);
        assert_eq!(plan.tp1, 200.0);
        assert_eq!(plan.tp2, 230.0);

        let risky = plan.risky_play;
        assert_eq!(risky.direction, Bias::Short);
        assert_eq!(risky.entry, 190.0);
        assert_eq!(risky.tp1, 100.0);
        assert_eq!(risky.tp2, 60.0);
        assert_eq!(risky.sl_tight, 290.0);
        assert_eq!(risky.sl_wide, 390.0);
    }

    #[test]
    fn test_plan_short_near_highs() {
        // range 100..200, cv 180 => position 0.8, down 10
        let bars = bars((200.0, 150.0, 190.0), (195.0, 100.0, 180.0));
        let signal = calculate_signal_at("X", &bars, monday()).unwrap();
        let plan = trade_plan(&signal);

        assert_eq!(signal.bias, Bias::Short);
        assert_eq!(plan.entries[0].price, 180.0);
        assert_eq!(plan.entries[1].price, 200.0);
        assert_eq!(plan.entries[1].sl_tight, 300.0);
        assert_eq!(plan.tp1, 100.0);
        assert_eq!(plan.tp2, 170.0);
        assert_eq!(plan.risky_play.direction, Bias::Short);
        assert_eq!(plan.risky_play.tp1, 100.0);
        assert_eq!(plan.risky_play.tp2, 90.0);
    }

    #[test]
    fn test_plan_short_near_lows_counter_trade() {
        // range 100..200, cv 110 => position 0.1, down 40
        let bars = bars((200.0, 140.0, 150.0), (160.0, 100.0, 110.0));
        let signal = calculate_signal_at("X", &bars, monday()).unwrap();
        let plan = trade_plan(&signal);

        assert_eq!(plan.entries[0].price, 200.0);
        assert_eq!(plan.entries[1].price, 150.0);
        assert_eq!(plan.tp1, 100.0);
        assert_eq!(plan.tp2, 70.0);

        let risky = plan.risky_play;
        assert_eq!(risky.direction, Bias::Long);
        assert_eq!(risky.tp1, 200.0);
        assert_eq!(risky.tp2, 240.0);
        assert_eq!(risky.sl_tight, 10.0);
        assert_eq!(risky.sl_wide, -90.0);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(display_name("^ndx"), "NAS100");
        assert_eq!(display_name("^IXIC"), "NAS100");
        assert_eq!(display_name("^DJI"), "US30");
        assert_eq!(display_name("SPX"), "SPX500");
        assert_eq!(display_name("GC=F"), "GC=F");
        assert_eq!(display_name("gc=f"), "gc=f");
    }
}
