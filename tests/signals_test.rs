/**
 * Signal Formula Tests
 *
 * Tests for the Hybrid Math signal calculation including:
 * - Bias and take profit from the net change
 * - Range position and probability bounds
 * - Trade plan and risky play by zone
 * - Discord message round trip
 */

use bfi_signals::services::formatter::{format_discord, format_discord_simple, parse_simple};
use bfi_signals::services::strategy::{
    apply_sentiment, calculate_signal_at, risky_play, round2, set_probability, trade_plan,
};
use bfi_signals::types::{
    Bias, CvZone, FormatOptions, OhlcBar, ProbabilityLabel, SentimentLabel, SentimentModel,
    SentimentResult,
};
use chrono::{DateTime, TimeZone, Utc};

// =============================================================================
// Helpers
// =============================================================================

/// Monday 14 July 2025, 13:00 UTC.
fn monday() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 7, 14, 13, 0, 0).unwrap()
}

fn bars(previous_close: f64, current: f64, high: f64, low: f64) -> Vec<OhlcBar> {
    vec![
        OhlcBar::new(0, previous_close, high, low, previous_close),
        OhlcBar::new(1, previous_close, high, low, current),
    ]
}

fn sentiment(label: SentimentLabel, confidence: f64) -> SentimentResult {
    SentimentResult {
        score: match label {
            SentimentLabel::Bullish => 0.6,
            SentimentLabel::Bearish => -0.6,
            _ => 0.0,
        },
        label,
        confidence,
        bullish_count: 3,
        bearish_count: 1,
        high_impact_count: 0,
        article_count: 4,
        model: SentimentModel::Keyword,
        news_hash: None,
    }
}

// =============================================================================
// Formula properties
// =============================================================================

#[test]
fn test_reference_example() {
    let closes = [44458.29, 44650.63];
    let bars = vec![
        OhlcBar::new(0, 44400.0, 44500.0, 44300.0, closes[0]),
        OhlcBar::new(1, 44458.29, 44700.0, 44420.0, closes[1]),
    ];
    let signal = calculate_signal_at("^DJI", &bars, monday()).unwrap();

    assert_eq!(signal.net_change, 192.34);
    assert_eq!(signal.bias, Bias::Long);
    assert_eq!(signal.take_profit, 44842.97);
    assert_eq!(signal.display_name, "US30");
    assert_eq!(signal.timestamp, "14 July 2025");
    assert!(!signal.is_weekend_signal);
}

#[test]
fn test_positive_change_is_long() {
    for (pc, cv) in [(100.0, 101.0), (20000.0, 20150.5), (1.25, 1.26), (44000.0, 44999.99)] {
        let signal = calculate_signal_at("X", &bars(pc, cv, cv + 10.0, pc - 10.0), monday()).unwrap();
        assert_eq!(signal.bias, Bias::Long);
        assert_eq!(signal.take_profit, round2(cv + (cv - pc)));
    }
}

#[test]
fn test_negative_or_flat_change_is_short() {
    for (pc, cv) in [(101.0, 100.0), (20150.5, 20000.0), (500.0, 500.0)] {
        let signal = calculate_signal_at("X", &bars(pc, cv, pc + 10.0, cv - 10.0), monday()).unwrap();
        assert_eq!(signal.bias, Bias::Short);
        assert_eq!(signal.take_profit, round2(cv - (cv - pc).abs()));
    }
}

#[test]
fn test_cv_position_bounds() {
    let signal = calculate_signal_at("X", &bars(100.0, 105.0, 110.0, 90.0), monday()).unwrap();
    assert!((0.0..=1.0).contains(&signal.cv_position));
    assert!((signal.cv_position - 0.75).abs() < 1e-9);

    let flat = calculate_signal_at("X", &bars(100.0, 100.0, 100.0, 100.0), monday()).unwrap();
    assert_eq!(flat.cv_position, 0.5);
    assert_eq!(flat.probability_percentage, 65);
}

#[test]
fn test_probability_always_bounded() {
    let cases = [
        bars(100.0, 110.0, 111.0, 95.0),
        bars(100.0, 96.0, 111.0, 95.0),
        bars(100.0, 103.0, 111.0, 95.0),
    ];
    let labels = [
        SentimentLabel::Bullish,
        SentimentLabel::Bearish,
        SentimentLabel::Neutral,
        SentimentLabel::TechnicalOnly,
    ];

    for bars in &cases {
        for label in labels {
            for confidence in [0.0, 50.0, 80.0, 95.0] {
                let mut signal = calculate_signal_at("X", bars, monday()).unwrap();
                apply_sentiment(&mut signal, sentiment(label, confidence));
                assert!(
                    (25..=88).contains(&signal.probability_percentage),
                    "{:?} {} -> {}",
                    label,
                    confidence,
                    signal.probability_percentage
                );
            }
        }
    }

    let mut signal = calculate_signal_at("X", &cases[0], monday()).unwrap();
    set_probability(&mut signal, 140.0);
    assert_eq!(signal.probability_percentage, 88);
    set_probability(&mut signal, -3.0);
    assert_eq!(signal.probability_percentage, 25);
    assert_eq!(signal.probability_label, ProbabilityLabel::Medium);
}

#[test]
fn test_sentiment_agreement_and_contradiction() {
    // Near highs: base 80
    let base = bars(100.0, 110.0, 111.0, 95.0);

    let mut agree = calculate_signal_at("X", &base, monday()).unwrap();
    apply_sentiment(&mut agree, sentiment(SentimentLabel::Bullish, 60.0));
    assert_eq!(agree.probability_percentage, 85);
    assert_eq!(agree.probability_label, ProbabilityLabel::High);

    let mut contradict = calculate_signal_at("X", &base, monday()).unwrap();
    apply_sentiment(&mut contradict, sentiment(SentimentLabel::Bearish, 60.0));
    assert_eq!(contradict.probability_percentage, 65);
    assert_eq!(contradict.probability_label, ProbabilityLabel::Medium);

    let mut confident = calculate_signal_at("X", &base, monday()).unwrap();
    apply_sentiment(&mut confident, sentiment(SentimentLabel::Bullish, 90.0));
    assert_eq!(confident.probability_percentage, 88);
}

#[test]
fn test_weekend_rolls_forward() {
    let saturday = Utc.with_ymd_and_hms(2025, 7, 12, 10, 0, 0).unwrap();
    let signal = calculate_signal_at("^NDX", &bars(100.0, 101.0, 102.0, 99.0), saturday).unwrap();
    assert!(signal.is_weekend_signal);
    assert_eq!(signal.timestamp, "14 July 2025");
}

#[test]
fn test_insufficient_bars() {
    let one = vec![OhlcBar::new(0, 1.0, 1.0, 1.0, 1.0)];
    assert!(calculate_signal_at("X", &one, monday()).is_err());
    assert!(calculate_signal_at("X", &[], monday()).is_err());
}

// =============================================================================
// Trade plan
// =============================================================================

#[test]
fn test_long_near_highs_plan() {
    let signal = calculate_signal_at("X", &bars(20000.0, 20480.0, 20500.0, 19900.0), monday()).unwrap();
    assert_eq!(signal.zone(), CvZone::NearHighs);

    let plan = trade_plan(&signal);
    assert_eq!(plan.entries[0].price, 19900.0);
    assert_eq!(plan.entries[1].price, 20000.0);
    assert_eq!(plan.entries[0].sl_tight, 19800.0);
    assert_eq!(plan.entries[0].sl_wide, 19700.0);
    assert_eq!(plan.tp1, 20500.0);
    assert_eq!(plan.tp2, signal.take_profit);

    // Counter-trade sells from the current value
    let risky = risky_play(&signal);
    assert_eq!(risky.direction, Bias::Short);
    assert_eq!(risky.entry, 20480.0);
    assert_eq!(risky.tp1, 19900.0);
    assert_eq!(risky.tp2, 19420.0);
    assert_eq!(risky.sl_tight, 20580.0);
    assert_eq!(risky.sl_wide, 20680.0);
}

#[test]
fn test_short_near_highs_plan() {
    // cv position (20450-19900)/600 = 0.917
    let signal = calculate_signal_at("X", &bars(20480.0, 20450.0, 20500.0, 19900.0), monday()).unwrap();
    assert_eq!(signal.bias, Bias::Short);

    let plan = trade_plan(&signal);
    assert_eq!(plan.entries[0].price, 20450.0);
    assert_eq!(plan.entries[1].price, 20500.0);
    assert_eq!(plan.entries[0].sl_tight, 20550.0);
    // tp1 = min(low, cv - |nc|) = min(19900, 20420)
    assert_eq!(plan.tp1, 19900.0);
    assert_eq!(plan.tp2, 20420.0);
}

// =============================================================================
// Messages
// =============================================================================

#[test]
fn test_discord_round_trip() {
    for (pc, cv, high, low) in [
        (44458.29, 44650.63, 44700.0, 44420.0),
        (22855.6, 22780.45, 22901.12, 22701.07),
    ] {
        let signal = calculate_signal_at("^NDX", &bars(pc, cv, high, low), monday()).unwrap();
        let parsed = parse_simple(&format_discord_simple(&signal)).unwrap();

        assert_eq!(parsed.bias, signal.bias);
        assert_eq!(parsed.current_value, signal.current_value);
        assert_eq!(parsed.previous_close, signal.previous_close);
        assert_eq!(parsed.net_change, signal.net_change);
        assert_eq!(parsed.today_high, signal.today_high);
        assert_eq!(parsed.today_low, signal.today_low);
        assert_eq!(parsed.entry1, signal.entry1);
        assert_eq!(parsed.tp2, signal.tp2);
        assert_eq!(parsed.sl_wide, signal.sl_wide);
    }
}

#[test]
fn test_full_message_overrides() {
    let signal = calculate_signal_at("^NDX", &bars(20000.0, 20480.0, 20500.0, 19900.0), monday()).unwrap();

    let mut options = FormatOptions::default();
    options.overrides.tp1 = Some(20777.0);
    options.comments = Some("Watch the open".to_string());
    options.hide_risky_play = true;

    let message = format_discord(&signal, &options);
    assert!(message.contains("NAS100"));
    assert!(message.contains("20,777.00"));
    assert!(message.contains("Watch the open"));
}
