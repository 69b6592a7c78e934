//! Signal message rendering for Discord and WhatsApp.
//!
//! Two Discord layouts exist: the full Hybrid Math breakdown and a compact
//! one-line-per-field message that [`parse_simple`] can read back.

use serde::Serialize;

use crate::services::strategy::{round2, trade_plan};
use crate::types::{Bias, CvZone, FormatOptions, ProbabilityLabel, Signal, TradePlan};

const DISCLAIMER: &str = "These signals are developed under the Bonang Finance Hybrid Math Strategy \
for VIP traders. Markets may behave differently depending on broker feeds. Use strict risk \
management and only trade what you can afford to lose.";

const SIGNATURE: &str = "*By Prophet Bonang @ Bonang Financial Institute - Trade at your own risk.*";

/// Status message severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusKind {
    #[default]
    Info,
    Warning,
    Error,
    Success,
}

impl StatusKind {
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "warning" | "warn" => StatusKind::Warning,
            "error" => StatusKind::Error,
            "success" => StatusKind::Success,
            _ => StatusKind::Info,
        }
    }

    pub fn prefix(&self) -> &'static str {
        match self {
            StatusKind::Info => "[INFO]",
            StatusKind::Warning => "[WARNING]",
            StatusKind::Error => "[ERROR]",
            StatusKind::Success => "[SUCCESS]",
        }
    }
}

/// Price with thousands separators and 2 decimals (`44,650.63`).
pub fn format_price(value: f64) -> String {
    let formatted = format!("{:.2}", value.abs());
    let (int_part, frac_part) = formatted.split_once('.').unwrap_or((formatted.as_str(), "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, c) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }

    let sign = if value < 0.0 && formatted.chars().any(|c| c.is_ascii_digit() && c != '0') {
        "-"
    } else {
        ""
    };
    format!("{}{}.{}", sign, grouped, frac_part)
}

/// Signed value with 2 decimals (`+192.34`).
fn format_signed(value: f64) -> String {
    format!("{:+.2}", value)
}

fn probability_label(label: ProbabilityLabel) -> &'static str {
    match label {
        ProbabilityLabel::High => "High",
        ProbabilityLabel::Medium => "Medium",
    }
}

fn probability_marker(probability: u32) -> &'static str {
    if probability >= 75 {
        "🔥"
    } else if probability >= 60 {
        "⚡"
    } else {
        "📊"
    }
}

fn date_header(signal: &Signal) -> String {
    if signal.is_weekend_signal {
        format!("{} (Weekend Signal for Monday Trading)", signal.timestamp)
    } else {
        signal.timestamp.clone()
    }
}

/// Strategy type, bias description and strategy logic lines.
fn strategy_text(signal: &Signal, zone: CvZone) -> (&'static str, String, &'static str) {
    match (signal.bias, zone) {
        (Bias::Long, CvZone::NearLows) => (
            "CV Low Range - Buy Zone",
            format!("Bullish (Net Change {}) - CV at Lows: Buy Zone Active", format_signed(signal.net_change)),
            "Conservative: Buy from CV/Low + Risky Play: Advanced targeting",
        ),
        (Bias::Long, _) => (
            "CV Middle/High Range - Wait for Pullback",
            format!("Bullish (Net Change {}) - Wait for Low Entry", format_signed(signal.net_change)),
            "Conservative: Wait for Low Entry + Risky Play: Buy from CV targeting Highs",
        ),
        (Bias::Short, CvZone::NearHighs) => (
            "CV High Range - Sell Zone",
            format!("Bearish (Net Change {}) - CV at Highs: Sell Zone Active", format_signed(signal.net_change)),
            "Conservative: Sell from CV/High + Risky Play: Advanced targeting",
        ),
        (Bias::Short, _) => (
            "CV Low/Middle Range - Wait for Bounce",
            format!("Bearish (Net Change {}) - Wait for High Entry", format_signed(signal.net_change)),
            "Conservative: Wait for High Entry + Risky Play: Sell from CV targeting Lows",
        ),
    }
}

/// Descriptions for entry 1, entry 2, TP1 and TP2.
fn plan_descriptions(plan: &TradePlan) -> [&'static str; 4] {
    match (plan.bias, plan.zone) {
        (Bias::Long, CvZone::NearLows) => [
            "Buy from CV (At Lows)",
            "Buy from Daily Low",
            "Higher Target",
            "Secondary",
        ],
        (Bias::Long, _) => [
            "Buy from Daily Low",
            "Buy from Previous Close",
            "Daily High (First Target)",
            "TP Calculation (Extended)",
        ],
        (Bias::Short, CvZone::NearHighs) => [
            "Sell from CV (At Highs)",
            "Sell from Daily High",
            "Lower Target",
            "Secondary",
        ],
        (Bias::Short, _) => [
            "Sell from Daily High",
            "Sell from Previous Close",
            "Daily Low (First Target)",
            "TP Calculation (Extended)",
        ],
    }
}

fn risky_section(signal: &Signal, plan: &TradePlan) -> String {
    let risky = &plan.risky_play;
    let counter = risky.direction != signal.bias;

    let (header, strategy) = match (risky.direction, counter) {
        (Bias::Short, true) => (
            "RISKY PLAY OPTION (Sell from CV, then Buy)",
            "Sell from CV targeting Lows, then Buy from Lows targeting Highs/Previous Close.",
        ),
        (Bias::Long, true) => (
            "RISKY PLAY OPTION (Buy from CV)",
            "Buy from CV/Lows targeting Highs/Previous Close based on highest value.",
        ),
        (Bias::Long, false) => (
            "RISKY PLAY OPTION (Buy from CV)",
            "Buy from CV targeting Daily High or Previous Close.",
        ),
        (Bias::Short, false) => (
            "RISKY PLAY OPTION (Sell from CV)",
            "Sell from CV targeting Daily Low or Previous Close.",
        ),
    };

    format!(
        "🚨 **{header}:**\n\
         💰 **Risky Entry:** {entry} ({action} from CV)\n\
         📈 **Risky TP1:** {tp1}\n\
         📉 **Risky TP2:** {tp2}\n\
         🛑 **Risky SL:** {tight} (Tight) | {wide} (Wide)\n\n\
         💡 **Risky Play Strategy:** {strategy}\n\n",
        header = header,
        entry = format_price(risky.entry),
        action = if risky.direction == Bias::Long { "Buy" } else { "Sell" },
        tp1 = format_price(risky.tp1),
        tp2 = format_price(risky.tp2),
        tight = format_price(risky.sl_tight),
        wide = format_price(risky.sl_wide),
        strategy = strategy,
    )
}

/// Full Hybrid Math Discord message.
pub fn format_discord(signal: &Signal, options: &FormatOptions) -> String {
    let mut plan = trade_plan(signal);
    let overrides = &options.overrides;
    let [entry1_desc, entry2_desc, mut tp1_desc, mut tp2_desc] = plan_descriptions(&plan);

    if let Some(tp1) = overrides.tp1 {
        plan.tp1 = round2(tp1);
        tp1_desc = "Manual TP1 (User Set)";
    }
    if let Some(tp2) = overrides.tp2 {
        plan.tp2 = round2(tp2);
        tp2_desc = "Manual TP2 (User Set)";
    }
    for entry in plan.entries.iter_mut() {
        if let Some(sl) = overrides.sl_tight {
            entry.sl_tight = round2(sl);
        }
        if let Some(sl) = overrides.sl_wide {
            entry.sl_wide = round2(sl);
        }
    }

    let zone = plan.zone;
    let (strategy_type, bias_text, strategy_logic) = strategy_text(signal, zone);
    let bias_marker = if signal.bias == Bias::Long { "✅" } else { "❌" };
    let sentiment = signal
        .sentiment
        .as_ref()
        .map(|s| s.label.as_str())
        .unwrap_or("Neutral");

    let tp_calculation = match signal.bias {
        Bias::Long => format!(
            "CV + Net Change = {} + {} = {}",
            format_price(signal.current_value),
            format_price(signal.net_change.abs()),
            format_price(signal.take_profit)
        ),
        Bias::Short => format!(
            "CV - Net Change = {} - {} = {}",
            format_price(signal.current_value),
            format_price(signal.net_change.abs()),
            format_price(signal.take_profit)
        ),
    };

    let mut message = String::new();
    message.push_str(&format!(
        "📈 **{} Signal - {}**\n\n",
        signal.display_name,
        date_header(signal)
    ));
    message.push_str("**Strategy:** The Hybrid Math Strategy by Bonang Financial Institute\n");
    message.push_str(&format!("**Type:** Dual Strategy: {}\n", strategy_type));
    message.push_str(&format!("**Market Bias:** {} {}\n", bias_marker, bias_text));
    message.push_str(&format!(
        "**Probability:** {} {}% ({}) | Sentiment: {}\n\n",
        probability_marker(signal.probability_percentage),
        signal.probability_percentage,
        probability_label(signal.probability_label),
        sentiment
    ));

    message.push_str("📊 **Core Data (Market Analyzed as 1 + 1):**\n");
    message.push_str(&format!(
        "Current Value (CV): {} | Previous Close: {}\n",
        format_price(signal.current_value),
        format_price(signal.previous_close)
    ));
    message.push_str(&format!(
        "Net Change: {} ({}%) | High: {} | Low: {}\n",
        format_signed(signal.net_change),
        format_signed(signal.change_pct),
        format_price(signal.today_high),
        format_price(signal.today_low)
    ));
    message.push_str(&format!(
        "CV Position: {:.1}% from daily low ({})\n\n",
        signal.cv_position * 100.0,
        zone.label()
    ));

    message.push_str(&format!("📈 **Take Profit Calculation:**\n{}\n\n", tp_calculation));
    message.push_str(&format!("🎯 **Strategy Logic:**\n{}\n\n", strategy_logic));

    message.push_str("🔹 **Entry Zones:**\n");
    message.push_str(&format!("Entry 1: {} ({})\n", format_price(plan.entries[0].price), entry1_desc));
    message.push_str(&format!("Entry 2: {} ({})\n\n", format_price(plan.entries[1].price), entry2_desc));

    message.push_str("🎯 **Take Profit Targets:**\n");
    message.push_str(&format!("TP1: {} ({})\n", format_price(plan.tp1), tp1_desc));
    message.push_str(&format!("TP2: {} ({})\n\n", format_price(plan.tp2), tp2_desc));

    message.push_str("🛡️ **Stop Loss:**\n");
    for (i, entry) in plan.entries.iter().enumerate() {
        message.push_str(&format!(
            "Entry {} - Tight SL: {} | Wide SL: {}\n",
            i + 1,
            format_price(entry.sl_tight),
            format_price(entry.sl_wide)
        ));
    }
    message.push('\n');

    if !options.hide_risky_play {
        message.push_str(&risky_section(signal, &plan));
    }

    if let Some(comments) = options.comments.as_deref().map(str::trim).filter(|c| !c.is_empty()) {
        message.push_str(&format!("📝 **Additional Analysis:**\n{}\n\n", comments));
    }

    message.push_str(
        "📋 **Key Rule:** Wait for optimal entry points. Use partial profit management for better risk-to-reward ratios.\n\n",
    );
    message.push_str(&format!("⚠️ **Risk Warning & Disclaimer:** {}\n\n", DISCLAIMER));
    message.push_str(SIGNATURE);
    message
}

/// Compact Discord message, one field per line.
pub fn format_discord_simple(signal: &Signal) -> String {
    let bias = signal.bias.as_str();
    [
        format!("[{}] **{} - {} Signal**", bias, signal.display_name, bias),
        format!("**Current Value:** {}", format_price(signal.current_value)),
        format!("**Previous Close:** {}", format_price(signal.previous_close)),
        format!(
            "**Net Change:** {} / {}%",
            format_signed(signal.net_change),
            format_signed(signal.change_pct)
        ),
        format!("**Today's High:** {}", format_price(signal.today_high)),
        format!("**Today's Low:** {}", format_price(signal.today_low)),
        format!(
            "**Entry Points:** {} | {}",
            format_price(signal.entry1),
            format_price(signal.entry2)
        ),
        format!(
            "**Take Profits:** {} | {}",
            format_price(signal.tp1),
            format_price(signal.tp2)
        ),
        format!(
            "**Stop Loss:** {} | {}",
            format_price(signal.sl_tight),
            format_price(signal.sl_wide)
        ),
        format!("*Generated: {}*", signal.timestamp),
    ]
    .join("\n")
}

/// Numeric fields read back from a compact message.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParsedSignal {
    pub display_name: String,
    pub bias: Bias,
    pub current_value: f64,
    pub previous_close: f64,
    pub net_change: f64,
    pub change_pct: f64,
    pub today_high: f64,
    pub today_low: f64,
    pub entry1: f64,
    pub entry2: f64,
    pub tp1: f64,
    pub tp2: f64,
    pub sl_tight: f64,
    pub sl_wide: f64,
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().trim_end_matches('%').replace(',', "").parse().ok()
}

fn field<'a>(message: &'a str, label: &str) -> Option<&'a str> {
    let marker = format!("**{}:**", label);
    message
        .lines()
        .find_map(|line| line.trim().strip_prefix(marker.as_str()))
        .map(str::trim)
}

fn pair(message: &str, label: &str, separator: &str) -> Option<(f64, f64)> {
    let (a, b) = field(message, label)?.split_once(separator)?;
    Some((parse_number(a)?, parse_number(b)?))
}

/// Read the numeric fields of a [`format_discord_simple`] message.
pub fn parse_simple(message: &str) -> Option<ParsedSignal> {
    let header = message.lines().next()?.trim();
    let rest = header.strip_prefix('[')?;
    let (bias, rest) = rest.split_once(']')?;
    let bias = Bias::from_str(bias)?;
    let title = rest.trim().trim_matches('*');
    let display_name = title.split(" - ").next()?.trim().to_string();

    let (net_change, change_pct) = pair(message, "Net Change", "/")?;
    let (entry1, entry2) = pair(message, "Entry Points", "|")?;
    let (tp1, tp2) = pair(message, "Take Profits", "|")?;
    let (sl_tight, sl_wide) = pair(message, "Stop Loss", "|")?;

    Some(ParsedSignal {
        display_name,
        bias,
        current_value: parse_number(field(message, "Current Value")?)?,
        previous_close: parse_number(field(message, "Previous Close")?)?,
        net_change,
        change_pct,
        today_high: parse_number(field(message, "Today's High")?)?,
        today_low: parse_number(field(message, "Today's Low")?)?,
        entry1,
        entry2,
        tp1,
        tp2,
        sl_tight,
        sl_wide,
    })
}

/// WhatsApp message (WhatsApp markdown uses single asterisks).
pub fn format_whatsapp(signal: &Signal) -> String {
    let plan = trade_plan(signal);
    let sentiment = signal
        .sentiment
        .as_ref()
        .map(|s| s.label.as_str())
        .unwrap_or("Neutral");

    let mut message = format!(
        "🚨 *{} {} SIGNAL* 🚨\n\n\
         📊 *Symbol:* {}\n\
         📅 *Date:* {}\n\
         💰 *Price:* {}\n\
         📈 *Action:* {}\n\
         🎯 *Confidence:* {}% ({})\n\
         🧭 *Sentiment:* {}\n\n",
        signal.display_name,
        signal.bias.as_str(),
        signal.display_name,
        date_header(signal),
        format_price(signal.current_value),
        signal.bias.action(),
        signal.probability_percentage,
        probability_label(signal.probability_label),
        sentiment,
    );

    message.push_str(&format!(
        "*Entries:* {} | {}\n*Targets:* {} | {}\n*Stop Loss:* {} | {}\n",
        format_price(plan.entries[0].price),
        format_price(plan.entries[1].price),
        format_price(plan.tp1),
        format_price(plan.tp2),
        format_price(plan.entries[0].sl_tight),
        format_price(plan.entries[0].sl_wide),
    ));
    message.push_str("\n⚠️ *BFI Signals - Trade at your own risk*");
    message
}

/// Status broadcast with a severity prefix.
pub fn format_status(message: &str, kind: StatusKind) -> String {
    format!("{} **BFI Signals Status**\n{}", kind.prefix(), message)
}
