//! US market calendar helpers.
//!
//! Session times are US Eastern (America/New_York, daylight saving aware).
//! Exchange holidays are not modelled.

use chrono::{DateTime, Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::{America::New_York, Tz};

use crate::types::{Countdown, MarketStatus, MarketTimer};

const SESSION_OPEN_MINUTES: i64 = 9 * 60 + 30;
const SESSION_CLOSE_MINUTES: i64 = 16 * 60;

/// A session boundary on an Eastern calendar date.
fn session_at(date: NaiveDate, minutes: i64) -> DateTime<Tz> {
    let local: NaiveDateTime = date.and_time(NaiveTime::MIN) + Duration::minutes(minutes);
    // Session times never fall inside a DST gap
    New_York
        .from_local_datetime(&local)
        .earliest()
        .unwrap_or_else(|| New_York.from_utc_datetime(&local))
}

pub fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

/// The trading date a signal generated on `date` applies to.
///
/// Saturday and Sunday roll forward to Monday. Returns the date and whether
/// it was rolled.
pub fn trading_date(date: NaiveDate) -> (NaiveDate, bool) {
    match date.weekday() {
        Weekday::Sat => (date + Duration::days(2), true),
        Weekday::Sun => (date + Duration::days(1), true),
        _ => (date, false),
    }
}

/// Format a trading date, e.g. "14 July 2025".
pub fn format_trading_date(date: NaiveDate) -> String {
    date.format("%d %B %Y").to_string()
}

/// Whether the US cash session is open.
pub fn is_market_open(now: DateTime<Utc>) -> bool {
    let local = now.with_timezone(&New_York);
    let today = local.date_naive();
    if is_weekend(today) {
        return false;
    }
    local >= session_at(today, SESSION_OPEN_MINUTES) && local < session_at(today, SESSION_CLOSE_MINUTES)
}

/// Countdown to the session close (when open) or the next open.
pub fn market_timer(now: DateTime<Utc>) -> MarketTimer {
    let local = now.with_timezone(&New_York);
    let today = local.date_naive();

    if !is_weekend(today) {
        let open = session_at(today, SESSION_OPEN_MINUTES);
        let close = session_at(today, SESSION_CLOSE_MINUTES);

        if local >= open && local < close {
            let total = (close - local).num_seconds();
            let countdown = split_seconds(total, false);
            let formatted = format_countdown(&countdown);
            return MarketTimer {
                status: MarketStatus::Open,
                total_seconds: total,
                message: format!("US Markets Open - {} remaining", formatted),
                formatted_time: formatted,
                countdown,
                next_open: None,
            };
        }

        if local < open {
            let total = (open - local).num_seconds();
            let countdown = split_seconds(total, false);
            let formatted = format_countdown(&countdown);
            return MarketTimer {
                status: MarketStatus::Closed,
                total_seconds: total,
                message: format!("US Markets Closed - Opens in {}", formatted),
                formatted_time: formatted,
                countdown,
                next_open: Some(open.format("%Y-%m-%d %H:%M ET").to_string()),
            };
        }
    }

    let mut next_day = today + Duration::days(1);
    while is_weekend(next_day) {
        next_day += Duration::days(1);
    }
    let next_open = session_at(next_day, SESSION_OPEN_MINUTES);
    let total = (next_open - local).num_seconds();
    let countdown = split_seconds(total, true);
    let formatted = format_countdown(&countdown);
    let weekend = if is_weekend(today) { " (Weekend)" } else { "" };

    MarketTimer {
        status: MarketStatus::Closed,
        total_seconds: total,
        message: format!(
            "US Markets Closed{} - Opens {}",
            weekend,
            next_open.format("%A, %B %d at %H:%M ET")
        ),
        formatted_time: formatted,
        countdown,
        next_open: Some(next_open.format("%Y-%m-%d %H:%M ET").to_string()),
    }
}

fn split_seconds(total: i64, with_days: bool) -> Countdown {
    let total = total.max(0);
    let (days, rest) = if with_days {
        (Some(total / 86_400), total % 86_400)
    } else {
        (None, total)
    };

    Countdown {
        days,
        hours: rest / 3600,
        minutes: (rest % 3600) / 60,
        seconds: rest % 60,
    }
}

fn format_countdown(c: &Countdown) -> String {
    match c.days {
        Some(d) => format!("{}d {:02}:{:02}:{:02}", d, c.hours, c.minutes, c.seconds),
        None => format!("{:02}:{:02}:{:02}", c.hours, c.minutes, c.seconds),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    #[test]
    fn test_trading_date_rolls_weekends() {
        // 2025-07-12 is a Saturday
        let sat = NaiveDate::from_ymd_opt(2025, 7, 12).unwrap();
        let sun = NaiveDate::from_ymd_opt(2025, 7, 13).unwrap();
        let mon = NaiveDate::from_ymd_opt(2025, 7, 14).unwrap();

        assert_eq!(trading_date(sat), (mon, true));
        assert_eq!(trading_date(sun), (mon, true));
        assert_eq!(trading_date(mon), (mon, false));
        assert_eq!(format_trading_date(mon), "14 July 2025");
    }

    #[test]
    fn test_is_market_open_summer() {
        // EDT, UTC-4. Monday 14:00 UTC = 10:00 ET
        assert!(is_market_open(utc(2025, 7, 14, 14, 0)));
        assert!(is_market_open(utc(2025, 7, 14, 13, 30)));
        // 09:00 ET
        assert!(!is_market_open(utc(2025, 7, 14, 13, 0)));
        // 16:15 ET
        assert!(!is_market_open(utc(2025, 7, 14, 20, 15)));
        // Saturday
        assert!(!is_market_open(utc(2025, 7, 12, 15, 0)));
    }

    #[test]
    fn test_is_market_open_winter() {
        // EST, UTC-5. Monday 13 January 2025
        assert!(!is_market_open(utc(2025, 1, 13, 14, 0)));
        assert!(is_market_open(utc(2025, 1, 13, 14, 30)));
        assert!(is_market_open(utc(2025, 1, 13, 20, 59)));
        assert!(!is_market_open(utc(2025, 1, 13, 21, 0)));
    }

    #[test]
    fn test_timer_open() {
        // 10:00 EDT, six hours to close
        let timer = market_timer(utc(2025, 7, 14, 14, 0));
        assert_eq!(timer.status, MarketStatus::Open);
        assert_eq!(timer.total_seconds, 6 * 3600);
        assert_eq!(timer.formatted_time, "06:00:00");
        assert!(timer.next_open.is_none());
    }

    #[test]
    fn test_timer_before_open() {
        // 09:00 EDT, thirty minutes to open
        let timer = market_timer(utc(2025, 7, 14, 13, 0));
        assert_eq!(timer.status, MarketStatus::Closed);
        assert_eq!(timer.total_seconds, 30 * 60);
        assert_eq!(timer.next_open.as_deref(), Some("2025-07-14 09:30 ET"));
    }

    #[test]
    fn test_timer_friday_evening_skips_weekend() {
        // Friday 17:00 EDT
        let timer = market_timer(utc(2025, 7, 11, 21, 0));
        assert_eq!(timer.status, MarketStatus::Closed);
        assert_eq!(timer.next_open.as_deref(), Some("2025-07-14 09:30 ET"));
        assert_eq!(timer.countdown.days, Some(2));
        assert_eq!(timer.formatted_time, "2d 16:30:00");
    }

    #[test]
    fn test_timer_across_dst_start() {
        // Friday 7 March 2025 16:00 EST to Monday 10 March 09:30 EDT
        let timer = market_timer(utc(2025, 3, 7, 21, 0));
        assert_eq!(timer.status, MarketStatus::Closed);
        assert_eq!(timer.next_open.as_deref(), Some("2025-03-10 09:30 ET"));
        assert_eq!(timer.formatted_time, "2d 16:30:00");
    }

    #[test]
    fn test_timer_weekend_message() {
        let timer = market_timer(utc(2025, 7, 12, 15, 0));
        assert!(timer.message.contains("(Weekend)"));
        assert_eq!(timer.next_open.as_deref(), Some("2025-07-14 09:30 ET"));
    }
}
