//! MarketWatch index page scraper.
//!
//! Reads previous close, last price and day range from the public quote page
//! and turns them into two synthetic bars for the signal formula.

use regex::Regex;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info};

use crate::error::{AppError, Result};
use crate::types::OhlcBar;

const BASE_URL: &str = "https://www.marketwatch.com/investing/index";

/// Values scraped from an index page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct IndexSnapshot {
    pub previous_close: f64,
    pub price: f64,
    pub day_low: f64,
    pub day_high: f64,
}

impl IndexSnapshot {
    /// Previous bar closes at the previous close; the current bar opens there
    /// and closes at the last price. Both span the day range.
    pub fn to_bars(&self) -> Vec<OhlcBar> {
        let high = self.day_high.max(self.day_low);
        let low = self.day_low.min(self.day_high);
        vec![
            OhlcBar::new(0, self.previous_close, high, low, self.previous_close),
            OhlcBar::new(0, self.previous_close, high, low, self.price),
        ]
    }
}

/// Page slug for a symbol, if MarketWatch covers it.
pub fn page_slug(symbol: &str) -> Option<&'static str> {
    match symbol.trim().to_uppercase().as_str() {
        "US30" | "^DJI" | "DJI" | "$DOWI" | "DOWI" | "DJIA" => Some("djia"),
        "^NDX" | "NDX" | "NAS100" => Some("ndx"),
        "^IXIC" | "IXIC" | "COMP" => Some("comp"),
        "^GSPC" | "SPX" | "SPX500" => Some("spx"),
        _ => None,
    }
}

/// MarketWatch client.
pub struct MarketWatchClient {
    client: Client,
}

impl MarketWatchClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
            )
            .build()
            .unwrap_or_default();

        Self { client }
    }

    /// Scrape an index page.
    pub async fn fetch_index(&self, symbol: &str) -> Result<IndexSnapshot> {
        let slug = page_slug(symbol)
            .ok_or_else(|| AppError::BadRequest(format!("MarketWatch does not cover {}", symbol)))?;
        let url = format!("{}/{}", BASE_URL, slug);

        debug!("Scraping MarketWatch: {}", url);

        let response = self
            .client
            .get(&url)
            .header("Accept", "text/html,application/xhtml+xml")
            .header("Accept-Language", "en-US,en;q=0.9")
            .header("Referer", "https://www.google.com/")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AppError::ExternalApi(format!(
                "MarketWatch returned {} for {}",
                response.status(),
                slug
            )));
        }

        let html = response.text().await?;
        let snapshot = parse_index_page(&html)?;
        info!(
            "MarketWatch {}: price {:.2}, previous close {:.2}, range {:.2} - {:.2}",
            slug, snapshot.price, snapshot.previous_close, snapshot.day_low, snapshot.day_high
        );
        Ok(snapshot)
    }

    /// Scrape and convert to two bars.
    pub async fn fetch_bars(&self, symbol: &str) -> Result<Vec<OhlcBar>> {
        Ok(self.fetch_index(symbol).await?.to_bars())
    }
}

impl Default for MarketWatchClient {
    fn default() -> Self {
        Self::new()
    }
}

const NUMBER: &str = r"(\d[\d,]*(?:\.\d+)?)";

/// Compiled patterns for the quote page fields.
struct IndexPatterns {
    number: Regex,
    price_meta: Regex,
    tag: Regex,
    previous_close: Regex,
    day_range: Regex,
}

impl IndexPatterns {
    fn new() -> std::result::Result<Self, regex::Error> {
        Ok(Self {
            number: Regex::new(NUMBER)?,
            price_meta: Regex::new(
                r#"(?i)<meta\b[^>]*\bname\s*=\s*"price"[^>]*\bcontent\s*=\s*"([^"]*)"|<meta\b[^>]*\bcontent\s*=\s*"([^"]*)"[^>]*\bname\s*=\s*"price""#,
            )?,
            tag: Regex::new(r"<[^>]*>")?,
            previous_close: Regex::new(&format!(r"(?i)previous\s+close\D{{0,80}}?{}", NUMBER))?,
            day_range: Regex::new(&format!(
                r"(?i)day\s+range\D{{0,80}}?{}\s*-\s*{}",
                NUMBER, NUMBER
            ))?,
        })
    }
}

fn parse_number(raw: &str) -> Option<f64> {
    raw.replace(',', "").parse().ok()
}

/// Extract the quote fields from page HTML.
pub fn parse_index_page(html: &str) -> Result<IndexSnapshot> {
    let patterns = IndexPatterns::new().map_err(|e| AppError::Internal(e.to_string()))?;
    let missing = |field: &str| AppError::ExternalApi(format!("MarketWatch page has no {}", field));

    let price = patterns
        .price_meta
        .captures(html)
        .and_then(|c| c.get(1).or_else(|| c.get(2)))
        .and_then(|m| patterns.number.find(m.as_str()))
        .and_then(|m| parse_number(m.as_str()))
        .ok_or_else(|| missing("price"))?;

    let text = patterns.tag.replace_all(html, " ");

    let previous_close = patterns
        .previous_close
        .captures(&text)
        .and_then(|c| parse_number(&c[1]))
        .ok_or_else(|| missing("previous close"))?;

    let (day_low, day_high) = patterns
        .day_range
        .captures(&text)
        .and_then(|c| Some((parse_number(&c[1])?, parse_number(&c[2])?)))
        .ok_or_else(|| missing("day range"))?;

    Ok(IndexSnapshot {
        previous_close,
        price,
        day_low,
        day_high,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<html><head>
<meta name="price" content="22,845.13">
<meta name="priceChange" content="127.40">
</head><body>
<div class="intraday__data"><bg-quote class="value">22,845.13</bg-quote></div>
<ul class="list list--kv">
  <li class="kv__item"><small class="label">Open</small><span class="primary">22,730.05</span></li>
  <li class="kv__item"><small class="label">Day Range</small><span class="primary">22,701.40 - 22,880.96</span></li>
</ul>
<table><tr><td>Previous Close</td><td>22,717.73</td></tr></table>
</body></html>"#;

    #[test]
    fn test_page_slug() {
        assert_eq!(page_slug("^DJI"), Some("djia"));
        assert_eq!(page_slug("us30"), Some("djia"));
        assert_eq!(page_slug("$DOWI"), Some("djia"));
        assert_eq!(page_slug("^NDX"), Some("ndx"));
        assert_eq!(page_slug("^IXIC"), Some("comp"));
        assert_eq!(page_slug("SPX"), Some("spx"));
        assert_eq!(page_slug("GC=F"), None);
    }

    #[test]
    fn test_parse_index_page() {
        let snapshot = parse_index_page(PAGE).unwrap();
        assert_eq!(snapshot.price, 22845.13);
        assert_eq!(snapshot.previous_close, 22717.73);
        assert_eq!(snapshot.day_low, 22701.40);
        assert_eq!(snapshot.day_high, 22880.96);
    }

    #[test]
    fn test_parse_missing_field() {
        let page = r#"<meta name="price" content="100.00"><p>Previous Close 99.00</p>"#;
        let err = parse_index_page(page).unwrap_err();
        assert!(err.to_string().contains("day range"));
    }

    #[test]
    fn test_to_bars() {
        let snapshot = IndexSnapshot {
            previous_close: 100.0,
            price: 105.0,
            day_low: 98.0,
            day_high: 106.0,
        };
        let bars = snapshot.to_bars();
        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].close, 100.0);
        assert_eq!(bars[1].open, 100.0);
        assert_eq!(bars[1].close, 105.0);
        assert_eq!(bars[1].high, 106.0);
        assert_eq!(bars[1].low, 98.0);
    }

    #[test]
    fn test_parse_non_ascii_text() {
        let page = r#"<meta content="1,240.00" name="price">
<p>İİİ Previous Close 1234.50</p><p>Day Range 1,220.10 - 1,250.75</p>"#;
        let snapshot = parse_index_page(page).unwrap();
        assert_eq!(snapshot.price, 1240.0);
        assert_eq!(snapshot.previous_close, 1234.5);
        assert_eq!(snapshot.day_low, 1220.1);
        assert_eq!(snapshot.day_high, 1250.75);
    }

    #[test]
    fn test_parse_number() {
        assert_eq!(parse_number("1,234.50"), Some(1234.5));
        assert_eq!(parse_number("n/a"), None);
    }
}
