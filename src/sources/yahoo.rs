//! Yahoo Finance chart API client.
//!
//! Provides intraday OHLC bars and quote snapshots for indices and futures
//! through the unofficial chart endpoint.

use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::error::{AppError, Result};
use crate::types::{OhlcBar, Quote};

/// Yahoo Finance chart response.
#[derive(Debug, Deserialize)]
struct YahooChartResponse {
    chart: YahooChart,
}

#[derive(Debug, Deserialize)]
struct YahooChart {
    result: Option<Vec<YahooResult>>,
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
struct YahooError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct YahooResult {
    meta: YahooMeta,
    timestamp: Option<Vec<i64>>,
    indicators: YahooIndicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YahooMeta {
    regular_market_price: Option<f64>,
    chart_previous_close: Option<f64>,
    previous_close: Option<f64>,
    regular_market_day_high: Option<f64>,
    regular_market_day_low: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct YahooIndicators {
    quote: Vec<YahooQuote>,
}

#[derive(Debug, Deserialize)]
struct YahooQuote {
    open: Option<Vec<Option<f64>>>,
    high: Option<Vec<Option<f64>>>,
    low: Option<Vec<Option<f64>>>,
    close: Option<Vec<Option<f64>>>,
}

/// Parsed chart payload.
#[derive(Debug, Clone)]
pub struct ChartData {
    pub bars: Vec<OhlcBar>,
    pub price: Option<f64>,
    pub previous_close: Option<f64>,
    pub day_high: Option<f64>,
    pub day_low: Option<f64>,
}

/// Normalize a symbol for the chart URL path.
/// Share classes use hyphens (BRK-B) and index/futures markers are escaped.
fn normalize_yahoo_symbol(symbol: &str) -> String {
    symbol
        .trim()
        .to_uppercase()
        .replace('.', "-")
        .replace('^', "%5E")
        .replace('=', "%3D")
}

/// Parse a chart API body.
///
/// Rows with any missing or non-positive price are skipped.
pub fn parse_chart(body: &str) -> Result<ChartData> {
    let data: YahooChartResponse = serde_json::from_str(body)?;

    if let Some(error) = data.chart.error {
        return Err(AppError::ExternalApi(format!(
            "Yahoo API error: {} - {}",
            error.code, error.description
        )));
    }

    let result = data
        .chart
        .result
        .and_then(|r| r.into_iter().next())
        .ok_or_else(|| AppError::ExternalApi("No results in response".to_string()))?;

    let timestamps = result.timestamp.unwrap_or_default();
    let quote = result.indicators.quote.into_iter().next();

    let mut bars = Vec::new();
    if let Some(quote) = quote {
        let opens = quote.open.unwrap_or_default();
        let highs = quote.high.unwrap_or_default();
        let lows = quote.low.unwrap_or_default();
        let closes = quote.close.unwrap_or_default();

        for (i, &timestamp) in timestamps.iter().enumerate() {
            let row = (
                opens.get(i).copied().flatten(),
                highs.get(i).copied().flatten(),
                lows.get(i).copied().flatten(),
                closes.get(i).copied().flatten(),
            );
            let (Some(open), Some(high), Some(low), Some(close)) = row else {
                continue;
            };
            if close <= 0.0 || high <= 0.0 || low <= 0.0 {
                continue;
            }
            bars.push(OhlcBar::new(timestamp, open, high, low, close));
        }
    }

    let meta = result.meta;
    Ok(ChartData {
        bars,
        price: meta.regular_market_price,
        previous_close: meta.previous_close.or(meta.chart_previous_close),
        day_high: meta.regular_market_day_high,
        day_low: meta.regular_market_day_low,
    })
}

/// Yahoo Finance API client.
pub struct YahooFinanceClient {
    client: Client,
}

impl YahooFinanceClient {
    /// Create a new Yahoo Finance client.
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .unwrap_or_default();

        Self { client }
    }

    /// Fetch chart data for a symbol.
    ///
    /// Arguments:
    /// - range: Time range ("1d", "5d", "7d", "1mo", ...)
    /// - interval: Bar interval ("1m", "5m", "1h", "1d", ...)
    pub async fn fetch_chart(&self, symbol: &str, range: &str, interval: &str) -> Result<ChartData> {
        let url = format!(
            "https://query1.finance.yahoo.com/v8/finance/chart/{}?range={}&interval={}&includePrePost=false",
            normalize_yahoo_symbol(symbol),
            range,
            interval
        );

        debug!("Fetching Yahoo Finance data: {}", url);

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(AppError::ExternalApi(format!(
                "Yahoo API error for {}: {}",
                symbol,
                response.status()
            )));
        }

        let body = response.text().await?;
        parse_chart(&body)
    }

    /// OHLC bars for a symbol, null rows skipped.
    pub async fn fetch_bars(&self, symbol: &str, range: &str, interval: &str) -> Result<Vec<OhlcBar>> {
        Ok(self.fetch_chart(symbol, range, interval).await?.bars)
    }

    /// Current quote from chart metadata, falling back to the last bars.
    pub async fn fetch_quote(&self, symbol: &str) -> Result<Quote> {
        let chart = self.fetch_chart(symbol, "5d", "1d").await?;
        quote_from_chart(symbol, &chart)
            .ok_or_else(|| AppError::ExternalApi(format!("No price data for {}", symbol)))
    }
}

impl Default for YahooFinanceClient {
    fn default() -> Self {
        Self::new()
    }
}

/// Build a quote from chart metadata or the trailing daily bars.
pub fn quote_from_chart(symbol: &str, chart: &ChartData) -> Option<Quote> {
    let last = chart.bars.last();
    let price = chart.price.or_else(|| last.map(|b| b.close))?;
    let previous_close = chart
        .previous_close
        .or_else(|| chart.bars.iter().rev().nth(1).map(|b| b.close))
        .unwrap_or(price);

    let mut quote = Quote::new(symbol, price, previous_close);
    quote.day_high = chart.day_high.or_else(|| last.map(|b| b.high));
    quote.day_low = chart.day_low.or_else(|| last.map(|b| b.low));
    Some(quote)
}
