//! Market data facade over MarketWatch and Yahoo Finance.
//!
//! Index symbols MarketWatch covers are scraped first and fall back to Yahoo
//! hourly bars; everything else goes straight to Yahoo.

use dashmap::DashMap;
use tracing::{info, warn};

use super::marketwatch::{page_slug, MarketWatchClient};
use super::yahoo::YahooFinanceClient;
use crate::error::{AppError, Result};
use crate::types::{DataSource, Instrument, LiveQuote, MarketBars, Quote};

/// Bars needed by the signal formula.
const SIGNAL_BARS: usize = 2;

pub struct MarketDataService {
    yahoo: YahooFinanceClient,
    marketwatch: MarketWatchClient,
    /// Last good quote per instrument, served when a refresh fails.
    last_quotes: DashMap<Instrument, Quote>,
}

impl MarketDataService {
    pub fn new() -> Self {
        Self {
            yahoo: YahooFinanceClient::new(),
            marketwatch: MarketWatchClient::new(),
            last_quotes: DashMap::new(),
        }
    }

    /// Fetch the last two bars for a symbol.
    pub async fn fetch_signal_bars(&self, symbol: &str) -> Result<MarketBars> {
        if page_slug(symbol).is_some() {
            match self.marketwatch.fetch_bars(symbol).await {
                Ok(bars) => {
                    return Ok(MarketBars {
                        symbol: symbol.to_string(),
                        source: DataSource::MarketWatch,
                        bars,
                    })
                }
                Err(e) => warn!("MarketWatch failed for {}, falling back to Yahoo: {}", symbol, e),
            }
        }

        let bars = self.yahoo.fetch_bars(symbol, "7d", "1h").await?;
        if bars.len() < SIGNAL_BARS {
            return Err(AppError::ExternalApi(format!(
                "Only {} bars available for {}",
                bars.len(),
                symbol
            )));
        }

        let bars = bars[bars.len() - SIGNAL_BARS..].to_vec();
        info!("Fetched {} Yahoo bars for {}", bars.len(), symbol);
        Ok(MarketBars {
            symbol: symbol.to_string(),
            source: DataSource::Yahoo,
            bars,
        })
    }

    /// Quote for a tracked instrument. A failed refresh falls back to the
    /// last good quote, marked stale.
    pub async fn instrument_quote(&self, instrument: Instrument) -> Result<LiveQuote> {
        match self.yahoo.fetch_quote(instrument.symbol()).await {
            Ok(quote) => {
                self.last_quotes.insert(instrument, quote.clone());
                Ok(LiveQuote {
                    instrument,
                    stale: false,
                    quote,
                })
            }
            Err(e) => {
                warn!("Quote refresh failed for {}: {}", instrument.as_str(), e);
                self.cached_quote(instrument)
                    .map(|quote| LiveQuote {
                        instrument,
                        stale: true,
                        quote,
                    })
                    .ok_or(e)
            }
        }
    }

    /// Quotes for every tracked instrument; failures with no cache are left out.
    pub async fn live_quotes(&self) -> Vec<LiveQuote> {
        let mut quotes = Vec::with_capacity(Instrument::ALL.len());
        for instrument in Instrument::ALL {
            if let Ok(quote) = self.instrument_quote(instrument).await {
                quotes.push(quote);
            }
        }
        quotes
    }

    /// Cached quote without a network call.
    pub fn cached_quote(&self, instrument: Instrument) -> Option<Quote> {
        self.last_quotes.get(&instrument).map(|q| q.clone())
    }
}

impl Default for MarketDataService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cache_starts_empty() {
        let service = MarketDataService::new();
        assert!(service.cached_quote(Instrument::Gold).is_none());
    }

    #[test]
    fn test_cached_quote_roundtrip() {
        let service = MarketDataService::new();
        service
            .last_quotes
            .insert(Instrument::Dow, Quote::new("^DJI", 44000.0, 43900.0));
        let quote = service.cached_quote(Instrument::Dow).unwrap();
        assert_eq!(quote.symbol, "^DJI");
        assert_eq!(quote.change, 100.0);
    }
}
