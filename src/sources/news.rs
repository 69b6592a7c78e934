//! RSS headline fetcher for news sentiment.
//!
//! Only `<item>` titles and descriptions are read from each feed.

use regex::Regex;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::{AppError, Result};
use crate::types::NewsArticle;

/// Max articles returned per symbol.
pub const MAX_ARTICLES: usize = 10;

/// Items taken from the top of each feed.
const ITEMS_PER_FEED: usize = 3;

const FEEDS: &[(&str, &str)] = &[
    ("https://feeds.reuters.com/reuters/businessNews", "Reuters Business"),
    ("https://www.cnbc.com/id/100003114/device/rss/rss.html", "CNBC Business"),
    ("https://feeds.marketwatch.com/marketwatch/marketpulse/", "MarketWatch"),
    ("https://www.ft.com/markets?format=rss", "Financial Times"),
    ("https://feeds.bbci.co.uk/news/business/rss.xml", "BBC Business"),
];

/// Generic market words that make any headline relevant.
const MARKET_TERMS: &[&str] = &[
    "market", "trading", "stocks", "index", "futures", "dow", "nasdaq", "tech", "financial",
    "economy", "fed", "rates",
];

/// Search terms for a trading symbol.
pub fn search_terms(symbol: &str) -> Vec<&'static str> {
    match symbol.trim().to_uppercase().as_str() {
        "US30" | "^DJI" | "DJI" => vec!["dow jones", "dow 30", "djia"],
        "^NDX" | "NDX" | "^IXIC" | "IXIC" | "NAS100" => vec!["nasdaq 100", "nasdaq", "ndx"],
        "SPX" | "^GSPC" | "SPX500" => vec!["s&p 500", "sp 500", "spx"],
        "GC=F" | "GOLD" | "XAUUSD" => vec!["gold price", "gold futures", "xau"],
        "CL=F" | "CRUDE" => vec!["oil price", "crude oil", "wti"],
        _ => Vec::new(),
    }
}

/// RSS news client.
pub struct NewsClient {
    client: Client,
}

impl NewsClient {
    pub fn new() -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .build()
            .unwrap_or_default();

        Self { client }
    }

    /// Fetch recent headlines relevant to a symbol.
    pub async fn fetch_articles(&self, symbol: &str) -> Vec<NewsArticle> {
        let mut terms: Vec<String> = search_terms(symbol).into_iter().map(String::from).collect();
        if terms.is_empty() {
            terms.push(symbol.trim_start_matches('^').to_lowercase());
        }

        let mut articles = Vec::new();
        for (url, source) in FEEDS {
            let parsed = match self.fetch_feed(url).await {
                Ok(body) => parse_feed(&body, source),
                Err(e) => Err(e.into()),
            };
            match parsed {
                Ok(items) => {
                    for article in items.into_iter().take(ITEMS_PER_FEED) {
                        if is_relevant(&article, &terms) || articles.len() < 2 {
                            articles.push(article);
                        }
                    }
                }
                Err(e) => warn!("Error fetching RSS from {}: {}", source, e),
            }
            if articles.len() >= MAX_ARTICLES {
                break;
            }
        }

        articles.truncate(MAX_ARTICLES);
        debug!("Fetched {} articles for {}", articles.len(), symbol);
        articles
    }

    async fn fetch_feed(&self, url: &str) -> std::result::Result<String, reqwest::Error> {
        self.client.get(url).send().await?.error_for_status()?.text().await
    }
}

impl Default for NewsClient {
    fn default() -> Self {
        Self::new()
    }
}

fn is_relevant(article: &NewsArticle, terms: &[String]) -> bool {
    let text = article.text();
    terms.iter().any(|t| text.contains(t.as_str())) || MARKET_TERMS.iter().any(|t| text.contains(t))
}

/// Compiled patterns for RSS items.
struct FeedPatterns {
    item: Regex,
    title: Regex,
    description: Regex,
    cdata: Regex,
    markup: Regex,
    whitespace: Regex,
}

impl FeedPatterns {
    fn new() -> std::result::Result<Self, regex::Error> {
        Ok(Self {
            item: Regex::new(r"(?is)<item\b[^>]*>(.*?)</item>")?,
            title: Regex::new(r"(?is)<title\b[^>]*>(.*?)</title>")?,
            description: Regex::new(r"(?is)<description\b[^>]*>(.*?)</description>")?,
            cdata: Regex::new(r"(?s)<!\[CDATA\[(.*?)\]\]>")?,
            markup: Regex::new(r"<[^>]*>")?,
            whitespace: Regex::new(r"\s+")?,
        })
    }

    /// Strip CDATA wrappers, markup and common entities.
    fn clean(&self, raw: &str) -> String {
        let text = self.cdata.replace_all(raw, "$1");
        let decoded = text
            .replace("&lt;", "<")
            .replace("&gt;", ">")
            .replace("&quot;", "\"")
            .replace("&#39;", "'")
            .replace("&apos;", "'")
            .replace("&nbsp;", " ");
        let plain = self.markup.replace_all(&decoded, " ").replace("&amp;", "&");
        self.whitespace.replace_all(plain.trim(), " ").into_owned()
    }

    fn field(&self, pattern: &Regex, item: &str) -> Option<String> {
        pattern.captures(item).map(|c| self.clean(&c[1]))
    }
}

/// Extract `<item>` entries from an RSS document.
pub fn parse_feed(xml: &str, source: &str) -> Result<Vec<NewsArticle>> {
    let patterns = FeedPatterns::new().map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(patterns
        .item
        .captures_iter(xml)
        .filter_map(|c| {
            let item = c.get(1)?.as_str();
            let title = patterns.field(&patterns.title, item)?;
            if title.is_empty() {
                return None;
            }
            let description = patterns
                .field(&patterns.description, item)
                .filter(|d| !d.is_empty())
                .unwrap_or_else(|| title.clone());
            Some(NewsArticle::new(title, description, source))
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"<?xml version="1.0"?>
<rss><channel>
<title>Feed title</title>
<item>
  <title><![CDATA[Nasdaq rallies as tech stocks surge]]></title>
  <description><![CDATA[<p>Shares <b>climb</b> after earnings beat &amp; upbeat guidance.</p>]]></description>
</item>
<item>
  <title>Fed holds rates steady</title>
</item>
<item>
  <title></title>
</item>
</channel></rss>"#;

    #[test]
    fn test_parse_feed() {
        let articles = parse_feed(SAMPLE, "Test").unwrap();
        assert_eq!(articles.len(), 2);
        assert_eq!(articles[0].title, "Nasdaq rallies as tech stocks surge");
        assert_eq!(
            articles[0].description,
            "Shares climb after earnings beat & upbeat guidance."
        );
        assert_eq!(articles[1].description, "Fed holds rates steady");
        assert_eq!(articles[1].source, "Test");
    }

    #[test]
    fn test_parse_feed_entities_and_attributes() {
        let xml = r#"<rss><channel><items>ignored</items>
<item id="1"><title type="text">Gold &amp; silver climb</title>
<description>&lt;p&gt;Safe-haven   demand&lt;/p&gt;</description></item>
</channel></rss>"#;
        let articles = parse_feed(xml, "Feed").unwrap();
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "Gold & silver climb");
        assert_eq!(articles[0].description, "Safe-haven demand");
    }

    #[test]
    fn test_search_terms() {
        assert_eq!(search_terms("^NDX")[0], "nasdaq 100");
        assert_eq!(search_terms("us30")[0], "dow jones");
        assert!(search_terms("AAPL").is_empty());
    }

    #[test]
    fn test_relevance() {
        let terms = vec!["gold price".to_string()];
        let gold = NewsArticle::new("Gold price hits record", "", "x");
        let market = NewsArticle::new("Stocks slip", "", "x");
        let other = NewsArticle::new("Local team wins", "", "x");
        assert!(is_relevant(&gold, &terms));
        assert!(is_relevant(&market, &terms));
        assert!(!is_relevant(&other, &terms));
    }
}
