//! News sentiment scoring.
//!
//! Headlines are scored by an LLM when a key is configured (Gemini first,
//! then OpenAI) and by keyword counting otherwise.

use sha2::{Digest, Sha256};
use tracing::{debug, info, warn};

use crate::config::LlmConfig;
use crate::sources::{GeminiClient, NewsClient, OpenAiClient};
use crate::types::{NewsArticle, SentimentLabel, SentimentModel, SentimentResult};

const BULLISH_KEYWORDS: &[&str] = &[
    "bullish", "rally", "surge", "gain", "rise", "climb", "advance", "boost", "strong", "positive",
    "optimistic", "upgrade", "growth", "recovery", "breakout", "momentum", "support", "buying",
    "uptrend", "bull market", "earnings beat", "profit", "revenue growth", "expansion", "merger",
    "acquisition", "dividend", "buyback", "investment", "partnership",
];

const BEARISH_KEYWORDS: &[&str] = &[
    "bearish", "fall", "drop", "decline", "plunge", "crash", "sell-off", "weak", "negative",
    "pessimistic", "downgrade", "recession", "crisis", "breakdown", "resistance", "selling",
    "downtrend", "bear market", "earnings miss", "loss", "revenue decline", "contraction",
    "bankruptcy", "layoffs", "debt", "inflation", "interest rates", "concern", "risk",
];

const HIGH_IMPACT_KEYWORDS: &[&str] = &[
    "federal reserve", "fed", "inflation", "interest rates", "gdp", "unemployment", "earnings",
    "guidance", "forecast", "outlook", "economic data", "trade war", "geopolitical", "oil prices",
    "cryptocurrency", "nasdaq", "dow jones", "sp 500", "s&p 500",
];

const BASE_CONFIDENCE: f64 = 50.0;
const MAX_CONFIDENCE: f64 = 95.0;

fn count_hits(text: &str, keywords: &[&str]) -> u32 {
    keywords.iter().filter(|k| text.contains(*k)).count() as u32
}

/// Keyword counting scorer.
#[derive(Debug, Default, Clone, Copy)]
pub struct KeywordAnalyzer;

impl KeywordAnalyzer {
    /// Score articles by substring keyword hits.
    pub fn analyze(&self, articles: &[NewsArticle]) -> SentimentResult {
        if articles.is_empty() {
            return SentimentResult::neutral();
        }

        let (mut bullish, mut bearish, mut high_impact) = (0u32, 0u32, 0u32);
        for article in articles {
            let text = article.text();
            bullish += count_hits(&text, BULLISH_KEYWORDS);
            bearish += count_hits(&text, BEARISH_KEYWORDS);
            high_impact += count_hits(&text, HIGH_IMPACT_KEYWORDS);
        }

        let hits = bullish + bearish;
        let score = if hits == 0 {
            0.0
        } else {
            (bullish as f64 - bearish as f64) / hits as f64
        };

        let mut confidence = (BASE_CONFIDENCE + hits as f64 * 5.0).min(MAX_CONFIDENCE);
        if high_impact > 0 {
            confidence = (confidence + high_impact as f64 * 10.0).min(MAX_CONFIDENCE);
        }

        SentimentResult {
            score: (score * 100.0).round() / 100.0,
            label: SentimentLabel::from_score(score),
            confidence,
            bullish_count: bullish,
            bearish_count: bearish,
            high_impact_count: high_impact,
            article_count: articles.len(),
            model: SentimentModel::Keyword,
            news_hash: None,
        }
    }
}

/// Stable hash of the analysed headlines.
pub fn news_hash(articles: &[NewsArticle]) -> String {
    let mut hasher = Sha256::new();
    for article in articles {
        hasher.update(article.title.as_bytes());
        hasher.update(b"\n");
    }
    hex::encode(hasher.finalize())
}

/// Fetches headlines and scores them.
pub struct SentimentService {
    news: NewsClient,
    gemini: Option<GeminiClient>,
    openai: Option<OpenAiClient>,
    keywords: KeywordAnalyzer,
}

impl SentimentService {
    pub fn new(config: &LlmConfig) -> Self {
        Self {
            news: NewsClient::new(),
            gemini: config.gemini_api_key.clone().map(GeminiClient::new),
            openai: config.openai_api_key.clone().map(OpenAiClient::new),
            keywords: KeywordAnalyzer,
        }
    }

    /// Fetch news for a symbol and score it.
    pub async fn analyze(&self, symbol: &str) -> SentimentResult {
        let articles = self.news.fetch_articles(symbol).await;
        self.analyze_articles(&articles, symbol).await
    }

    /// Score already fetched articles.
    pub async fn analyze_articles(&self, articles: &[NewsArticle], symbol: &str) -> SentimentResult {
        if articles.is_empty() {
            info!("No news articles for {}, using neutral sentiment", symbol);
            return SentimentResult::neutral();
        }

        let hash = news_hash(articles);
        let mut result = self.score(articles, symbol).await;
        result.news_hash = Some(hash);

        info!(
            "Sentiment for {}: {} (score {:.2}, confidence {:.0}%, model {})",
            symbol,
            result.label.as_str(),
            result.score,
            result.confidence,
            result.model.as_str()
        );
        result
    }

    async fn score(&self, articles: &[NewsArticle], symbol: &str) -> SentimentResult {
        if let Some(gemini) = &self.gemini {
            match gemini.analyze_sentiment(articles, symbol).await {
                Ok(result) => return result,
                Err(e) => warn!("Gemini analysis failed for {}: {}", symbol, e),
            }
        }

        if let Some(openai) = &self.openai {
            match openai.analyze_sentiment(articles, symbol).await {
                Ok(result) => return result,
                Err(e) => warn!("OpenAI analysis failed for {}: {}", symbol, e),
            }
        }

        debug!("Keyword sentiment for {}", symbol);
        self.keywords.analyze(articles)
    }
}
