//! LLM sentiment clients (Gemini and OpenAI REST).
//!
//! Both vendors get the same prompt asking for a JSON verdict; the reply is
//! unwrapped from any Markdown fence and parsed into a [`SentimentResult`].

use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

use crate::types::{NewsArticle, SentimentLabel, SentimentModel, SentimentResult};

const GEMINI_API_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-1.5-flash-latest:generateContent";
const OPENAI_API_URL: &str = "https://api.openai.com/v1/chat/completions";
const OPENAI_MODEL: &str = "gpt-3.5-turbo";

/// Headlines included in the prompt.
const PROMPT_ARTICLES: usize = 10;
/// Summary characters included per headline.
const SUMMARY_CHARS: usize = 200;

/// JSON verdict requested from the model.
#[derive(Debug, Deserialize)]
struct LlmVerdict {
    sentiment_score: f64,
    sentiment_label: String,
    confidence: f64,
    #[serde(default)]
    bullish_signals: u32,
    #[serde(default)]
    bearish_signals: u32,
    #[serde(default)]
    high_impact_signals: u32,
}

// Gemini wire types

#[derive(Debug, Serialize)]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiPart {
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: GeminiContent,
}

// OpenAI wire types

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f64,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

fn http_client() -> Client {
    Client::builder()
        .timeout(Duration::from_secs(30))
        .build()
        .unwrap_or_default()
}

/// Build the sentiment prompt for a symbol.
pub fn build_prompt(articles: &[NewsArticle], symbol: &str) -> String {
    let mut headlines = String::new();
    for (i, article) in articles.iter().take(PROMPT_ARTICLES).enumerate() {
        headlines.push_str(&format!("{}. {}\n", i + 1, article.title));
        if article.description.len() > article.title.len() {
            let preview: String = article.description.chars().take(SUMMARY_CHARS).collect();
            let ellipsis = if article.description.chars().count() > SUMMARY_CHARS { "..." } else { "" };
            headlines.push_str(&format!("   Summary: {}{}\n", preview, ellipsis));
        }
        headlines.push('\n');
    }

    format!(
        r#"Analyze these financial news headlines for {symbol} trading sentiment:

{headlines}
Return ONLY a JSON object with this exact format:
{{
    "sentiment_score": <number between -1.0 and 1.0>,
    "sentiment_label": "<Bullish/Bearish/Neutral>",
    "confidence": <number between 0 and 100>,
    "bullish_signals": <count of bullish indicators>,
    "bearish_signals": <count of bearish indicators>,
    "high_impact_signals": <count of high-impact news>
}}

Where sentiment_score runs from -1.0 (very bearish) to +1.0 (very bullish) and
confidence reflects news clarity and consistency."#
    )
}

/// Remove a surrounding ```json / ``` fence.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let inner = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// Parse a model reply into a sentiment result.
pub fn parse_verdict(reply: &str, model: SentimentModel, article_count: usize) -> Result<SentimentResult> {
    let verdict: LlmVerdict =
        serde_json::from_str(strip_code_fences(reply)).context("Model reply is not valid JSON")?;

    let score = verdict.sentiment_score.clamp(-1.0, 1.0);
    let label = match SentimentLabel::from_str(&verdict.sentiment_label) {
        SentimentLabel::TechnicalOnly => SentimentLabel::from_score(score),
        label => label,
    };

    Ok(SentimentResult {
        score: (score * 100.0).round() / 100.0,
        label,
        confidence: verdict.confidence.clamp(0.0, 100.0),
        bullish_count: verdict.bullish_signals,
        bearish_count: verdict.bearish_signals,
        high_impact_count: verdict.high_impact_signals,
        article_count,
        model,
        news_hash: None,
    })
}

/// Gemini REST client.
pub struct GeminiClient {
    client: Client,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: http_client(),
            api_key,
        }
    }

    pub async fn analyze_sentiment(&self, articles: &[NewsArticle], symbol: &str) -> Result<SentimentResult> {
        let request = GeminiRequest {
            contents: vec![GeminiContent {
                parts: vec![GeminiPart {
                    text: build_prompt(articles, symbol),
                }],
            }],
        };

        let response = self
            .client
            .post(GEMINI_API_URL)
            .query(&[("key", &self.api_key)])
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("Gemini API error: {}", response.status()));
        }

        let body: GeminiResponse = response.json().await?;
        let text = body
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .ok_or_else(|| anyhow!("Gemini returned no candidates"))?;

        debug!("Gemini reply for {}: {} chars", symbol, text.len());
        parse_verdict(&text, SentimentModel::Gemini, articles.len())
    }
}

/// OpenAI chat completions client.
pub struct OpenAiClient {
    client: Client,
    api_key: String,
}

impl OpenAiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: http_client(),
            api_key,
        }
    }

    pub async fn analyze_sentiment(&self, articles: &[NewsArticle], symbol: &str) -> Result<SentimentResult> {
        let request = ChatRequest {
            model: OPENAI_MODEL,
            messages: vec![
                ChatMessage {
                    role: "system".to_string(),
                    content: "You are a financial news sentiment analyst. Reply with JSON only.".to_string(),
                },
                ChatMessage {
                    role: "user".to_string(),
                    content: build_prompt(articles, symbol),
                },
            ],
            temperature: 0.2,
        };

        let response = self
            .client
            .post(OPENAI_API_URL)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(anyhow!("OpenAI API error: {}", response.status()));
        }

        let body: ChatResponse = response.json().await?;
        let text = body
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| anyhow!("OpenAI returned no choices"))?;

        parse_verdict(&text, SentimentModel::OpenAi, articles.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {\"b\":2} "), "{\"b\":2}");
    }

    #[test]
    fn test_parse_verdict() {
        let reply = r#"```json
{
  "sentiment_score": 0.65,
  "sentiment_label": "Bullish",
  "confidence": 82,
  "bullish_signals": 4,
  "bearish_signals": 1,
  "high_impact_signals": 2,
  "analysis_summary": "Tech strength"
}
```"#;
        let result = parse_verdict(reply, SentimentModel::Gemini, 5).unwrap();
        assert_eq!(result.label, SentimentLabel::Bullish);
        assert_eq!(result.score, 0.65);
        assert_eq!(result.confidence, 82.0);
        assert_eq!(result.bullish_count, 4);
        assert_eq!(result.high_impact_count, 2);
        assert_eq!(result.article_count, 5);
        assert_eq!(result.model, SentimentModel::Gemini);
    }

    #[test]
    fn test_parse_verdict_clamps_and_rejects() {
        let reply = r#"{"sentiment_score": -3.0, "sentiment_label": "bearish", "confidence": 140}"#;
        let result = parse_verdict(reply, SentimentModel::OpenAi, 1).unwrap();
        assert_eq!(result.score, -1.0);
        assert_eq!(result.confidence, 100.0);
        assert_eq!(result.label, SentimentLabel::Bearish);

        assert!(parse_verdict("not json", SentimentModel::OpenAi, 1).is_err());
    }

    #[test]
    fn test_prompt_includes_headlines() {
        let articles = vec![NewsArticle::new(
            "Nasdaq climbs",
            "Nasdaq climbs as chipmakers extend their rally into the close",
            "x",
        )];
        let prompt = build_prompt(&articles, "^NDX");
        assert!(prompt.contains("1. Nasdaq climbs"));
        assert!(prompt.contains("Summary: Nasdaq climbs as chipmakers"));
        assert!(prompt.contains("^NDX"));
    }
}
