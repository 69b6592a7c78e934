use serde::{Deserialize, Serialize};

use crate::types::Bias;

/// A news headline with optional summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsArticle {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub source: String,
}

impl NewsArticle {
    pub fn new(title: impl Into<String>, description: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            source: source.into(),
        }
    }

    /// Title and description, lowercased for matching.
    pub fn text(&self) -> String {
        format!("{} {}", self.title, self.description).to_lowercase()
    }
}

/// Sentiment direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SentimentLabel {
    Bullish,
    Bearish,
    Neutral,
    /// No news analysis was performed.
    #[serde(rename = "Technical Only")]
    TechnicalOnly,
}

impl SentimentLabel {
    pub fn from_score(score: f64) -> Self {
        if score > 0.2 {
            SentimentLabel::Bullish
        } else if score < -0.2 {
            SentimentLabel::Bearish
        } else {
            SentimentLabel::Neutral
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "bullish" | "positive" => SentimentLabel::Bullish,
            "bearish" | "negative" => SentimentLabel::Bearish,
            "technical only" => SentimentLabel::TechnicalOnly,
            _ => SentimentLabel::Neutral,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentLabel::Bullish => "Bullish",
            SentimentLabel::Bearish => "Bearish",
            SentimentLabel::Neutral => "Neutral",
            SentimentLabel::TechnicalOnly => "Technical Only",
        }
    }

    /// Whether the label points the same way as the bias.
    pub fn agrees_with(&self, bias: Bias) -> bool {
        matches!(
            (self, bias),
            (SentimentLabel::Bullish, Bias::Long) | (SentimentLabel::Bearish, Bias::Short)
        )
    }

    /// Whether the label points against the bias.
    pub fn contradicts(&self, bias: Bias) -> bool {
        matches!(
            (self, bias),
            (SentimentLabel::Bullish, Bias::Short) | (SentimentLabel::Bearish, Bias::Long)
        )
    }
}

/// Model that produced a sentiment result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SentimentModel {
    Gemini,
    OpenAi,
    Keyword,
    None,
}

impl SentimentModel {
    pub fn as_str(&self) -> &'static str {
        match self {
            SentimentModel::Gemini => "gemini",
            SentimentModel::OpenAi => "openai",
            SentimentModel::Keyword => "keyword",
            SentimentModel::None => "none",
        }
    }
}

/// Output of sentiment analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SentimentResult {
    /// Score in [-1, 1].
    pub score: f64,
    pub label: SentimentLabel,
    /// Confidence in [0, 100].
    pub confidence: f64,
    pub bullish_count: u32,
    pub bearish_count: u32,
    pub high_impact_count: u32,
    pub article_count: usize,
    pub model: SentimentModel,
    /// Hash of the analysed headlines.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub news_hash: Option<String>,
}

impl SentimentResult {
    /// Neutral result used when there is nothing to analyse.
    pub fn neutral() -> Self {
        Self {
            score: 0.0,
            label: SentimentLabel::Neutral,
            confidence: 50.0,
            bullish_count: 0,
            bearish_count: 0,
            high_impact_count: 0,
            article_count: 0,
            model: SentimentModel::None,
            news_hash: None,
        }
    }

    /// Placeholder when news analysis is disabled.
    pub fn technical_only() -> Self {
        Self {
            label: SentimentLabel::TechnicalOnly,
            confidence: 0.0,
            ..Self::neutral()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_thresholds() {
        assert_eq!(SentimentLabel::from_score(0.21), SentimentLabel::Bullish);
        assert_eq!(SentimentLabel::from_score(0.2), SentimentLabel::Neutral);
        assert_eq!(SentimentLabel::from_score(-0.2), SentimentLabel::Neutral);
        assert_eq!(SentimentLabel::from_score(-0.5), SentimentLabel::Bearish);
    }

    #[test]
    fn test_agreement() {
        assert!(SentimentLabel::Bullish.agrees_with(Bias::Long));
        assert!(SentimentLabel::Bearish.contradicts(Bias::Long));
        assert!(!SentimentLabel::Neutral.agrees_with(Bias::Short));
        assert!(!SentimentLabel::TechnicalOnly.contradicts(Bias::Short));
    }

    #[test]
    fn test_technical_only_serialization() {
        let json = serde_json::to_string(&SentimentLabel::TechnicalOnly).unwrap();
        assert_eq!(json, "\"Technical Only\"");
    }
}
