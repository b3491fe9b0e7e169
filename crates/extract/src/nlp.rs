use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Token {
    pub text: String,
    pub lemma: String,
    /// Universal POS tag (`VERB`, `NOUN`, ...)
    pub pos: String,
    /// Trailing whitespace
    #[serde(default)]
    pub ws: String,
}

/// Half-open token range `[start, end)`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SentenceSpan {
    pub start: usize,
    pub end: usize,
    #[serde(default)]
    pub text: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EntityMention {
    pub text: String,
    pub label: String,
    /// Token range `[start, end)`
    pub start: usize,
    pub end: usize,
    #[serde(default)]
    pub start_char: usize,
    #[serde(default)]
    pub end_char: usize,
}

/// Output of the language-analysis service for one text
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalyzedText {
    #[serde(default)]
    pub tokens: Vec<Token>,
    #[serde(default)]
    pub sentences: Vec<SentenceSpan>,
    #[serde(default)]
    pub entities: Vec<EntityMention>,
    #[serde(default)]
    pub noun_chunks: Vec<String>,
}

impl AnalyzedText {
    /// Text of a sentence, rebuilt from its tokens when the service omitted it
    pub fn sentence_text(&self, sentence: &SentenceSpan) -> String {
        if !sentence.text.is_empty() {
            return sentence.text.clone();
        }
        let end = sentence.end.min(self.tokens.len());
        let start = sentence.start.min(end);
        self.tokens[start..end]
            .iter()
            .map(|t| format!("{}{}", t.text, t.ws))
            .collect::<String>()
            .trim()
            .to_string()
    }
}

/// Named-entity recognition plus syntactic parsing.
#[async_trait]
pub trait LanguageAnalyzer: Send + Sync {
    async fn analyze(&self, text: &str) -> Result<AnalyzedText>;
}

/// Client for an HTTP NLP service exposing `POST /analyze`.
#[derive(Clone)]
pub struct NlpClient {
    base_url: String,
    client: reqwest::Client,
}

#[derive(Serialize)]
struct AnalyzeRequest<'a> {
    text: &'a str,
}

impl NlpClient {
    pub fn new(base_url: String) -> Self {
        Self::with_timeout(base_url, Duration::from_secs(120))
    }

    pub fn with_timeout(base_url: String, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        }
    }
}

impl Default for NlpClient {
    fn default() -> Self {
        Self::new("http://localhost:8080".to_string())
    }
}

#[async_trait]
impl LanguageAnalyzer for NlpClient {
    async fn analyze(&self, text: &str) -> Result<AnalyzedText> {
        let url = format!("{}/analyze", self.base_url);

        let response = self.client
            .post(&url)
            .json(&AnalyzeRequest { text })
            .send()
            .await
            .context("Failed to send request to NLP service")?;

        if !response.status().is_success() {
            anyhow::bail!("NLP request failed: {}", response.status());
        }

        let analyzed: AnalyzedText = response
            .json()
            .await
            .context("Failed to parse NLP response")?;

        Ok(analyzed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_service_response_with_missing_fields() {
        let json = r#"{
            "tokens": [
                {"text": "Alice", "lemma": "Alice", "pos": "PROPN", "ws": " "},
                {"text": "sings", "lemma": "sing", "pos": "VERB"}
            ],
            "sentences": [{"start": 0, "end": 2}],
            "entities": [{"text": "Alice", "label": "PERSON", "start": 0, "end": 1, "start_char": 0, "end_char": 5}]
        }"#;

        let analyzed: AnalyzedText = serde_json::from_str(json).unwrap();

        assert!(analyzed.noun_chunks.is_empty());
        assert_eq!(analyzed.sentence_text(&analyzed.sentences[0]), "Alice sings");
    }

    #[test]
    fn test_sentence_text_clamps_out_of_range_spans() {
        let analyzed = AnalyzedText::default();
        let span = SentenceSpan { start: 3, end: 10, text: String::new() };

        assert_eq!(analyzed.sentence_text(&span), "");
    }
}
