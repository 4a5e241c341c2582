//! Client for the Gemini generateContent REST API.
//!
//! Conversational turns go through [`GeminiClient::generate_reply`] with
//! the full role-tagged history; the simplify/analyze/explain operations
//! use single-shot [`GeminiClient::generate_once`] calls. The structured
//! operations parse the model's JSON and fall back to documented neutral
//! defaults when the reply is malformed, so callers never have to handle
//! a parse failure.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::conversation::ChatRole;
use crate::prompt;

const API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// A gateway failure, tagged with the operation that produced it.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("{operation}: request failed: {source}")]
    Transport {
        operation: &'static str,
        #[source]
        source: reqwest::Error,
    },

    #[error("{operation}: API error {status}: {body}")]
    Api {
        operation: &'static str,
        status: StatusCode,
        body: String,
    },

    #[error("{operation}: reply contained no text")]
    EmptyReply { operation: &'static str },
}

#[derive(Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig", skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
    #[serde(rename = "safetySettings", skip_serializing_if = "Option::is_none")]
    safety_settings: Option<Vec<SafetySetting>>,
}

#[derive(Serialize, Deserialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    #[serde(rename = "topP")]
    top_p: f32,
    #[serde(rename = "topK")]
    top_k: u32,
}

impl GenerationConfig {
    // Low temperature keeps replies consistent and focused
    fn chat() -> Self {
        Self {
            temperature: 0.2,
            max_output_tokens: 1000,
            top_p: 0.8,
            top_k: 40,
        }
    }
}

#[derive(Serialize)]
struct SafetySetting {
    category: &'static str,
    threshold: &'static str,
}

/// Moderate blocking across all four harm categories; not configurable
/// at runtime.
fn safety_settings() -> Vec<SafetySetting> {
    const CATEGORIES: [&str; 4] = [
        "HARM_CATEGORY_HARASSMENT",
        "HARM_CATEGORY_HATE_SPEECH",
        "HARM_CATEGORY_SEXUALLY_EXPLICIT",
        "HARM_CATEGORY_DANGEROUS_CONTENT",
    ];
    CATEGORIES
        .into_iter()
        .map(|category| SafetySetting {
            category,
            threshold: "BLOCK_MEDIUM_AND_ABOVE",
        })
        .collect()
}

#[derive(Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(api_key: &str, model: &str) -> Self {
        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            api_key: api_key.to_string(),
            model: model.to_string(),
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Multi-turn conversational completion. `new_prompt` should already
    /// carry the standing instructions (see [`prompt::chat_prompt`]);
    /// `history` is the prior role-tagged turns.
    pub async fn generate_reply(
        &self,
        history: &[(ChatRole, String)],
        new_prompt: &str,
    ) -> Result<String, GatewayError> {
        // The session opens with the assistant's greeting so the model
        // keeps its established persona across turns.
        let mut contents = vec![turn("model", prompt::GREETING)];
        for (role, text) in history {
            let tag = match role {
                ChatRole::User => "user",
                ChatRole::Assistant => "model",
            };
            contents.push(turn(tag, text));
        }
        contents.push(turn("user", new_prompt));

        let request = GenerateRequest {
            contents,
            generation_config: Some(GenerationConfig::chat()),
            safety_settings: Some(safety_settings()),
        };
        self.generate("reply", request).await
    }

    /// Single-shot completion with default generation parameters.
    pub async fn generate_once(
        &self,
        operation: &'static str,
        prompt_text: &str,
    ) -> Result<String, GatewayError> {
        let request = GenerateRequest {
            contents: vec![turn("user", prompt_text)],
            generation_config: None,
            safety_settings: None,
        };
        self.generate(operation, request).await
    }

    /// Score `text` for reading complexity. Malformed JSON from the
    /// model degrades to the neutral fallback report.
    pub async fn analyze_complexity(
        &self,
        text: &str,
    ) -> Result<ComplexityReport, GatewayError> {
        let reply = self
            .generate_once("analyze-complexity", &prompt::analyze_prompt(text))
            .await?;
        Ok(parse_complexity_report(&reply))
    }

    /// Explain the difficult words in `text`. Malformed JSON degrades to
    /// an empty explanation list.
    pub async fn explain_words(&self, text: &str) -> Result<WordExplanations, GatewayError> {
        let reply = self
            .generate_once("explain-words", &prompt::explain_prompt(text))
            .await?;
        Ok(parse_word_explanations(&reply))
    }

    async fn generate(
        &self,
        operation: &'static str,
        request: GenerateRequest,
    ) -> Result<String, GatewayError> {
        let url = format!(
            "{}/{}:generateContent?key={}",
            API_BASE, self.model, self.api_key
        );

        debug!(operation, model = %self.model, "gateway request");
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|source| GatewayError::Transport { operation, source })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(operation, %status, "gateway error");
            return Err(GatewayError::Api {
                operation,
                status,
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|source| GatewayError::Transport { operation, source })?;

        parsed
            .candidates
            .into_iter()
            .find_map(|c| c.content)
            .and_then(|content| content.parts.into_iter().next())
            .map(|part| part.text)
            .ok_or(GatewayError::EmptyReply { operation })
    }
}

fn turn(role: &str, text: &str) -> Content {
    Content {
        role: role.to_string(),
        parts: vec![Part {
            text: text.to_string(),
        }],
    }
}

/// Reading-complexity report for a piece of text.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexityReport {
    #[serde(default = "neutral_score")]
    pub complexity_score: u8,
    #[serde(default)]
    pub difficult_words: Vec<DifficultWord>,
    #[serde(default)]
    pub long_sentences: Vec<String>,
    #[serde(default)]
    pub suggestions: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DifficultWord {
    pub word: String,
    #[serde(default)]
    pub meaning: String,
    #[serde(default)]
    pub suggestion: String,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct WordExplanations {
    #[serde(default)]
    pub explanations: Vec<WordExplanation>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WordExplanation {
    pub word: String,
    #[serde(default)]
    pub explanation: String,
    #[serde(default)]
    pub alternatives: Vec<String>,
}

fn neutral_score() -> u8 {
    5
}

impl ComplexityReport {
    /// Neutral report returned when the model's JSON cannot be parsed.
    pub fn fallback() -> Self {
        Self {
            complexity_score: 5,
            difficult_words: Vec::new(),
            long_sentences: Vec::new(),
            suggestions: vec!["No specific suggestions available.".to_string()],
        }
    }
}

/// Parse a complexity report, degrading to the neutral fallback on
/// malformed JSON.
pub fn parse_complexity_report(reply: &str) -> ComplexityReport {
    match serde_json::from_str(strip_code_fence(reply)) {
        Ok(report) => report,
        Err(err) => {
            warn!(%err, "complexity reply was not valid JSON, using fallback");
            ComplexityReport::fallback()
        }
    }
}

/// Parse word explanations, degrading to an empty list on malformed JSON.
pub fn parse_word_explanations(reply: &str) -> WordExplanations {
    match serde_json::from_str(strip_code_fence(reply)) {
        Ok(explanations) => explanations,
        Err(err) => {
            warn!(%err, "explanation reply was not valid JSON, using fallback");
            WordExplanations::default()
        }
    }
}

/// Models often wrap JSON answers in a markdown code fence.
fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_complexity_report_valid() {
        let reply = r#"{
            "complexityScore": 8,
            "difficultWords": [{"word": "arduous", "meaning": "very hard", "suggestion": "hard"}],
            "longSentences": ["A very long sentence."],
            "suggestions": ["Use shorter words."]
        }"#;
        let report = parse_complexity_report(reply);
        assert_eq!(report.complexity_score, 8);
        assert_eq!(report.difficult_words[0].word, "arduous");
        assert_eq!(report.long_sentences.len(), 1);
    }

    #[test]
    fn test_parse_complexity_report_invalid_json_falls_back() {
        let report = parse_complexity_report("The text is quite complex, I'd say 8/10.");
        assert_eq!(report, ComplexityReport::fallback());
        assert_eq!(report.complexity_score, 5);
        assert!(report.difficult_words.is_empty());
        assert!(report.long_sentences.is_empty());
        assert_eq!(
            report.suggestions,
            vec!["No specific suggestions available.".to_string()]
        );
    }

    #[test]
    fn test_parse_complexity_report_fenced_json() {
        let reply = "```json\n{\"complexityScore\": 3}\n```";
        let report = parse_complexity_report(reply);
        assert_eq!(report.complexity_score, 3);
        assert!(report.suggestions.is_empty());
    }

    #[test]
    fn test_parse_word_explanations_invalid_json_falls_back() {
        let explanations = parse_word_explanations("no JSON here");
        assert!(explanations.explanations.is_empty());
    }

    #[test]
    fn test_parse_word_explanations_valid() {
        let reply = r#"{"explanations": [{"word": "verbose", "explanation": "using too many words", "alternatives": ["wordy"]}]}"#;
        let parsed = parse_word_explanations(reply);
        assert_eq!(parsed.explanations.len(), 1);
        assert_eq!(parsed.explanations[0].alternatives, vec!["wordy"]);
    }

    #[test]
    fn test_strip_code_fence_passthrough() {
        assert_eq!(strip_code_fence("  {\"a\": 1} "), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```{\"a\": 1}```"), "{\"a\": 1}");
    }
}
