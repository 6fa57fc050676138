use axum::async_trait;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tracing::{debug, error};

use crate::config::SuggestConfig;

const GEMINI_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";

#[derive(Debug, Clone)]
pub struct SamplingParams {
    pub temperature: f32,
    pub top_p: f32,
    pub max_output_tokens: u32,
}

impl Default for SamplingParams {
    fn default() -> Self {
        Self {
            temperature: 0.9,
            top_p: 0.95,
            max_output_tokens: 300,
        }
    }
}

#[derive(Debug, Error)]
pub enum SuggestError {
    #[error("AI service error: {message}")]
    Api {
        message: String,
        status: Option<u16>,
    },

    #[error("AI service unreachable: {0}")]
    Transport(#[from] reqwest::Error),
}

#[async_trait]
pub trait SuggestionClient: Send + Sync {
    async fn generate(&self, prompt: &str, params: &SamplingParams)
        -> Result<String, SuggestError>;
}

/// Suggestion provider backed by the Gemini `generateContent` REST API.
#[derive(Clone)]
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
}

impl GeminiClient {
    pub fn new(config: &SuggestConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
}

#[async_trait]
impl SuggestionClient for GeminiClient {
    async fn generate(
        &self,
        prompt: &str,
        params: &SamplingParams,
    ) -> Result<String, SuggestError> {
        let url = format!(
            "{}/{}:generateContent?key={}",
            GEMINI_BASE, self.model, self.api_key
        );
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }],
            "generationConfig": {
                "temperature": params.temperature,
                "topP": params.top_p,
                "maxOutputTokens": params.max_output_tokens,
            },
            "safetySettings": [
                { "category": "HARM_CATEGORY_HATE_SPEECH", "threshold": "BLOCK_LOW_AND_ABOVE" },
                { "category": "HARM_CATEGORY_HARASSMENT", "threshold": "BLOCK_LOW_AND_ABOVE" },
                { "category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": "BLOCK_LOW_AND_ABOVE" },
                { "category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": "BLOCK_LOW_AND_ABOVE" },
            ],
        });

        let res = self.http.post(&url).json(&body).send().await?;
        let status = res.status();

        if !status.is_success() {
            let message = match res.json::<GeminiErrorBody>().await {
                Ok(parsed) => parsed.error.message,
                Err(_) => format!("provider responded with {}", status),
            };
            error!(%status, message = %message, "gemini call failed");
            return Err(SuggestError::Api {
                message,
                status: Some(status.as_u16()),
            });
        }

        let parsed: GenerateResponse = res.json().await?;
        let text = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().next())
            .map(|p| p.text)
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(SuggestError::Api {
                message: "provider returned no candidates".into(),
                status: None,
            });
        }

        debug!(chars = text.len(), "gemini returned suggestion text");
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_sampling_params() {
        let params = SamplingParams::default();
        assert_eq!(params.temperature, 0.9);
        assert_eq!(params.top_p, 0.95);
        assert_eq!(params.max_output_tokens, 300);
    }

    #[test]
    fn generate_response_parses_candidate_text() {
        let raw = r#"{
            "candidates": [
                { "content": { "parts": [{ "text": "one||two||three" }] } }
            ]
        }"#;
        let parsed: GenerateResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.candidates[0].content.parts[0].text, "one||two||three");
    }

    #[test]
    fn generate_response_tolerates_missing_candidates() {
        let parsed: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.candidates.is_empty());
    }
}
