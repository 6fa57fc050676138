use axum::{extract::State, http::StatusCode, Json};
use rand::Rng;
use serde::Serialize;
use time::OffsetDateTime;
use tracing::instrument;

use crate::{
    error::ApiError,
    state::AppState,
    suggest::client::{SamplingParams, SuggestError},
};

/// Literal separator the provider is instructed to place between suggestions.
pub const SUGGESTION_DELIMITER: &str = "||";

#[derive(Debug, Serialize)]
pub struct SuggestResponse {
    pub success: bool,
    pub suggestions: Vec<String>,
}

impl From<SuggestError> for ApiError {
    fn from(err: SuggestError) -> Self {
        match err {
            SuggestError::Api { message, status } => ApiError::Dependency {
                message: format!("AI service error: {}", message),
                status: status.and_then(|s| StatusCode::from_u16(s).ok()),
            },
            SuggestError::Transport(e) => ApiError::Dependency {
                message: format!("AI service unreachable: {}", e),
                status: None,
            },
        }
    }
}

pub fn split_suggestions(text: &str) -> Vec<String> {
    text.split(SUGGESTION_DELIMITER)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

pub fn build_prompt() -> String {
    // Timestamp and seed keep repeated calls from collapsing onto the same output.
    let timestamp = OffsetDateTime::now_utc().unix_timestamp();
    let seed: u32 = rand::thread_rng().gen_range(0..1_000_000);

    format!(
        "Generate 3 unique, creative, and engaging conversation starters for an anonymous messaging platform.\n\n\
        Context: People use this to send anonymous feedback, questions, or thoughts to each other. The questions should encourage meaningful, positive interactions.\n\n\
        Requirements:\n\
        - Each question must be completely different from typical Q&A formats\n\
        - Vary the question types: some introspective, some creative, some about experiences\n\
        - Make them thought-provoking but accessible to all ages\n\
        - Avoid generic questions about hobbies, skills, or instruments\n\
        - Focus on unique angles that spark genuine curiosity\n\
        - Keep each question under 15 words\n\n\
        Format: Separate each question with '{delim}' (no spaces around the separators)\n\n\
        Timestamp: {timestamp}\n\
        Seed: {seed}\n\n\
        Generate fresh, unique questions now:",
        delim = SUGGESTION_DELIMITER,
    )
}

#[instrument(skip(state))]
pub async fn suggest_messages(
    State(state): State<AppState>,
) -> Result<Json<SuggestResponse>, ApiError> {
    let prompt = build_prompt();
    let text = state
        .suggestions
        .generate(&prompt, &SamplingParams::default())
        .await?;

    let suggestions = split_suggestions(&text);
    if suggestions.is_empty() {
        return Err(ApiError::Dependency {
            message: "AI service returned no suggestions".into(),
            status: None,
        });
    }

    Ok(Json(SuggestResponse {
        success: true,
        suggestions,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_on_delimiter_and_trims() {
        let parsed = split_suggestions(
            "What made you smile today?|| If you could relive one day, which?  ||What do you value most?",
        );
        assert_eq!(
            parsed,
            vec![
                "What made you smile today?",
                "If you could relive one day, which?",
                "What do you value most?",
            ]
        );
    }

    #[test]
    fn drops_empty_segments() {
        assert_eq!(split_suggestions("a||||b||  ||c"), vec!["a", "b", "c"]);
        assert!(split_suggestions("").is_empty());
        assert!(split_suggestions("  || ").is_empty());
    }

    #[test]
    fn single_suggestion_without_delimiter_survives() {
        assert_eq!(split_suggestions("just one question"), vec!["just one question"]);
    }

    #[test]
    fn prompt_instructs_the_delimiter() {
        let prompt = build_prompt();
        assert!(prompt.contains("'||'"));
        assert!(prompt.contains("Generate 3 unique"));
    }

    #[test]
    fn suggest_error_maps_upstream_status() {
        let err: ApiError = SuggestError::Api {
            message: "quota exceeded".into(),
            status: Some(429),
        }
        .into();
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
