//! Generative Language API backend for [`TextGenerator`].
//!
//! Sends a single-turn `generateContent` request and concatenates the text
//! parts of the first candidate.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use moto_core::config::GenerationSettings;

use crate::error::GenerationError;
use crate::generation::TextGenerator;

// =============================================================================
// Response schema
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    #[serde(default)]
    content: Option<Content>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// Map a non-success HTTP response to a typed error.
pub fn map_http_error(status: reqwest::StatusCode, body: &str) -> GenerationError {
    let detail = extract_error_message(body);
    match status.as_u16() {
        429 => GenerationError::RateLimited(detail),
        s => GenerationError::Status { status: s, message: detail },
    }
}

/// Pull `error.message` out of an API error body.
fn extract_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| {
            v.pointer("/error/message")
                .and_then(|m| m.as_str())
                .map(String::from)
        })
        .unwrap_or_else(|| {
            if body.is_empty() {
                "no response body".to_string()
            } else {
                body.chars().take(500).collect()
            }
        })
}

/// Extract the answer text from a successful response body.
fn parse_answer(body: &str) -> Result<String, GenerationError> {
    let response: GenerateResponse = serde_json::from_str(body)
        .map_err(|e| GenerationError::MalformedResponse(e.to_string()))?;

    if let Some(reason) = response
        .prompt_feedback
        .as_ref()
        .and_then(|f| f.block_reason.clone())
    {
        return Err(GenerationError::Blocked(reason));
    }

    let candidate = response
        .candidates
        .into_iter()
        .next()
        .ok_or_else(|| GenerationError::MalformedResponse("no candidates".to_string()))?;

    let text: String = candidate
        .content
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(match candidate.finish_reason.as_deref() {
            Some("SAFETY") | Some("PROHIBITED_CONTENT") | Some("BLOCKLIST") => {
                GenerationError::Blocked(candidate.finish_reason.unwrap_or_default())
            }
            _ => GenerationError::MalformedResponse("candidate has no text".to_string()),
        });
    }
    Ok(text)
}

// =============================================================================
// Generator
// =============================================================================

/// HTTP client for the Generative Language REST API.
pub struct GeminiGenerator {
    endpoint: String,
    api_key: String,
    client: reqwest::Client,
}

impl GeminiGenerator {
    /// Build a generator from resolved settings.
    pub fn new(settings: &GenerationSettings) -> Result<Self, GenerationError> {
        let mut builder = reqwest::Client::builder();
        if settings.connect_timeout_secs > 0 {
            builder = builder.connect_timeout(Duration::from_secs(settings.connect_timeout_secs));
        }
        let client = builder
            .build()
            .map_err(|e| GenerationError::Transport(e.to_string()))?;
        Ok(Self::with_client(settings, client))
    }

    pub fn with_client(settings: &GenerationSettings, client: reqwest::Client) -> Self {
        Self {
            endpoint: settings.endpoint.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            client,
        }
    }

    fn url(&self, model: &str) -> String {
        format!("{}/v1beta/models/{}:generateContent", self.endpoint, model)
    }
}

#[async_trait]
impl TextGenerator for GeminiGenerator {
    async fn generate(&self, model: &str, prompt: &str) -> Result<String, GenerationError> {
        let body = json!({
            "contents": [{ "parts": [{ "text": prompt }] }]
        });

        tracing::debug!(model, prompt_len = prompt.len(), "Sending generateContent request");

        let response = self
            .client
            .post(self.url(model))
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = %e, "generateContent request failed");
                GenerationError::Transport(e.to_string())
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| GenerationError::Transport(e.to_string()))?;

        if !status.is_success() {
            tracing::warn!(status = %status, "generateContent returned error");
            return Err(map_http_error(status, &text));
        }

        let answer = parse_answer(&text)?;
        tracing::debug!(answer_len = answer.len(), "generateContent answered");
        Ok(answer)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_answer_concatenates_parts() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"BDT "},{"text":"450,000"}]},"finishReason":"STOP"}]}"#;
        assert_eq!(parse_answer(body).unwrap(), "BDT 450,000");
    }

    #[test]
    fn test_parse_answer_uses_first_candidate() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"first"}]}},{"content":{"parts":[{"text":"second"}]}}]}"#;
        assert_eq!(parse_answer(body).unwrap(), "first");
    }

    #[test]
    fn test_parse_answer_no_candidates() {
        let err = parse_answer(r#"{"candidates":[]}"#).unwrap_err();
        assert!(matches!(err, GenerationError::MalformedResponse(_)));
    }

    #[test]
    fn test_parse_answer_prompt_blocked() {
        let body = r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#;
        assert_eq!(
            parse_answer(body).unwrap_err(),
            GenerationError::Blocked("SAFETY".to_string())
        );
    }

    #[test]
    fn test_parse_answer_candidate_blocked() {
        let body = r#"{"candidates":[{"finishReason":"SAFETY"}]}"#;
        assert_eq!(
            parse_answer(body).unwrap_err(),
            GenerationError::Blocked("SAFETY".to_string())
        );
    }

    #[test]
    fn test_parse_answer_empty_text() {
        let body = r#"{"candidates":[{"content":{"parts":[{"text":"  "}]},"finishReason":"MAX_TOKENS"}]}"#;
        assert!(matches!(
            parse_answer(body).unwrap_err(),
            GenerationError::MalformedResponse(_)
        ));
    }

    #[test]
    fn test_parse_answer_invalid_json() {
        assert!(matches!(
            parse_answer("<html>oops</html>").unwrap_err(),
            GenerationError::MalformedResponse(_)
        ));
    }

    #[test]
    fn test_map_http_error() {
        let body = r#"{"error":{"code":400,"message":"API key not valid.","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(
            map_http_error(reqwest::StatusCode::BAD_REQUEST, body),
            GenerationError::Status {
                status: 400,
                message: "API key not valid.".to_string()
            }
        );

        let err = map_http_error(reqwest::StatusCode::TOO_MANY_REQUESTS, "");
        assert_eq!(err, GenerationError::RateLimited("no response body".to_string()));

        let err = map_http_error(reqwest::StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(
            err,
            GenerationError::Status {
                status: 502,
                message: "upstream down".to_string()
            }
        );
    }
}
