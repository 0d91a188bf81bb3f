//! Model client — the single point of entry for all generative-language API
//! calls in JobHub.
//!
//! ARCHITECTURAL RULE: no other module may call the Gemini API directly.
//! All model interactions MUST go through the [`GenerativeModel`] trait so
//! handlers and the stream parser can be exercised against fakes.
//!
//! Model: gemini-2.0-flash (hardcoded — do not make configurable to prevent
//! drift between the blocking and streaming paths).

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta/models";
/// The model used for all generation calls.
pub const MODEL: &str = "gemini-2.0-flash";
const MAX_RETRIES: u32 = 3;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("Model returned empty content")]
    EmptyContent,

    #[error("Stream error: {0}")]
    Stream(String),
}

/// A lazy, finite, non-restartable sequence of raw text fragments from the
/// model. Fragment boundaries carry no meaning; a delimiter marker may be
/// split across two fragments.
pub type FragmentStream = BoxStream<'static, Result<String, ModelError>>;

/// The generative-model seam. Carried in `AppState` as `Arc<dyn GenerativeModel>`
/// so chat handlers can be tested without network access.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// Returns the complete response text in one call.
    async fn generate(&self, prompt: &str) -> Result<String, ModelError>;

    /// Returns response text incrementally as the remote service produces it.
    async fn generate_stream(&self, prompt: &str) -> Result<FragmentStream, ModelError>;
}

// ────────────────────────────────────────────────────────────────────────────
// Wire types (Gemini generateContent / streamGenerateContent)
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
}

#[derive(Debug, Serialize)]
struct Content<'a> {
    role: &'a str,
    parts: Vec<Part<'a>>,
}

#[derive(Debug, Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenates the text of all parts of the first candidate.
    fn text(&self) -> Option<String> {
        let content = self.candidates.first()?.content.as_ref()?;
        let mut out = String::new();
        for part in &content.parts {
            if let Some(t) = &part.text {
                out.push_str(t);
            }
        }
        if out.is_empty() {
            None
        } else {
            Some(out)
        }
    }
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    message: String,
}

// ────────────────────────────────────────────────────────────────────────────
// Client
// ────────────────────────────────────────────────────────────────────────────

/// HTTP client for the Gemini REST API. Retries the blocking path on 429 and
/// 5xx with exponential backoff; the streaming path fails fast and lets the
/// chat layer degrade to an error frame.
#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: String) -> Self {
        Self {
            client: Client::builder()
                .timeout(std::time::Duration::from_secs(120))
                .build()
                .expect("Failed to build HTTP client"),
            api_key,
        }
    }

    fn request_body(prompt: &str) -> GenerateContentRequest<'_> {
        GenerateContentRequest {
            contents: vec![Content {
                role: "user",
                parts: vec![Part { text: prompt }],
            }],
        }
    }

    async fn read_api_error(response: reqwest::Response) -> ModelError {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<GeminiError>(&body)
            .map(|e| e.error.message)
            .unwrap_or(body);
        ModelError::Api { status, message }
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        let url = format!("{GEMINI_API_BASE}/{MODEL}:generateContent");
        let body = Self::request_body(prompt);

        let mut last_error: Option<ModelError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                // Exponential backoff: 1s, 2s, 4s
                let delay = std::time::Duration::from_millis(1000 * (1 << (attempt - 1)));
                warn!(
                    "model call attempt {} failed, retrying after {}ms",
                    attempt,
                    delay.as_millis()
                );
                tokio::time::sleep(delay).await;
            }

            let response = self
                .client
                .post(&url)
                .query(&[("key", self.api_key.as_str())])
                .json(&body)
                .send()
                .await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(ModelError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let err = Self::read_api_error(response).await;
                warn!("model API returned {status}: {err}");
                last_error = Some(err);
                continue;
            }

            if !status.is_success() {
                return Err(Self::read_api_error(response).await);
            }

            let parsed: GenerateContentResponse = response.json().await?;
            let text = parsed.text().ok_or(ModelError::EmptyContent)?;
            debug!("model call succeeded, response_len={}", text.len());
            return Ok(text);
        }

        Err(last_error.unwrap_or(ModelError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }

    async fn generate_stream(&self, prompt: &str) -> Result<FragmentStream, ModelError> {
        let url = format!("{GEMINI_API_BASE}/{MODEL}:streamGenerateContent");
        let body = Self::request_body(prompt);

        let response = self
            .client
            .post(&url)
            .query(&[("alt", "sse"), ("key", self.api_key.as_str())])
            .json(&body)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(Self::read_api_error(response).await);
        }

        let mut bytes = response.bytes_stream();

        // The SSE body is a sequence of `data: <json>` lines. Chunk boundaries
        // are arbitrary, so lines are reassembled before parsing.
        let stream = async_stream::stream! {
            let mut line_buf = String::new();
            while let Some(chunk) = bytes.next().await {
                let chunk = match chunk {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(ModelError::Stream(e.to_string()));
                        return;
                    }
                };
                line_buf.push_str(&String::from_utf8_lossy(&chunk));

                while let Some(newline) = line_buf.find('\n') {
                    let line: String = line_buf.drain(..=newline).collect();
                    let line = line.trim();
                    let Some(data) = line.strip_prefix("data:") else {
                        continue;
                    };
                    let data = data.trim();
                    if data.is_empty() || data == "[DONE]" {
                        continue;
                    }
                    match serde_json::from_str::<GenerateContentResponse>(data) {
                        Ok(event) => {
                            if let Some(text) = event.text() {
                                yield Ok(text);
                            }
                        }
                        Err(e) => {
                            yield Err(ModelError::Stream(format!(
                                "unparseable stream event: {e}"
                            )));
                            return;
                        }
                    }
                }
            }
        };

        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_text_concatenates_parts() {
        let raw = r#"{"candidates":[{"content":{"parts":[{"text":"Hello "},{"text":"world"}]}}]}"#;
        let parsed: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.text().as_deref(), Some("Hello world"));
    }

    #[test]
    fn response_text_empty_candidates_is_none() {
        let parsed: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.text().is_none());
    }

    #[test]
    fn response_text_missing_part_text_is_none() {
        let raw = r#"{"candidates":[{"content":{"parts":[{}]}}]}"#;
        let parsed: GenerateContentResponse = serde_json::from_str(raw).unwrap();
        assert!(parsed.text().is_none());
    }
}
