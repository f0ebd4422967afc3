//! Gemini `generateContent` client
//!
//! Speaks the Google Generative Language REST API. System messages are sent
//! as `systemInstruction`, user messages as `contents`. Non-2xx responses are
//! turned into `BackendError` with the HTTP status and a message of the form
//! `[429 Too Many Requests] Resource has been exhausted (RESOURCE_EXHAUSTED)`,
//! which is what rate-limit classification downstream matches on.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use common::Secret;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{BackendError, ChatMessage, ClientFactory, GenerationClient, Result, Role};

/// Header carrying the API key (keeps the key out of request URLs and logs).
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Upper bound on how much of an unparseable error body ends up in a message.
const MAX_RAW_ERROR_LEN: usize = 512;

/// Model settings shared by every client the factory builds.
#[derive(Debug, Clone)]
pub struct GeminiSettings {
    /// API root, e.g. `https://generativelanguage.googleapis.com/v1beta`
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub timeout: Duration,
}

impl GeminiSettings {
    fn endpoint(&self) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }
}

/// Builds `GeminiClient`s that share one connection pool.
pub struct GeminiFactory {
    http_client: reqwest::Client,
    settings: Arc<GeminiSettings>,
}

impl GeminiFactory {
    pub fn new(http_client: reqwest::Client, settings: GeminiSettings) -> Self {
        Self {
            http_client,
            settings: Arc::new(settings),
        }
    }
}

impl ClientFactory for GeminiFactory {
    fn create(&self, api_key: &str) -> Arc<dyn GenerationClient> {
        Arc::new(GeminiClient {
            http_client: self.http_client.clone(),
            settings: self.settings.clone(),
            api_key: Secret::new(api_key.to_string()),
        })
    }
}

/// Gemini client bound to one API key.
pub struct GeminiClient {
    http_client: reqwest::Client,
    settings: Arc<GeminiSettings>,
    api_key: Secret<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize)]
struct ResponsePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    status: Option<String>,
}

fn build_request<'a>(
    messages: &'a [ChatMessage],
    settings: &GeminiSettings,
) -> GenerateContentRequest<'a> {
    let system_parts: Vec<Part<'a>> = messages
        .iter()
        .filter(|m| m.role == Role::System)
        .map(|m| Part { text: &m.content })
        .collect();
    let contents = messages
        .iter()
        .filter(|m| m.role == Role::User)
        .map(|m| Content {
            role: Some("user"),
            parts: vec![Part { text: &m.content }],
        })
        .collect();

    GenerateContentRequest {
        system_instruction: (!system_parts.is_empty()).then_some(Content {
            role: None,
            parts: system_parts,
        }),
        contents,
        generation_config: GenerationConfig {
            temperature: settings.temperature,
            max_output_tokens: settings.max_output_tokens,
        },
    }
}

/// Concatenate the text parts of the first candidate.
fn extract_text(response: GenerateContentResponse) -> Result<String> {
    let text: String = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .map(|c| c.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.trim().is_empty() {
        return Err(BackendError::new("generation backend returned no content"));
    }
    Ok(text)
}

/// Build a `BackendError` from a non-2xx response.
fn error_from_response(status: reqwest::StatusCode, body: &str) -> BackendError {
    let reason = status.canonical_reason().unwrap_or("Unknown Status");
    let detail = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => match envelope.error.status {
            Some(code) => format!("{} ({code})", envelope.error.message),
            None => envelope.error.message,
        },
        Err(_) => body.trim().chars().take(MAX_RAW_ERROR_LEN).collect(),
    };
    BackendError::with_status(
        status.as_u16(),
        format!("[{} {reason}] {detail}", status.as_u16()),
    )
}

impl GenerationClient for GeminiClient {
    fn invoke<'a>(
        &'a self,
        messages: &'a [ChatMessage],
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(async move {
            let request = build_request(messages, &self.settings);

            let response = self
                .http_client
                .post(self.settings.endpoint())
                .header(API_KEY_HEADER, self.api_key.expose())
                .timeout(self.settings.timeout)
                .json(&request)
                .send()
                .await
                .map_err(|e| BackendError::new(format!("generation request failed: {e}")))?;

            let status = response.status();
            if !status.is_success() {
                let body = response
                    .text()
                    .await
                    .unwrap_or_else(|_| String::from("<no body>"));
                debug!(status = status.as_u16(), key = %self.api_key.hint(), "generation backend returned error");
                return Err(error_from_response(status, &body));
            }

            let parsed = response
                .json::<GenerateContentResponse>()
                .await
                .map_err(|e| BackendError::new(format!("invalid generation response: {e}")))?;
            extract_text(parsed)
        })
    }
}
