//! Generation backend abstraction
//!
//! Defines the `GenerationClient` trait that decouples the news service from
//! the hosted model API, plus the `ClientFactory` that binds a client to one
//! API key. `GeminiClient` is the production implementation; tests inject
//! scripted clients through the same traits.

pub mod gemini;

pub use gemini::{GeminiClient, GeminiFactory, GeminiSettings};

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

/// Speaker of a chat message sent to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

/// One message of a generation request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }
}

/// Failure reported by the generation backend.
///
/// Both fields are optional: transport failures carry only a message, and a
/// bare HTTP status may arrive without a readable body. Rate-limit detection
/// inspects both.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub struct BackendError {
    pub message: Option<String>,
    pub status: Option<u16>,
}

impl BackendError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            status: None,
        }
    }

    pub fn with_status(status: u16, message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            status: Some(status),
        }
    }
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.message, self.status) {
            (Some(message), _) => f.write_str(message),
            (None, Some(status)) => write!(f, "generation backend returned status {status}"),
            (None, None) => f.write_str("generation backend error"),
        }
    }
}

/// Result alias for backend calls.
pub type Result<T> = std::result::Result<T, BackendError>;

/// A model client bound to a single credential.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn GenerationClient>`).
pub trait GenerationClient: Send + Sync {
    /// Send the conversation and return the generated text.
    fn invoke<'a>(
        &'a self,
        messages: &'a [ChatMessage],
    ) -> Pin<Box<dyn Future<Output = Result<String>> + Send + 'a>>;
}

/// Builds clients bound to a given API key.
///
/// Construction is synchronous and performs no network I/O; the first
/// request happens on `invoke`.
pub trait ClientFactory: Send + Sync {
    fn create(&self, api_key: &str) -> Arc<dyn GenerationClient>;
}
