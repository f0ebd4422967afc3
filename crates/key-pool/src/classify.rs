//! Rate-limit detection for generation backend errors
//!
//! Only rate-limit-class failures trigger key rotation. Everything else
//! (malformed requests, auth failures, outages) is terminal for the call.

use generation::BackendError;

/// Status code that always means "rate limited".
const RATE_LIMIT_STATUS: u16 = 429;

/// Lowercase markers looked for in backend error messages.
const RATE_LIMIT_MARKERS: &[&str] = &[
    "429",
    "too many requests",
    "resource_exhausted",
    "quota_exceeded",
    "rate_limit_exceeded",
];

/// How the rotator should react to a failed invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClassification {
    /// Quota or throughput exhausted for this key: rotate and retry
    RateLimited,
    /// Anything else: fail the call with the original error
    Terminal,
}

/// Classify a backend error.
///
/// Rate-limited when the status is exactly 429 or the message contains any
/// marker, compared case-insensitively.
pub fn classify(error: &BackendError) -> ErrorClassification {
    if error.status == Some(RATE_LIMIT_STATUS) {
        return ErrorClassification::RateLimited;
    }
    if let Some(message) = &error.message {
        let lower = message.to_lowercase();
        if RATE_LIMIT_MARKERS.iter().any(|m| lower.contains(m)) {
            return ErrorClassification::RateLimited;
        }
    }
    ErrorClassification::Terminal
}
