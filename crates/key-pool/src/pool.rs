//! API key pool with first-fit selection and cooldown tracking
//!
//! Keys are held in insertion order and never added or removed after start.
//! `acquire` returns the first key that is available; the first configured
//! key therefore takes all traffic until it is rate limited.
//!
//! Availability is computed on read: a key is available when it was never
//! rate limited or its cooldown has lapsed. The `rate_limited` flag itself is
//! never cleared, so health output keeps reporting it after the cooldown ends.

use std::time::Duration;

use common::Secret;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

/// Cooldown applied when a caller has no better estimate.
pub const DEFAULT_COOLDOWN: Duration = Duration::from_secs(60);

#[derive(Debug)]
struct CredentialRecord {
    key: Secret<String>,
    /// Informational only; not used for selection.
    last_used_at: Option<Instant>,
    rate_limited: bool,
    rate_limit_reset_at: Option<Instant>,
}

impl CredentialRecord {
    fn new(key: String) -> Self {
        Self {
            key: Secret::new(key),
            last_used_at: None,
            rate_limited: false,
            rate_limit_reset_at: None,
        }
    }

    fn is_available(&self, now: Instant) -> bool {
        !self.rate_limited || self.rate_limit_reset_at.is_none_or(|reset| now >= reset)
    }
}

/// Fixed set of API keys and their rate-limit state.
///
/// Records live in a `Vec` behind a `RwLock`; each operation takes the lock
/// once, so concurrent requests see a consistent view of every record.
pub struct KeyPool {
    records: RwLock<Vec<CredentialRecord>>,
    size: usize,
    default_cooldown: Duration,
}

impl KeyPool {
    /// Build a pool with one available record per key, in order.
    ///
    /// An empty key list is a configuration error: the service must not start
    /// without at least one key.
    pub fn new(keys: Vec<String>, default_cooldown: Duration) -> Result<Self> {
        if keys.is_empty() {
            return Err(Error::Configuration(
                "no API keys configured; set GEMINI_API_KEYS, GEMINI_API_KEY or api_keys_file"
                    .into(),
            ));
        }

        let records: Vec<CredentialRecord> = keys.into_iter().map(CredentialRecord::new).collect();
        let size = records.len();
        info!(
            keys = size,
            cooldown_secs = default_cooldown.as_secs(),
            "key pool initialized"
        );
        Ok(Self {
            records: RwLock::new(records),
            size,
            default_cooldown,
        })
    }

    /// Return the first available key, recording the acquisition time.
    ///
    /// `None` means every key is cooling down; callers treat this as a normal
    /// outcome rather than an error.
    pub async fn acquire(&self) -> Option<Secret<String>> {
        let now = Instant::now();
        let mut records = self.records.write().await;
        let record = records.iter_mut().find(|r| r.is_available(now))?;
        record.last_used_at = Some(now);
        Some(record.key.clone())
    }

    /// Put a key into cooldown for `cooldown`.
    ///
    /// Unknown keys are ignored. Afterwards logs whether another key is still
    /// available; this check does not touch any record.
    pub async fn mark_rate_limited(&self, key: &str, cooldown: Duration) {
        let now = Instant::now();
        let any_available = {
            let mut records = self.records.write().await;
            let Some(record) = records.iter_mut().find(|r| r.key == *key) else {
                debug!("rate-limited key not in pool, ignoring");
                return;
            };
            record.rate_limited = true;
            record.rate_limit_reset_at = Some(now + cooldown);
            info!(
                key = %record.key.hint(),
                cooldown_secs = cooldown.as_secs(),
                "key entering cooldown"
            );
            records.iter().any(|r| r.is_available(now))
        };

        if any_available {
            info!("switched to next available API key");
        } else {
            warn!("all API keys are currently rate limited");
        }
    }

    /// Cooldown used by the rotator when marking keys.
    pub fn default_cooldown(&self) -> Duration {
        self.default_cooldown
    }

    /// Number of configured keys.
    pub fn len(&self) -> usize {
        self.size
    }

    /// Always false: construction rejects empty key lists.
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Number of keys available right now.
    pub async fn available_count(&self) -> usize {
        let now = Instant::now();
        let records = self.records.read().await;
        records.iter().filter(|r| r.is_available(now)).count()
    }

    /// Pool health summary for the health endpoint.
    ///
    /// Keys are identified by their hint only. Status mapping: all available →
    /// healthy, some available → degraded, none available → unhealthy.
    pub async fn health(&self) -> serde_json::Value {
        let now = Instant::now();
        let records = self.records.read().await;

        let mut keys = Vec::with_capacity(records.len());
        let mut available_count = 0usize;

        for record in records.iter() {
            let available = record.is_available(now);
            if available {
                available_count += 1;
            }
            let cooldown_remaining = record
                .rate_limit_reset_at
                .map(|reset| reset.saturating_duration_since(now).as_secs())
                .unwrap_or(0);
            keys.push(serde_json::json!({
                "key": record.key.hint(),
                "available": available,
                "rate_limited": record.rate_limited,
                "cooldown_remaining_secs": cooldown_remaining,
                "last_used_secs_ago": record
                    .last_used_at
                    .map(|used| now.saturating_duration_since(used).as_secs()),
            }));
        }

        let total = records.len();
        let status = if available_count == total {
            "healthy"
        } else if available_count > 0 {
            "degraded"
        } else {
            "unhealthy"
        };

        serde_json::json!({
            "status": status,
            "keys_total": total,
            "keys_available": available_count,
            "keys_cooling_down": total - available_count,
            "keys": keys
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(keys: &[&str]) -> KeyPool {
        KeyPool::new(keys.iter().map(|k| k.to_string()).collect(), DEFAULT_COOLDOWN).unwrap()
    }

    async fn acquire_plain(pool: &KeyPool) -> Option<String> {
        pool.acquire().await.map(|k| k.expose().clone())
    }

    #[test]
    fn empty_key_list_is_configuration_error() {
        let err = KeyPool::new(vec![], DEFAULT_COOLDOWN).err().unwrap();
        assert!(matches!(err, Error::Configuration(_)), "got: {err:?}");
    }

    #[tokio::test]
    async fn new_pool_has_all_keys_available() {
        let pool = pool(&["A", "B", "C"]);
        assert_eq!(pool.len(), 3);
        assert!(!pool.is_empty());
        assert_eq!(pool.available_count().await, 3);

        let health = pool.health().await;
        assert_eq!(health["status"], "healthy");
        assert_eq!(health["keys_available"], 3);
    }

    #[tokio::test]
    async fn acquire_is_first_fit() {
        let pool = pool(&["A", "B", "C"]);
        for _ in 0..3 {
            assert_eq!(acquire_plain(&pool).await.as_deref(), Some("A"));
        }
    }

    #[tokio::test]
    async fn rate_limited_key_is_skipped() {
        let pool = pool(&["A", "B", "C"]);
        pool.mark_rate_limited("A", DEFAULT_COOLDOWN).await;
        assert_eq!(acquire_plain(&pool).await.as_deref(), Some("B"));

        pool.mark_rate_limited("B", DEFAULT_COOLDOWN).await;
        assert_eq!(acquire_plain(&pool).await.as_deref(), Some("C"));
    }

    #[tokio::test]
    async fn all_rate_limited_returns_none() {
        let pool = pool(&["A", "B"]);
        pool.mark_rate_limited("A", DEFAULT_COOLDOWN).await;
        pool.mark_rate_limited("B", DEFAULT_COOLDOWN).await;

        assert!(pool.acquire().await.is_none());
        assert_eq!(pool.available_count().await, 0);
        assert_eq!(pool.health().await["status"], "unhealthy");
    }

    #[tokio::test]
    async fn unknown_key_is_ignored() {
        let pool = pool(&["A"]);
        pool.mark_rate_limited("nope", DEFAULT_COOLDOWN).await;
        assert_eq!(pool.available_count().await, 1);
        assert_eq!(acquire_plain(&pool).await.as_deref(), Some("A"));
    }

    #[tokio::test(start_paused = true)]
    async fn cooldown_expiry_restores_key_but_keeps_flag() {
        let pool = pool(&["A"]);
        pool.mark_rate_limited("A", Duration::from_secs(1)).await;
        assert!(pool.acquire().await.is_none());

        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(acquire_plain(&pool).await.as_deref(), Some("A"));

        // The flag was never cleared; only the reset time lapsed.
        let health = pool.health().await;
        assert_eq!(health["keys"][0]["rate_limited"], true);
        assert_eq!(health["keys"][0]["available"], true);
        assert_eq!(health["status"], "healthy");
    }

    #[tokio::test(start_paused = true)]
    async fn expired_first_key_is_preferred_again() {
        let pool = pool(&["A", "B"]);
        pool.mark_rate_limited("A", Duration::from_secs(5)).await;
        assert_eq!(acquire_plain(&pool).await.as_deref(), Some("B"));

        tokio::time::advance(Duration::from_secs(5)).await;
        assert_eq!(acquire_plain(&pool).await.as_deref(), Some("A"));
    }

    #[tokio::test(start_paused = true)]
    async fn health_reports_cooldown_and_last_use() {
        let pool = pool(&["AIzaSyFirstKey", "AIzaSySecondKey"]);
        pool.acquire().await.unwrap();
        tokio::time::advance(Duration::from_secs(3)).await;
        pool.mark_rate_limited("AIzaSyFirstKey", DEFAULT_COOLDOWN).await;

        let health = pool.health().await;
        assert_eq!(health["status"], "degraded");
        assert_eq!(health["keys_cooling_down"], 1);

        let first = &health["keys"][0];
        assert_eq!(first["key"], "AIzaSyFi...");
        assert_eq!(first["available"], false);
        assert_eq!(first["cooldown_remaining_secs"], 60);
        assert_eq!(first["last_used_secs_ago"], 3);

        let second = &health["keys"][1];
        assert!(second["last_used_secs_ago"].is_null());
    }

    #[tokio::test]
    async fn health_never_exposes_full_key() {
        let pool = pool(&["AIzaSyVerySecretValue"]);
        let rendered = pool.health().await.to_string();
        assert!(!rendered.contains("AIzaSyVerySecretValue"));
    }
}
