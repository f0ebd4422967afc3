//! Key rotation and bounded retry around generation calls
//!
//! `KeyRotator::with_key_rotation` runs a unit of work against a client bound
//! to a pool key. Each call walks this state machine:
//!
//! ```text
//! ACQUIRE -> INVOKE -> SUCCESS
//!                   -> CLASSIFY_FAILURE -> TERMINAL_FAILURE
//!                                       -> ROTATE_AND_RETRY -> ACQUIRE
//! ```
//!
//! The retry budget counts attempts, not retries: a budget of 3 allows three
//! invocations. One unit is consumed per rotation.
//!
//! The bound client is cached across calls. Cache access is serialized by a
//! mutex, and a rotation clears the cache only if it still holds the key being
//! rotated away, so a client freshly bound by a concurrent request survives.
//! A request that cloned the old client before the rotation may use it once
//! more; the backend rejects it and that request rotates as well.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use common::Secret;
use generation::{BackendError, ChatMessage, ClientFactory, GenerationClient};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::classify::{ErrorClassification, classify};
use crate::error::{Error, Result};
use crate::pool::KeyPool;

/// Retry budget and backoff between attempts.
#[derive(Debug, Clone)]
pub struct RotationSettings {
    /// Total invocations allowed per call (minimum 1).
    pub retry_budget: u32,
    /// Fixed wait before re-acquiring after a rotation.
    pub backoff: Duration,
}

impl Default for RotationSettings {
    fn default() -> Self {
        Self {
            retry_budget: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

/// A client together with the key it was built from.
#[derive(Clone)]
struct BoundClient {
    key: Secret<String>,
    client: Arc<dyn GenerationClient>,
}

/// What to do after a failed invocation.
#[derive(Debug)]
enum FailureAction {
    Rotate(BackendError),
    Fail(Error),
}

/// Decide the transition out of CLASSIFY_FAILURE.
///
/// `remaining` is the budget left before this failure is charged.
fn on_failure(error: BackendError, remaining: u32, budget: u32) -> FailureAction {
    match classify(&error) {
        ErrorClassification::Terminal => FailureAction::Fail(Error::Backend(error)),
        ErrorClassification::RateLimited if remaining <= 1 => {
            FailureAction::Fail(Error::RetryBudgetExhausted {
                attempts: budget,
                last: error,
            })
        }
        ErrorClassification::RateLimited => FailureAction::Rotate(error),
    }
}

/// Rotation context shared by every request handler.
///
/// Owns the key pool handle, the client factory and the cached bound client.
pub struct KeyRotator {
    pool: Arc<KeyPool>,
    factory: Arc<dyn ClientFactory>,
    cached: Mutex<Option<BoundClient>>,
    settings: RotationSettings,
}

impl KeyRotator {
    pub fn new(
        pool: Arc<KeyPool>,
        factory: Arc<dyn ClientFactory>,
        settings: RotationSettings,
    ) -> Self {
        Self {
            pool,
            factory,
            cached: Mutex::new(None),
            settings,
        }
    }

    /// The underlying key pool (for health reporting).
    pub fn pool(&self) -> &KeyPool {
        &self.pool
    }

    /// Run `work` with a bound client, rotating keys on rate-limit failures.
    ///
    /// Errors:
    /// - `AllCredentialsExhausted` when no key is available at acquisition
    /// - `RetryBudgetExhausted` wrapping the last rate-limit error
    /// - `Backend` with the original error for anything not rate-limit-class
    pub async fn with_key_rotation<T, F, Fut>(&self, mut work: F) -> Result<T>
    where
        F: FnMut(Arc<dyn GenerationClient>) -> Fut,
        Fut: Future<Output = generation::Result<T>>,
    {
        let budget = self.settings.retry_budget.max(1);
        let mut remaining = budget;

        loop {
            let bound = self.bound_client().await?;

            let error = match work(bound.client.clone()).await {
                Ok(value) => return Ok(value),
                Err(e) => e,
            };

            match on_failure(error, remaining, budget) {
                FailureAction::Fail(err) => {
                    if let Error::RetryBudgetExhausted { last, .. } = &err {
                        self.rotate_away(&bound.key, last).await;
                    }
                    return Err(err);
                }
                FailureAction::Rotate(error) => {
                    self.rotate_away(&bound.key, &error).await;
                    remaining -= 1;
                    tokio::time::sleep(self.settings.backoff).await;
                }
            }
        }
    }

    /// Send a conversation and return the generated text.
    pub async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        self.with_key_rotation(|client| async move { client.invoke(messages).await })
            .await
    }

    /// Return the cached client, binding a new one to a fresh key if needed.
    async fn bound_client(&self) -> Result<BoundClient> {
        let mut cached = self.cached.lock().await;
        if let Some(bound) = cached.as_ref() {
            return Ok(bound.clone());
        }

        let Some(key) = self.pool.acquire().await else {
            warn!("no API key available, all keys cooling down");
            metrics::counter!("key_pool_exhausted_total").increment(1);
            return Err(Error::AllCredentialsExhausted);
        };

        debug!(key = %key.hint(), "binding generation client");
        let bound = BoundClient {
            client: self.factory.create(key.expose()),
            key,
        };
        *cached = Some(bound.clone());
        Ok(bound)
    }

    /// Mark the key rate limited and drop the cached client if it is bound to it.
    async fn rotate_away(&self, key: &Secret<String>, error: &BackendError) {
        warn!(key = %key.hint(), error = %error, "API key rate limited, rotating");
        metrics::counter!("key_pool_rotations_total").increment(1);
        self.pool
            .mark_rate_limited(key.expose(), self.pool.default_cooldown())
            .await;
        self.invalidate(key).await;
    }

    async fn invalidate(&self, key: &Secret<String>) {
        let mut cached = self.cached.lock().await;
        if cached
            .as_ref()
            .is_some_and(|bound| bound.key == *key.expose().as_str())
        {
            *cached = None;
        }
    }
}
