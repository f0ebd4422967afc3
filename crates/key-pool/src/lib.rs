//! API key pool and rotation for the generation backend
//!
//! Holds a fixed, ordered set of API keys and wraps every backend call so
//! that rate-limit failures rotate to the next usable key instead of failing
//! the request.
//!
//! Key lifecycle:
//! 1. Keys load from configuration at startup, all available (an empty list
//!    refuses to start)
//! 2. `KeyPool::acquire` hands out the first available key in config order
//! 3. Backend answers with a rate-limit-class error → key cools down for the
//!    configured duration and the cached client is dropped
//! 4. Cooldown lapses → key is available again (its flag stays set)

pub mod classify;
pub mod error;
pub mod pool;
pub mod rotation;

pub use classify::{ErrorClassification, classify};
pub use error::{Error, Result};
pub use pool::{DEFAULT_COOLDOWN, KeyPool};
pub use rotation::{KeyRotator, RotationSettings};
