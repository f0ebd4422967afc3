//! Secret wrapper for API keys and other sensitive values

use std::fmt;
use zeroize::Zeroize;

/// Number of leading characters shown by [`Secret::hint`].
const HINT_LEN: usize = 8;

/// Sensitive value, redacted in Debug/Display and zeroed on drop.
pub struct Secret<T: Zeroize>(T);

impl<T: Zeroize> Secret<T> {
    pub fn new(value: T) -> Self {
        Self(value)
    }

    /// Expose the inner value (use sparingly)
    pub fn expose(&self) -> &T {
        &self.0
    }
}

impl Secret<String> {
    /// Short prefix for log lines, e.g. `AIzaSyBr...`.
    ///
    /// Values no longer than the hint are fully masked so short test keys
    /// never appear verbatim.
    pub fn hint(&self) -> String {
        if self.0.chars().count() <= HINT_LEN {
            return "***".to_string();
        }
        let prefix: String = self.0.chars().take(HINT_LEN).collect();
        format!("{prefix}...")
    }
}

impl<T: Zeroize> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

impl<T: Zeroize> Drop for Secret<T> {
    fn drop(&mut self) {
        self.0.zeroize();
    }
}

impl<T: Zeroize + Clone> Clone for Secret<T> {
    fn clone(&self) -> Self {
        Self(self.0.clone())
    }
}

impl PartialEq<str> for Secret<String> {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}
