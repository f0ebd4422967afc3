//! Common types shared across the News Desk workspace

mod error;
mod secret;

pub use error::{Error, Result};
pub use secret::Secret;
