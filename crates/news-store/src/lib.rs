//! Document store for generated news scripts
//!
//! Exposes the `NewsRepository` trait the HTTP layer talks to and
//! `JsonFileStore`, a single-file implementation that keeps the collection in
//! memory and persists every write atomically.

pub mod error;
pub mod model;
pub mod store;

pub use error::{Error, Result};
pub use model::{NewNews, NewsDoc, NewsUpdate, Page};
pub use store::{JsonFileStore, NewsRepository};
