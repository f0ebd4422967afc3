//! Stored document types

use serde::{Deserialize, Serialize};

/// A stored news script.
///
/// Timestamps are unix milliseconds. `content` is the markdown produced by
/// the generator (or supplied by the editor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsDoc {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brief: Option<String>,
    pub content: String,
    pub created_at: u64,
    pub updated_at: u64,
}

/// Fields supplied when inserting; id and timestamps are assigned by the store.
#[derive(Debug, Clone, Default)]
pub struct NewNews {
    pub title: String,
    pub category: Option<String>,
    pub location: Option<String>,
    pub brief: Option<String>,
    pub content: String,
}

/// Partial update: only `Some` fields are written.
#[derive(Debug, Clone, Default)]
pub struct NewsUpdate {
    pub title: Option<String>,
    pub category: Option<String>,
    pub location: Option<String>,
    pub brief: Option<String>,
    pub content: Option<String>,
}

impl NewsUpdate {
    pub(crate) fn apply(self, doc: &mut NewsDoc) {
        if let Some(title) = self.title {
            doc.title = title;
        }
        if let Some(category) = self.category {
            doc.category = Some(category);
        }
        if let Some(location) = self.location {
            doc.location = Some(location);
        }
        if let Some(brief) = self.brief {
            doc.brief = Some(brief);
        }
        if let Some(content) = self.content {
            doc.content = content;
        }
    }
}

/// One page of a listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: usize,
    pub page: usize,
    pub page_size: usize,
    pub total_pages: usize,
}
