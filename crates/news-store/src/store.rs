//! News repository and its JSON-file implementation
//!
//! The collection is a JSON array of `NewsDoc` on disk. All writes use atomic
//! temp-file + rename so a crash mid-write never leaves a truncated file. A
//! tokio Mutex serializes writers; readers clone what they need under the
//! same lock.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;
use std::time::{SystemTime, UNIX_EPOCH};

use tokio::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::model::{NewNews, NewsDoc, NewsUpdate, Page};

/// Boxed future returned by repository methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T>> + Send + 'a>>;

/// Persistence operations the HTTP layer relies on.
///
/// Uses `Pin<Box<dyn Future>>` return types for dyn-compatibility
/// (`Arc<dyn NewsRepository>`).
pub trait NewsRepository: Send + Sync {
    /// Store a new document, assigning id and timestamps.
    fn insert(&self, news: NewNews) -> StoreFuture<'_, NewsDoc>;

    /// Newest-first listing. `page` and `page_size` are clamped to at least 1.
    fn list(&self, page: usize, page_size: usize) -> StoreFuture<'_, Page<NewsDoc>>;

    fn get<'a>(&'a self, id: &'a str) -> StoreFuture<'a, Option<NewsDoc>>;

    /// Remove a document. Deleting a missing id is not an error.
    fn delete<'a>(&'a self, id: &'a str) -> StoreFuture<'a, ()>;

    /// Apply a partial update and bump `updated_at`. `None` if the id is unknown.
    fn update<'a>(&'a self, id: &'a str, update: NewsUpdate)
    -> StoreFuture<'a, Option<NewsDoc>>;
}

/// Single-file document store.
pub struct JsonFileStore {
    path: PathBuf,
    docs: Mutex<Vec<NewsDoc>>,
}

impl JsonFileStore {
    /// Load the collection from `path`.
    ///
    /// A missing file (and missing parent directories) is created as an empty
    /// collection so the first start needs no setup.
    pub async fn load(path: PathBuf) -> Result<Self> {
        let docs = if path.exists() {
            let contents = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| Error::Io(format!("reading news file: {e}")))?;
            let docs: Vec<NewsDoc> = serde_json::from_str(&contents)
                .map_err(|e| Error::Parse(format!("parsing news file: {e}")))?;
            info!(path = %path.display(), documents = docs.len(), "loaded news store");
            docs
        } else {
            if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
                tokio::fs::create_dir_all(dir)
                    .await
                    .map_err(|e| Error::Io(format!("creating news directory: {e}")))?;
            }
            info!(path = %path.display(), "news file not found, starting with empty store");
            let docs = Vec::new();
            write_atomic(&path, &docs).await?;
            docs
        };

        Ok(Self {
            path,
            docs: Mutex::new(docs),
        })
    }

    /// Number of stored documents.
    pub async fn len(&self) -> usize {
        self.docs.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl NewsRepository for JsonFileStore {
    fn insert(&self, news: NewNews) -> StoreFuture<'_, NewsDoc> {
        Box::pin(async move {
            let now = now_millis();
            let doc = NewsDoc {
                id: Uuid::new_v4().to_string(),
                title: news.title,
                category: news.category,
                location: news.location,
                brief: news.brief,
                content: news.content,
                created_at: now,
                updated_at: now,
            };

            let mut docs = self.docs.lock().await;
            let mut staged = docs.clone();
            staged.push(doc.clone());
            write_atomic(&self.path, &staged).await?;
            *docs = staged;
            debug!(id = %doc.id, "inserted news");
            Ok(doc)
        })
    }

    fn list(&self, page: usize, page_size: usize) -> StoreFuture<'_, Page<NewsDoc>> {
        Box::pin(async move {
            let page = page.max(1);
            let page_size = page_size.max(1);

            let docs = self.docs.lock().await;
            let total = docs.len();
            // Reverse first so equal timestamps keep newest-inserted first.
            let mut ordered: Vec<&NewsDoc> = docs.iter().rev().collect();
            ordered.sort_by(|a, b| b.created_at.cmp(&a.created_at));

            let items = ordered
                .into_iter()
                .skip((page - 1).saturating_mul(page_size))
                .take(page_size)
                .cloned()
                .collect();

            Ok(Page {
                items,
                total,
                page,
                page_size,
                total_pages: total.div_ceil(page_size),
            })
        })
    }

    fn get<'a>(&'a self, id: &'a str) -> StoreFuture<'a, Option<NewsDoc>> {
        Box::pin(async move {
            validate_id(id)?;
            let docs = self.docs.lock().await;
            Ok(docs.iter().find(|d| d.id == id).cloned())
        })
    }

    fn delete<'a>(&'a self, id: &'a str) -> StoreFuture<'a, ()> {
        Box::pin(async move {
            validate_id(id)?;
            let mut docs = self.docs.lock().await;
            if !docs.iter().any(|d| d.id == id) {
                return Ok(());
            }
            let staged: Vec<NewsDoc> = docs.iter().filter(|d| d.id != id).cloned().collect();
            write_atomic(&self.path, &staged).await?;
            *docs = staged;
            debug!(id, "deleted news");
            Ok(())
        })
    }

    fn update<'a>(
        &'a self,
        id: &'a str,
        update: NewsUpdate,
    ) -> StoreFuture<'a, Option<NewsDoc>> {
        Box::pin(async move {
            validate_id(id)?;
            let mut docs = self.docs.lock().await;
            let mut staged = docs.clone();
            let Some(doc) = staged.iter_mut().find(|d| d.id == id) else {
                return Ok(None);
            };
            update.apply(doc);
            doc.updated_at = now_millis().max(doc.created_at);
            let updated = doc.clone();
            write_atomic(&self.path, &staged).await?;
            *docs = staged;
            debug!(id, "updated news");
            Ok(Some(updated))
        })
    }
}

/// Ids are UUIDs; anything else is rejected before touching the collection.
fn validate_id(id: &str) -> Result<()> {
    Uuid::parse_str(id)
        .map(|_| ())
        .map_err(|_| Error::InvalidId(id.to_string()))
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Write the collection atomically.
///
/// Writes a temporary file next to the target, then renames it over the
/// target. Permissions are 0600 on unix. Callers swap the in-memory
/// collection only after this succeeds.
async fn write_atomic(path: &Path, docs: &[NewsDoc]) -> Result<()> {
    let json = serde_json::to_string_pretty(docs)
        .map_err(|e| Error::Parse(format!("serializing news: {e}")))?;

    let dir = path
        .parent()
        .ok_or_else(|| Error::Io("news path has no parent directory".into()))?;

    let tmp_path = dir.join(format!(".news.tmp.{}", std::process::id()));

    tokio::fs::write(&tmp_path, json.as_bytes())
        .await
        .map_err(|e| Error::Io(format!("writing temp news file: {e}")))?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        tokio::fs::set_permissions(&tmp_path, perms)
            .await
            .map_err(|e| Error::Io(format!("setting news file permissions: {e}")))?;
    }

    tokio::fs::rename(&tmp_path, path)
        .await
        .map_err(|e| Error::Io(format!("renaming temp news file: {e}")))?;

    debug!(path = %path.display(), documents = docs.len(), "persisted news");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn news(title: &str) -> NewNews {
        NewNews {
            title: title.into(),
            category: Some("General".into()),
            location: None,
            brief: None,
            content: format!("# {title}"),
        }
    }

    async fn store(dir: &tempfile::TempDir) -> JsonFileStore {
        JsonFileStore::load(dir.path().join("news.json")).await.unwrap()
    }

    #[tokio::test]
    async fn insert_assigns_id_and_timestamps() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;

        let doc = store.insert(news("પહેલા સમાચાર")).await.unwrap();

        assert!(Uuid::parse_str(&doc.id).is_ok());
        assert_eq!(doc.title, "પહેલા સમાચાર");
        assert!(doc.created_at > 0);
        assert_eq!(doc.created_at, doc.updated_at);
    }

    #[tokio::test]
    async fn roundtrip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("news.json");

        let store = JsonFileStore::load(path.clone()).await.unwrap();
        let doc = store.insert(news("persisted")).await.unwrap();

        let reloaded = JsonFileStore::load(path).await.unwrap();
        let fetched = reloaded.get(&doc.id).await.unwrap().unwrap();
        assert_eq!(fetched, doc);
    }

    #[tokio::test]
    async fn cold_start_creates_empty_file_and_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data").join("news.json");

        let store = JsonFileStore::load(path.clone()).await.unwrap();
        assert!(store.is_empty().await);

        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let parsed: Vec<NewsDoc> = serde_json::from_str(&contents).unwrap();
        assert!(parsed.is_empty());
    }

    #[tokio::test]
    async fn corrupt_file_is_a_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("news.json");
        tokio::fs::write(&path, "{ not json").await.unwrap();

        let err = JsonFileStore::load(path).await.err().unwrap();
        assert!(matches!(err, Error::Parse(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn list_is_newest_first_and_paginated() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        for i in 0..5 {
            store.insert(news(&format!("story {i}"))).await.unwrap();
        }

        let first = store.list(1, 2).await.unwrap();
        assert_eq!(first.total, 5);
        assert_eq!(first.total_pages, 3);
        let titles: Vec<&str> = first.items.iter().map(|d| d.title.as_str()).collect();
        assert_eq!(titles, vec!["story 4", "story 3"]);

        let last = store.list(3, 2).await.unwrap();
        assert_eq!(last.items.len(), 1);
        assert_eq!(last.items[0].title, "story 0");

        let beyond = store.list(9, 2).await.unwrap();
        assert!(beyond.items.is_empty());
        assert_eq!(beyond.page, 9);
    }

    #[tokio::test]
    async fn list_clamps_page_and_size() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        store.insert(news("only")).await.unwrap();

        let page = store.list(0, 0).await.unwrap();
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, 1);
        assert_eq!(page.items.len(), 1);
    }

    #[tokio::test]
    async fn get_unknown_id_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        let missing = Uuid::new_v4().to_string();
        assert!(store.get(&missing).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn malformed_id_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        let err = store.get("not-a-uuid").await.unwrap_err();
        assert!(matches!(err, Error::InvalidId(_)));
        assert!(store.delete("../etc").await.is_err());
    }

    #[tokio::test]
    async fn delete_removes_and_tolerates_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        let doc = store.insert(news("to delete")).await.unwrap();

        store.delete(&doc.id).await.unwrap();
        assert!(store.get(&doc.id).await.unwrap().is_none());
        store.delete(&doc.id).await.unwrap();
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn update_applies_partial_fields() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        let doc = store.insert(news("original")).await.unwrap();

        let updated = store
            .update(
                &doc.id,
                NewsUpdate {
                    content: Some("# નવું".into()),
                    brief: Some("updated brief".into()),
                    ..Default::default()
                },
            )
            .await
            .unwrap()
            .unwrap();

        assert_eq!(updated.title, "original");
        assert_eq!(updated.content, "# નવું");
        assert_eq!(updated.brief.as_deref(), Some("updated brief"));
        assert!(updated.updated_at >= doc.updated_at);
        assert_eq!(updated.created_at, doc.created_at);
    }

    #[tokio::test]
    async fn update_unknown_id_is_none() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        let missing = Uuid::new_v4().to_string();
        let result = store
            .update(&missing, NewsUpdate::default())
            .await
            .unwrap();
        assert!(result.is_none());
    }

    #[tokio::test]
    async fn failed_write_leaves_collection_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        let kept = store.insert(news("kept")).await.unwrap();

        // A directory at the temp path makes every write fail.
        let tmp = dir.path().join(format!(".news.tmp.{}", std::process::id()));
        tokio::fs::create_dir(&tmp).await.unwrap();

        assert!(store.insert(news("never saved")).await.is_err());
        let update = NewsUpdate {
            title: Some("changed".into()),
            ..Default::default()
        };
        assert!(store.update(&kept.id, update).await.is_err());
        assert!(store.delete(&kept.id).await.is_err());

        let page = store.list(1, 10).await.unwrap();
        assert_eq!(page.total, 1);
        assert_eq!(page.items[0], kept);
        assert_eq!(store.get(&kept.id).await.unwrap(), Some(kept));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn file_permissions_are_0600() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("news.json");
        let store = JsonFileStore::load(path.clone()).await.unwrap();
        store.insert(news("private")).await.unwrap();

        let mode = tokio::fs::metadata(&path).await.unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o600, "news file must be 0600, got {mode:o}");
    }

    #[tokio::test]
    async fn concurrent_inserts_dont_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("news.json");
        let store = Arc::new(JsonFileStore::load(path.clone()).await.unwrap());

        let mut handles = vec![];
        for i in 0..10 {
            let store = store.clone();
            handles.push(tokio::spawn(async move {
                store.insert(news(&format!("story {i}"))).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }

        assert_eq!(store.len().await, 10);
        let contents = tokio::fs::read_to_string(&path).await.unwrap();
        let parsed: Vec<NewsDoc> = serde_json::from_str(&contents).unwrap();
        assert_eq!(parsed.len(), 10);
    }
}
