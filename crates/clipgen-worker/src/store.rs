//! Content item persistence.
//!
//! The content item itself lives outside this pipeline; the orchestrator only
//! reads its declared source and keeps string attributes against it.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, RwLock};

use clipgen_models::{ContentId, ContentSource, SourceType};

use crate::error::{WorkerError, WorkerResult};

/// Access to content items the pipeline generates artifacts for.
#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn source_type(&self, id: &ContentId) -> WorkerResult<SourceType>;

    /// Declared source URL; `None` when the item has none.
    async fn source_url(&self, id: &ContentId) -> WorkerResult<Option<String>>;

    async fn get_attribute(&self, id: &ContentId, key: &str) -> WorkerResult<Option<String>>;

    async fn set_attribute(&self, id: &ContentId, key: &str, value: &str) -> WorkerResult<()>;

    /// Removing an absent attribute is not an error.
    async fn delete_attribute(&self, id: &ContentId, key: &str) -> WorkerResult<()>;

    /// Declared source as one value.
    async fn content_source(&self, id: &ContentId) -> WorkerResult<ContentSource> {
        let source_type = self.source_type(id).await?;
        let url = self.source_url(id).await?.unwrap_or_default();
        Ok(ContentSource::new(source_type, url))
    }
}

/// Stored form of one content item.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    #[serde(default)]
    pub source_type: SourceType,
    #[serde(default)]
    pub source_url: Option<String>,
    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl ContentRecord {
    pub fn new(source: ContentSource) -> Self {
        Self {
            source_type: source.source_type,
            source_url: Some(source.url).filter(|u| !u.is_empty()),
            attributes: BTreeMap::new(),
        }
    }
}

/// Process-local store.
#[derive(Debug, Default)]
pub struct InMemoryContentStore {
    records: RwLock<HashMap<ContentId, ContentRecord>>,
}

impl InMemoryContentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a content item.
    pub async fn insert(&self, id: ContentId, source: ContentSource) {
        self.records
            .write()
            .await
            .insert(id, ContentRecord::new(source));
    }

    /// Snapshot of an item's attributes.
    pub async fn attributes(&self, id: &ContentId) -> BTreeMap<String, String> {
        self.records
            .read()
            .await
            .get(id)
            .map(|r| r.attributes.clone())
            .unwrap_or_default()
    }

    async fn with_record<T>(
        &self,
        id: &ContentId,
        f: impl FnOnce(&ContentRecord) -> T,
    ) -> WorkerResult<T> {
        let records = self.records.read().await;
        records
            .get(id)
            .map(f)
            .ok_or_else(|| WorkerError::ContentNotFound(id.to_string()))
    }
}

#[async_trait]
impl ContentStore for InMemoryContentStore {
    async fn source_type(&self, id: &ContentId) -> WorkerResult<SourceType> {
        self.with_record(id, |r| r.source_type).await
    }

    async fn source_url(&self, id: &ContentId) -> WorkerResult<Option<String>> {
        self.with_record(id, |r| r.source_url.clone()).await
    }

    async fn get_attribute(&self, id: &ContentId, key: &str) -> WorkerResult<Option<String>> {
        self.with_record(id, |r| r.attributes.get(key).cloned()).await
    }

    async fn set_attribute(&self, id: &ContentId, key: &str, value: &str) -> WorkerResult<()> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| WorkerError::ContentNotFound(id.to_string()))?;
        record.attributes.insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn delete_attribute(&self, id: &ContentId, key: &str) -> WorkerResult<()> {
        let mut records = self.records.write().await;
        if let Some(record) = records.get_mut(id) {
            record.attributes.remove(key);
        }
        Ok(())
    }
}

/// One JSON document per content item under a directory.
#[derive(Debug)]
pub struct JsonFileContentStore {
    dir: PathBuf,
    // Serializes read-modify-write cycles within this process
    write_lock: Mutex<()>,
}

impl JsonFileContentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Create or replace the record for `id`, keeping existing attributes.
    pub async fn register(&self, id: &ContentId, source: ContentSource) -> WorkerResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut record = self.read(id).await?.unwrap_or_default();
        let fresh = ContentRecord::new(source);
        record.source_type = fresh.source_type;
        record.source_url = fresh.source_url;
        self.write(id, &record).await
    }

    fn record_path(&self, id: &ContentId) -> WorkerResult<PathBuf> {
        let name = id.as_str();
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains(['/', '\\'])
        {
            return Err(WorkerError::InvalidContentId(name.to_string()));
        }
        Ok(self.dir.join(format!("{name}.json")))
    }

    async fn read(&self, id: &ContentId) -> WorkerResult<Option<ContentRecord>> {
        let path = self.record_path(id)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn read_existing(&self, id: &ContentId) -> WorkerResult<ContentRecord> {
        self.read(id)
            .await?
            .ok_or_else(|| WorkerError::ContentNotFound(id.to_string()))
    }

    async fn write(&self, id: &ContentId, record: &ContentRecord) -> WorkerResult<()> {
        let path = self.record_path(id)?;
        tokio::fs::create_dir_all(&self.dir).await?;
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, serde_json::to_vec_pretty(record)?).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

#[async_trait]
impl ContentStore for JsonFileContentStore {
    async fn source_type(&self, id: &ContentId) -> WorkerResult<SourceType> {
        Ok(self.read_existing(id).await?.source_type)
    }

    async fn source_url(&self, id: &ContentId) -> WorkerResult<Option<String>> {
        Ok(self.read_existing(id).await?.source_url)
    }

    async fn get_attribute(&self, id: &ContentId, key: &str) -> WorkerResult<Option<String>> {
        Ok(self.read_existing(id).await?.attributes.get(key).cloned())
    }

    async fn set_attribute(&self, id: &ContentId, key: &str, value: &str) -> WorkerResult<()> {
        let _guard = self.write_lock.lock().await;
        let mut record = self.read_existing(id).await?;
        record.attributes.insert(key.to_string(), value.to_string());
        self.write(id, &record).await
    }

    async fn delete_attribute(&self, id: &ContentId, key: &str) -> WorkerResult<()> {
        let _guard = self.write_lock.lock().await;
        let Some(mut record) = self.read(id).await? else {
            return Ok(());
        };
        if record.attributes.remove(key).is_some() {
            self.write(id, &record).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_attributes() {
        let store = InMemoryContentStore::new();
        let id = ContentId::from("post-1");
        store
            .insert(id.clone(), ContentSource::direct("https://cdn.example.com/a.mp4"))
            .await;

        assert_eq!(store.source_type(&id).await.unwrap(), SourceType::Direct);
        assert_eq!(store.get_attribute(&id, "k").await.unwrap(), None);

        store.set_attribute(&id, "k", "v").await.unwrap();
        assert_eq!(store.get_attribute(&id, "k").await.unwrap().as_deref(), Some("v"));

        store.delete_attribute(&id, "k").await.unwrap();
        store.delete_attribute(&id, "k").await.unwrap();
        assert_eq!(store.get_attribute(&id, "k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_in_memory_unknown_item() {
        let store = InMemoryContentStore::new();
        let err = store.source_type(&ContentId::from("missing")).await.unwrap_err();
        assert!(matches!(err, WorkerError::ContentNotFound(_)));
    }

    #[tokio::test]
    async fn test_empty_url_is_none() {
        let store = InMemoryContentStore::new();
        let id = ContentId::from("post-2");
        store.insert(id.clone(), ContentSource::new(SourceType::Embed, "")).await;
        assert_eq!(store.source_url(&id).await.unwrap(), None);
        let source = store.content_source(&id).await.unwrap();
        assert_eq!(source.url, "");
        assert_eq!(source.source_type, SourceType::Embed);
    }

    #[tokio::test]
    async fn test_json_store_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileContentStore::new(dir.path());
        let id = ContentId::from("post-3");

        store
            .register(&id, ContentSource::direct("/srv/videos/talk.mp4"))
            .await
            .unwrap();
        store.set_attribute(&id, "clips_generated", "true").await.unwrap();

        // Re-registering keeps attributes
        store
            .register(&id, ContentSource::direct("/srv/videos/talk-v2.mp4"))
            .await
            .unwrap();

        let reopened = JsonFileContentStore::new(dir.path());
        assert_eq!(
            reopened.source_url(&id).await.unwrap().as_deref(),
            Some("/srv/videos/talk-v2.mp4")
        );
        assert_eq!(
            reopened.get_attribute(&id, "clips_generated").await.unwrap().as_deref(),
            Some("true")
        );
    }

    #[tokio::test]
    async fn test_json_store_rejects_path_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileContentStore::new(dir.path());
        let err = store
            .register(&ContentId::from("../escape"), ContentSource::direct("a.mp4"))
            .await
            .unwrap_err();
        assert!(matches!(err, WorkerError::InvalidContentId(_)));
    }
}
