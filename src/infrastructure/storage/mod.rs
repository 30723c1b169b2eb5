//! Document storage implementations

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::{Mutex, RwLock};

use crate::application::errors::StorageError;
use crate::domain::traits::{empty_document, Document, Store};

/// JSON file-based store, one `<name>.json` file per document
pub struct JsonStore {
    base_path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonStore {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub async fn init(&self) -> Result<(), StorageError> {
        tokio::fs::create_dir_all(&self.base_path).await?;
        Ok(())
    }

    fn path_for(&self, name: &str) -> PathBuf {
        self.base_path.join(format!("{}.json", name))
    }
}

#[async_trait]
impl Store for JsonStore {
    async fn load(&self, name: &str) -> Document {
        let path = self.path_for(name);
        let content = match tokio::fs::read_to_string(&path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No {} yet, starting empty", path.display());
                return empty_document();
            }
            Err(e) => {
                tracing::warn!("Failed to read {}: {}", path.display(), e);
                return empty_document();
            }
        };

        match serde_json::from_str::<Document>(&content) {
            Ok(document) if document.is_object() => document,
            Ok(_) => {
                tracing::warn!("{} is not a JSON object, ignoring it", path.display());
                empty_document()
            }
            Err(e) => {
                tracing::warn!("Corrupt {}: {}", path.display(), e);
                empty_document()
            }
        }
    }

    /// Writes go to a temporary file that is renamed over the target, so a
    /// crash never leaves a half-written document.
    async fn save(&self, name: &str, document: &Document) -> Result<(), StorageError> {
        let content = serde_json::to_string_pretty(document)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;

        let _guard = self.write_lock.lock().await;
        tokio::fs::create_dir_all(&self.base_path).await?;
        let path = self.path_for(name);
        let tmp = self.base_path.join(format!(".{}.json.tmp", name));
        tokio::fs::write(&tmp, content.as_bytes()).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }
}

/// In-memory store for ephemeral runs and tests
#[derive(Default)]
pub struct MemoryStore {
    documents: RwLock<HashMap<String, Document>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Last saved copy of a document, if any.
    pub async fn snapshot(&self, name: &str) -> Option<Document> {
        self.documents.read().await.get(name).cloned()
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn load(&self, name: &str) -> Document {
        self.snapshot(name).await.unwrap_or_else(empty_document)
    }

    async fn save(&self, name: &str, document: &Document) -> Result<(), StorageError> {
        let mut documents = self.documents.write().await;
        documents.insert(name.to_string(), document.clone());
        Ok(())
    }
}
