use async_trait::async_trait;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;

use crate::application::errors::StorageError;

/// A named persisted document. Stores always hand back a JSON object.
pub type Document = serde_json::Value;

/// Store trait - load/save of named documents
#[async_trait]
pub trait Store: Send + Sync {
    /// Load a document. Missing or corrupt input yields an empty object;
    /// implementations log the problem instead of failing.
    async fn load(&self, name: &str) -> Document;

    /// Persist a document durably.
    async fn save(&self, name: &str, document: &Document) -> Result<(), StorageError>;
}

/// An empty JSON object.
pub fn empty_document() -> Document {
    Document::Object(serde_json::Map::new())
}

/// Decode every entry of a keyed document on its own. Entries that do not
/// fit `T` are logged and skipped so one bad record never hides the rest.
pub fn decode_entries<T: DeserializeOwned>(document: Document, kind: &str) -> BTreeMap<String, T> {
    let Document::Object(entries) = document else {
        tracing::warn!("Ignoring {} document that is not an object", kind);
        return BTreeMap::new();
    };

    let mut decoded = BTreeMap::new();
    for (key, value) in entries {
        match serde_json::from_value(value) {
            Ok(record) => {
                decoded.insert(key, record);
            }
            Err(e) => tracing::warn!("Skipping invalid {} entry '{}': {}", kind, key, e),
        }
    }
    decoded
}
