//! # loam-db-memory
//!
//! In-memory [`DocumentStore`] backend.
//!
//! Backs the integration test suite and embedders that want a content
//! engine without durable storage. Documents live in a concurrent map
//! keyed by `(collection, relativePath)`.

use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;

use loam_storage::{DocumentStore, StorageError, StoredDocument};

type StorageKey = (String, String);

fn make_key(collection: &str, relative_path: &str) -> StorageKey {
    (collection.to_string(), relative_path.to_string())
}

/// In-memory document store over a concurrent hash map.
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: DashMap<StorageKey, StoredDocument>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a document, replacing any existing one at the path.
    pub fn insert(
        &self,
        collection: &str,
        relative_path: &str,
        template: &str,
        values: Value,
    ) {
        self.data.insert(
            make_key(collection, relative_path),
            StoredDocument::new(template, values),
        );
    }

    /// Removes a document; returns whether it was present.
    pub fn remove(&self, collection: &str, relative_path: &str) -> bool {
        self.data.remove(&make_key(collection, relative_path)).is_some()
    }

    /// Number of stored documents across all collections.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the store holds no documents.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn read(
        &self,
        collection: &str,
        relative_path: &str,
    ) -> Result<Option<StoredDocument>, StorageError> {
        Ok(self
            .data
            .get(&make_key(collection, relative_path))
            .map(|entry| entry.value().clone()))
    }

    async fn list(&self, collection: &str) -> Result<Vec<String>, StorageError> {
        Ok(self
            .data
            .iter()
            .filter(|entry| entry.key().0 == collection)
            .map(|entry| entry.key().1.clone())
            .collect())
    }

    async fn write(
        &self,
        collection: &str,
        relative_path: &str,
        template: &str,
        values: &Value,
    ) -> Result<(), StorageError> {
        self.data.insert(
            make_key(collection, relative_path),
            StoredDocument::new(template, values.clone()),
        );
        Ok(())
    }

    async fn exists(&self, collection: &str, relative_path: &str) -> Result<bool, StorageError> {
        Ok(self.data.contains_key(&make_key(collection, relative_path)))
    }
}
