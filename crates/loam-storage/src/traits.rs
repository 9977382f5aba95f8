//! The document store trait.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StorageError;
use crate::types::StoredDocument;

/// Shared handle to a document store backend.
pub type DynStore = Arc<dyn DocumentStore>;

/// Contract every document store backend must implement.
///
/// The engine's write path ends at [`DocumentStore::write`]: it hands the
/// backend a fully validated, merged document and the backend owns
/// serialization and durability. Implementations must be thread-safe
/// (`Send + Sync`); calls may block on I/O and are cancelled by dropping
/// the returned future.
///
/// # Example
///
/// ```ignore
/// use loam_storage::{DocumentStore, StorageError, StoredDocument};
///
/// async fn fetch(
///     store: &dyn DocumentStore,
///     path: &str,
/// ) -> Result<StoredDocument, StorageError> {
///     store
///         .read("posts", path)
///         .await?
///         .ok_or_else(|| StorageError::not_found("posts", path))
/// }
/// ```
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Reads a document by collection and relative path.
    ///
    /// Returns `None` if the document does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues, not for missing
    /// documents.
    async fn read(
        &self,
        collection: &str,
        relative_path: &str,
    ) -> Result<Option<StoredDocument>, StorageError>;

    /// Lists the relative paths of all documents in a collection, in the
    /// backend's natural order. Callers must not rely on that order being
    /// sorted.
    ///
    /// # Errors
    ///
    /// Returns an error for infrastructure issues. An unknown collection
    /// yields an empty list.
    async fn list(&self, collection: &str) -> Result<Vec<String>, StorageError>;

    /// Persists a document's serialized form.
    ///
    /// Overwrites any existing document at the path; existence checks
    /// belong to the caller via [`DocumentStore::exists`].
    ///
    /// # Errors
    ///
    /// Returns `StorageError::Io` if the backend cannot persist.
    async fn write(
        &self,
        collection: &str,
        relative_path: &str,
        template: &str,
        values: &Value,
    ) -> Result<(), StorageError>;

    /// Returns whether a document exists at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error only for infrastructure issues.
    async fn exists(&self, collection: &str, relative_path: &str) -> Result<bool, StorageError>;
}
