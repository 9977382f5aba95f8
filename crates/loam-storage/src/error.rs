//! Storage error types.

/// Errors that can occur during document store operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The requested document was not found.
    #[error("document not found: {collection}/{relative_path}")]
    NotFound {
        /// Owning collection.
        collection: String,
        /// Path relative to the collection root.
        relative_path: String,
    },

    /// Attempted to create a document at an occupied path.
    #[error("document already exists: {collection}/{relative_path}")]
    AlreadyExists {
        /// Owning collection.
        collection: String,
        /// Path relative to the collection root.
        relative_path: String,
    },

    /// The backend failed to read or persist bytes.
    #[error("i/o error: {message}")]
    Io {
        /// Description of the failure.
        message: String,
    },

    /// An internal storage error occurred.
    #[error("internal storage error: {message}")]
    Internal {
        /// Description of the failure.
        message: String,
    },
}

impl StorageError {
    /// Creates a new `NotFound` error.
    #[must_use]
    pub fn not_found(collection: impl Into<String>, relative_path: impl Into<String>) -> Self {
        Self::NotFound {
            collection: collection.into(),
            relative_path: relative_path.into(),
        }
    }

    /// Creates a new `AlreadyExists` error.
    #[must_use]
    pub fn already_exists(
        collection: impl Into<String>,
        relative_path: impl Into<String>,
    ) -> Self {
        Self::AlreadyExists {
            collection: collection.into(),
            relative_path: relative_path.into(),
        }
    }

    /// Creates a new `Io` error.
    #[must_use]
    pub fn io(message: impl Into<String>) -> Self {
        Self::Io {
            message: message.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns `true` if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if this is an already exists error.
    #[must_use]
    pub fn is_already_exists(&self) -> bool {
        matches!(self, Self::AlreadyExists { .. })
    }
}
