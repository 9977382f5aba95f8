//! Engine error types.

use async_graphql::ErrorExtensions;

use loam_core::SchemaError;
use loam_storage::StorageError;

/// Errors surfaced by schema compilation and query execution.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The schema violated a structural invariant.
    #[error("schema compilation failed: {0}")]
    SchemaCompile(#[from] SchemaError),

    /// The compiled type graph was rejected by the GraphQL layer.
    #[error("schema build failed: {0}")]
    SchemaBuild(String),

    /// The requested document or collection does not exist.
    #[error("not found: {collection}/{relative_path}")]
    NotFound {
        /// Owning collection.
        collection: String,
        /// Path relative to the collection root.
        relative_path: String,
    },

    /// A document already occupies the target path.
    #[error("document already exists: {collection}/{relative_path}")]
    AlreadyExists {
        /// Owning collection.
        collection: String,
        /// Path relative to the collection root.
        relative_path: String,
    },

    /// Stored content does not match the compiled schema.
    #[error("schema mismatch: {message}")]
    SchemaMismatch {
        /// Description of the mismatch.
        message: String,
    },

    /// A mutation payload failed validation.
    #[error("validation failed at `{path}`: {message}")]
    Validation {
        /// Dotted path to the offending field.
        path: String,
        /// Description of the violation.
        message: String,
    },

    /// A concurrent mutation already holds the per-document lock.
    #[error("concurrent mutation in flight for {collection}/{relative_path}")]
    Conflict {
        /// Owning collection.
        collection: String,
        /// Path relative to the collection root.
        relative_path: String,
    },

    /// The storage backend failed.
    #[error("storage error: {0}")]
    Storage(String),

    /// An internal invariant was violated.
    #[error("internal error: {0}")]
    Internal(String),
}

impl EngineError {
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

    /// Creates a new `SchemaMismatch` error.
    #[must_use]
    pub fn mismatch(message: impl Into<String>) -> Self {
        Self::SchemaMismatch {
            message: message.into(),
        }
    }

    /// Creates a new `Validation` error.
    #[must_use]
    pub fn validation(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Creates a new `Conflict` error.
    #[must_use]
    pub fn conflict(collection: impl Into<String>, relative_path: impl Into<String>) -> Self {
        Self::Conflict {
            collection: collection.into(),
            relative_path: relative_path.into(),
        }
    }

    /// Creates a new `Internal` error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Stable machine-readable error code, exposed in error extensions.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::SchemaCompile(_) => "SCHEMA_COMPILE_ERROR",
            Self::SchemaBuild(_) => "SCHEMA_BUILD_ERROR",
            Self::NotFound { .. } => "NOT_FOUND",
            Self::AlreadyExists { .. } => "ALREADY_EXISTS",
            Self::SchemaMismatch { .. } => "SCHEMA_MISMATCH",
            Self::Validation { .. } => "VALIDATION_ERROR",
            Self::Conflict { .. } => "CONFLICT",
            Self::Storage(_) => "STORAGE_ERROR",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }

    /// Returns `true` if this is a not found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Returns `true` if this is a conflict error.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }
}

impl From<StorageError> for EngineError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound {
                collection,
                relative_path,
            } => Self::NotFound {
                collection,
                relative_path,
            },
            StorageError::AlreadyExists {
                collection,
                relative_path,
            } => Self::AlreadyExists {
                collection,
                relative_path,
            },
            other => Self::Storage(other.to_string()),
        }
    }
}

impl ErrorExtensions for EngineError {
    fn extend(&self) -> async_graphql::Error {
        let code = self.error_code();
        async_graphql::Error::new(self.to_string()).extend_with(|_, e| e.set("code", code))
    }
}

/// Result type for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;
