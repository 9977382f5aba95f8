//! # loam-storage
//!
//! Document store abstraction for the Loam content engine.
//!
//! The query engine never touches bytes on disk; it speaks to a
//! [`DocumentStore`] which owns durable persistence (filesystem,
//! git-backed, in-memory). Backends must be thread-safe and are consumed
//! as `Arc<dyn DocumentStore>` ([`DynStore`]).

pub mod error;
pub mod traits;
pub mod types;

pub use error::StorageError;
pub use traits::{DocumentStore, DynStore};
pub use types::StoredDocument;

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;
