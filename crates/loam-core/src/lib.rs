//! # loam-core
//!
//! Core types for the Loam content engine:
//!
//! - The declarative content schema (collections, templates, fields)
//!   and its validation rules
//! - Deterministic type-name resolution for every generated GraphQL artifact
//! - Document system metadata, global ids, and form descriptors
//!
//! Everything in this crate is pure data and pure functions; I/O and
//! query execution live in `loam-storage` and `loam-graphql`.

pub mod document;
pub mod error;
pub mod names;
pub mod schema;

pub use document::{decode_id, encode_id, form_descriptor, SystemInfo};
pub use error::SchemaError;
pub use names::{type_name, ArtifactKind, NameRegistry, SchemaPath};
pub use schema::{Collection, CollectionTemplates, Field, FieldMeta, Format, Schema, Template};

/// Result type for schema compilation.
pub type Result<T> = std::result::Result<T, SchemaError>;
