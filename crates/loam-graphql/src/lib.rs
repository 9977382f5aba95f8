//! # loam-graphql
//!
//! The schema-driven query engine: compiles a content [`Schema`] into an
//! executable GraphQL type graph and resolves queries and mutations
//! against a pluggable document store.
//!
//! The entry point is [`ContentEngine`]:
//!
//! ```ignore
//! use std::sync::Arc;
//!
//! use loam_core::Schema;
//! use loam_db_memory::MemoryStore;
//! use loam_graphql::ContentEngine;
//!
//! let schema = Schema::from_json(config)?;
//! let engine = ContentEngine::new(schema, Arc::new(MemoryStore::new()))?;
//! let response = engine.execute("{ getCollections { name } }").await;
//! ```
//!
//! [`Schema`]: loam_core::Schema

pub mod context;
pub mod error;
pub mod locks;
pub mod schema;

mod merge;
mod resolvers;

pub use context::{GraphQLContext, GraphQLContextBuilder};
pub use error::{EngineError, Result};
pub use locks::{MutationGuard, MutationLocks};
pub use schema::{CompiledSchema, ContentEngine, SchemaSnapshot, TypeBuilder};
