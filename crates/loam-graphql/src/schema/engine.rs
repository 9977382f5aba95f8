//! The content engine: holds the active compiled schema and executes
//! requests against it.
//!
//! Compilation is all-or-nothing. A rebuild compiles the new schema off
//! to the side and swaps the active pointer only on success, so a broken
//! schema never takes down a serving engine and requests in flight keep
//! the snapshot they started with.

use std::sync::Arc;

use arc_swap::ArcSwap;
use async_graphql::dynamic::Schema as DynamicSchema;
use async_graphql::{Request, Response, ServerError};
use tracing::{debug, info};

use loam_core::Schema;
use loam_storage::DynStore;

use crate::context::GraphQLContext;
use crate::error::EngineError;
use crate::locks::MutationLocks;
use crate::schema::{SchemaSnapshot, TypeBuilder};

/// One schema revision compiled to an executable type graph.
pub struct CompiledSchema {
    /// The snapshot the type graph was built from.
    pub snapshot: Arc<SchemaSnapshot>,
    /// The executable GraphQL schema.
    pub graphql: DynamicSchema,
}

fn compile(schema: Schema) -> Result<CompiledSchema, EngineError> {
    let snapshot = Arc::new(SchemaSnapshot::compile(schema)?);
    let graphql = TypeBuilder::new(Arc::clone(&snapshot)).build()?;
    Ok(CompiledSchema { snapshot, graphql })
}

/// Executes queries and mutations against a schema-driven content store.
pub struct ContentEngine {
    store: DynStore,
    locks: Arc<MutationLocks>,
    current: ArcSwap<CompiledSchema>,
}

impl ContentEngine {
    /// Compiles the schema and readies the engine.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::SchemaCompile`] or
    /// [`EngineError::SchemaBuild`] if the schema does not compile.
    pub fn new(schema: Schema, store: DynStore) -> Result<Self, EngineError> {
        let compiled = compile(schema)?;
        info!(
            collections = compiled.snapshot.schema.collections.len(),
            types = compiled.snapshot.names.len(),
            "content engine ready"
        );
        Ok(Self {
            store,
            locks: Arc::new(MutationLocks::default()),
            current: ArcSwap::from_pointee(compiled),
        })
    }

    /// Recompiles with a new schema and atomically swaps it in.
    ///
    /// On error the previously active schema stays in place.
    ///
    /// # Errors
    ///
    /// Returns the compilation error of the rejected schema.
    pub fn rebuild(&self, schema: Schema) -> Result<(), EngineError> {
        let compiled = compile(schema)?;
        info!(
            collections = compiled.snapshot.schema.collections.len(),
            "schema rebuilt"
        );
        self.current.store(Arc::new(compiled));
        Ok(())
    }

    /// The currently active compiled schema.
    #[must_use]
    pub fn compiled(&self) -> Arc<CompiledSchema> {
        self.current.load_full()
    }

    /// SDL rendering of the active schema.
    #[must_use]
    pub fn sdl(&self) -> String {
        self.current.load().graphql.sdl()
    }

    /// Executes one request against the active schema.
    pub async fn execute(&self, request: impl Into<Request>) -> Response {
        let compiled = self.current.load_full();
        let context = GraphQLContext::builder()
            .with_store(self.store.clone())
            .with_locks(Arc::clone(&self.locks))
            .build();
        match context {
            Ok(context) => {
                debug!(request_id = %context.request_id, "executing request");
                compiled.graphql.execute(request.into().data(context)).await
            }
            Err(err) => Response::from_errors(vec![ServerError::new(err.to_string(), None)]),
        }
    }
}
