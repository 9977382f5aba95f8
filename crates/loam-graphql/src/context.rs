//! Per-request execution context.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use loam_storage::DynStore;

use crate::error::EngineError;
use crate::locks::MutationLocks;

static REQUEST_COUNTER: AtomicU64 = AtomicU64::new(0);

fn next_request_id() -> String {
    format!("req-{}", REQUEST_COUNTER.fetch_add(1, Ordering::Relaxed))
}

/// Context attached to every executed request.
///
/// Resolvers pull this out of the request data to reach the document
/// store and the mutation lock registry.
#[derive(Clone)]
pub struct GraphQLContext {
    /// Document store backend.
    pub store: DynStore,
    /// Shared per-document mutation locks.
    pub locks: Arc<MutationLocks>,
    /// Identifier correlating log lines for one request.
    pub request_id: String,
}

impl GraphQLContext {
    /// Starts building a context.
    #[must_use]
    pub fn builder() -> GraphQLContextBuilder {
        GraphQLContextBuilder::default()
    }
}

impl std::fmt::Debug for GraphQLContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphQLContext")
            .field("request_id", &self.request_id)
            .finish_non_exhaustive()
    }
}

/// Builder for [`GraphQLContext`].
#[derive(Default)]
pub struct GraphQLContextBuilder {
    store: Option<DynStore>,
    locks: Option<Arc<MutationLocks>>,
    request_id: Option<String>,
}

impl GraphQLContextBuilder {
    /// Sets the document store.
    #[must_use]
    pub fn with_store(mut self, store: DynStore) -> Self {
        self.store = Some(store);
        self
    }

    /// Sets the shared mutation lock registry.
    #[must_use]
    pub fn with_locks(mut self, locks: Arc<MutationLocks>) -> Self {
        self.locks = Some(locks);
        self
    }

    /// Overrides the generated request id.
    #[must_use]
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Builds the context.
    ///
    /// # Errors
    ///
    /// Returns an internal error if the store was not provided.
    pub fn build(self) -> Result<GraphQLContext, EngineError> {
        let store = self
            .store
            .ok_or_else(|| EngineError::internal("context is missing a document store"))?;
        Ok(GraphQLContext {
            store,
            locks: self.locks.unwrap_or_default(),
            request_id: self.request_id.unwrap_or_else(next_request_id),
        })
    }
}
