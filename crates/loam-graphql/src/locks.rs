//! Per-document mutation serialization.
//!
//! Mutations on the same `(collection, relativePath)` must not interleave
//! their read-merge-write cycle. A mutation acquires the path's slot up
//! front and holds it for the whole cycle; a second mutation arriving
//! while the slot is held fails fast with a conflict instead of queueing.

use std::sync::Arc;

use dashmap::DashMap;

use crate::error::EngineError;
use loam_core::encode_id;

/// Registry of in-flight mutation paths.
#[derive(Debug, Default)]
pub struct MutationLocks {
    inflight: DashMap<String, ()>,
}

impl MutationLocks {
    /// Claims the mutation slot for a document path.
    ///
    /// The slot is released when the returned guard drops.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Conflict`] if another mutation currently
    /// holds the slot.
    pub fn acquire(
        self: &Arc<Self>,
        collection: &str,
        relative_path: &str,
    ) -> Result<MutationGuard, EngineError> {
        use dashmap::mapref::entry::Entry;

        let key = encode_id(collection, relative_path);
        match self.inflight.entry(key.clone()) {
            Entry::Occupied(_) => Err(EngineError::conflict(collection, relative_path)),
            Entry::Vacant(slot) => {
                slot.insert(());
                Ok(MutationGuard {
                    locks: Arc::clone(self),
                    key,
                })
            }
        }
    }

    /// Number of mutations currently in flight.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inflight.len()
    }
}

/// Holds a document's mutation slot; releases it on drop.
#[derive(Debug)]
pub struct MutationGuard {
    locks: Arc<MutationLocks>,
    key: String,
}

impl Drop for MutationGuard {
    fn drop(&mut self) {
        self.locks.inflight.remove(&self.key);
    }
}
