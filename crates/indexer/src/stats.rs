use filemap_vector_store::Document;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Statistics about one pipeline run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateStats {
    /// Path of the appended document, relative to the watch root
    pub path: String,

    /// Corpus size after the run
    pub documents: usize,

    /// Distinct terms in the rebuilt vocabulary
    pub vocabulary: usize,

    /// Time taken in milliseconds
    pub duration_ms: u64,

    /// Whether the snapshot write succeeded
    pub persisted: bool,
}

/// Full corpus state after a successful `update`, as handed to subscribers.
#[derive(Debug, Clone)]
pub struct MapUpdate {
    pub documents: Arc<[Document]>,
    pub stats: UpdateStats,
}
