//! In-memory implementations of the collaborator traits
//!
//! - [`MemoryRemoteDocumentCache`]: key-ordered document map
//! - [`MemoryDocumentOverlayCache`]: one overlay per key, indexed by batch id
//! - [`MemoryMutationQueue`]: batches in id order
//! - [`MemoryIndexManager`]: collection parent index
//! - [`MemoryPersistence`]: all four, wired together

mod index_manager;
mod mutation_queue;
mod overlay_cache;
mod remote_document_cache;

pub use index_manager::MemoryIndexManager;
pub use mutation_queue::MemoryMutationQueue;
pub use overlay_cache::MemoryDocumentOverlayCache;
pub use remote_document_cache::MemoryRemoteDocumentCache;

use std::sync::Arc;

use docstore_core::{DocumentOverlayCache, IndexManager, MutationQueue, RemoteDocumentCache};

use crate::local_documents::LocalDocumentsView;

/// The in-memory storage subsystem
///
/// Owns the concrete caches and hands out shared trait-object handles to
/// them. The remote document cache reports new collections to the index
/// manager from the start.
#[derive(Debug, Clone)]
pub struct MemoryPersistence {
    remote_document_cache: Arc<MemoryRemoteDocumentCache>,
    document_overlay_cache: Arc<MemoryDocumentOverlayCache>,
    mutation_queue: Arc<MemoryMutationQueue>,
    index_manager: Arc<MemoryIndexManager>,
}

impl MemoryPersistence {
    /// Create an empty store
    pub fn new() -> Self {
        let persistence = Self {
            remote_document_cache: Arc::new(MemoryRemoteDocumentCache::new()),
            document_overlay_cache: Arc::new(MemoryDocumentOverlayCache::new()),
            mutation_queue: Arc::new(MemoryMutationQueue::new()),
            index_manager: Arc::new(MemoryIndexManager::new()),
        };
        persistence
            .remote_document_cache
            .set_index_manager(persistence.index_manager.clone());
        persistence
    }

    /// Remote document cache
    pub fn remote_document_cache(&self) -> Arc<dyn RemoteDocumentCache> {
        self.remote_document_cache.clone()
    }

    /// Overlay cache
    pub fn document_overlay_cache(&self) -> Arc<dyn DocumentOverlayCache> {
        self.document_overlay_cache.clone()
    }

    /// Mutation queue
    pub fn mutation_queue(&self) -> Arc<dyn MutationQueue> {
        self.mutation_queue.clone()
    }

    /// Index manager
    pub fn index_manager(&self) -> Arc<dyn IndexManager> {
        self.index_manager.clone()
    }

    /// Local documents view over the four components
    pub fn local_documents_view(&self) -> LocalDocumentsView {
        LocalDocumentsView::new(
            self.remote_document_cache(),
            self.mutation_queue(),
            self.document_overlay_cache(),
            self.index_manager(),
        )
    }
}

impl Default for MemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}
