//! In-memory mutation queue

use std::collections::BTreeSet;

use parking_lot::Mutex;
use tracing::debug;

use docstore_core::{
    BatchId, DocumentKey, Mutation, MutationBatch, MutationQueue, StoreError, StoreResult,
};

#[derive(Debug)]
struct QueueState {
    batches: Vec<MutationBatch>,
    next_batch_id: BatchId,
}

/// Mutation queue holding batches in id order
#[derive(Debug)]
pub struct MemoryMutationQueue {
    state: Mutex<QueueState>,
}

impl MemoryMutationQueue {
    /// Create an empty queue; the first batch gets id 1
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                batches: Vec::new(),
                next_batch_id: 1,
            }),
        }
    }

    /// Number of queued batches
    pub fn len(&self) -> usize {
        self.state.lock().batches.len()
    }

    /// True if no batch is queued
    pub fn is_empty(&self) -> bool {
        self.state.lock().batches.is_empty()
    }
}

impl Default for MemoryMutationQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MutationQueue for MemoryMutationQueue {
    fn add_mutation_batch(&self, mutations: Vec<Mutation>) -> StoreResult<MutationBatch> {
        let mut state = self.state.lock();
        let batch = MutationBatch::new(state.next_batch_id, mutations);
        state.next_batch_id += 1;
        state.batches.push(batch.clone());
        debug!(
            target: "docstore::local",
            batch_id = batch.batch_id(),
            mutations = batch.mutations().len(),
            "Mutation batch queued"
        );
        Ok(batch)
    }

    fn lookup_mutation_batch(&self, batch_id: BatchId) -> StoreResult<Option<MutationBatch>> {
        let state = self.state.lock();
        Ok(state.batches.iter().find(|b| b.batch_id() == batch_id).cloned())
    }

    fn all_mutation_batches(&self) -> StoreResult<Vec<MutationBatch>> {
        Ok(self.state.lock().batches.clone())
    }

    fn all_mutation_batches_affecting_keys(
        &self,
        keys: &BTreeSet<DocumentKey>,
    ) -> StoreResult<Vec<MutationBatch>> {
        let state = self.state.lock();
        Ok(state
            .batches
            .iter()
            .filter(|batch| batch.mutations().iter().any(|m| keys.contains(m.key())))
            .cloned()
            .collect())
    }

    fn remove_mutation_batch(&self, batch_id: BatchId) -> StoreResult<()> {
        let mut state = self.state.lock();
        let position = state
            .batches
            .iter()
            .position(|b| b.batch_id() == batch_id)
            .ok_or(StoreError::BatchNotFound(batch_id))?;
        state.batches.remove(position);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn delete(path: &str) -> Mutation {
        Mutation::Delete {
            key: DocumentKey::from_path_str(path).unwrap(),
        }
    }

    #[test]
    fn test_batch_ids_increase_from_one() {
        let queue = MemoryMutationQueue::new();
        let b1 = queue.add_mutation_batch(vec![delete("coll/a")]).unwrap();
        let b2 = queue.add_mutation_batch(vec![delete("coll/b")]).unwrap();
        assert_eq!(b1.batch_id(), 1);
        assert_eq!(b2.batch_id(), 2);
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_lookup_and_remove() {
        let queue = MemoryMutationQueue::new();
        let batch = queue.add_mutation_batch(vec![delete("coll/a")]).unwrap();
        assert_eq!(queue.lookup_mutation_batch(batch.batch_id()).unwrap(), Some(batch.clone()));

        queue.remove_mutation_batch(batch.batch_id()).unwrap();
        assert!(queue.is_empty());
        assert_eq!(queue.lookup_mutation_batch(batch.batch_id()).unwrap(), None);
        assert_eq!(
            queue.remove_mutation_batch(batch.batch_id()),
            Err(StoreError::BatchNotFound(batch.batch_id()))
        );
    }

    #[test]
    fn test_batches_affecting_keys() {
        let queue = MemoryMutationQueue::new();
        queue.add_mutation_batch(vec![delete("coll/a")]).unwrap();
        queue.add_mutation_batch(vec![delete("coll/b"), delete("coll/c")]).unwrap();
        queue.add_mutation_batch(vec![delete("coll/c")]).unwrap();

        let keys = [DocumentKey::from_path_str("coll/c").unwrap()].into_iter().collect();
        let ids: Vec<_> = queue
            .all_mutation_batches_affecting_keys(&keys)
            .unwrap()
            .iter()
            .map(MutationBatch::batch_id)
            .collect();
        assert_eq!(ids, vec![2, 3]);
    }
}
