//! In-process document store with the same transactional contract as the
//! file store. Intended for tests and embedding.

use super::{DocumentStore, StoreResult, TxOutcome};
use crate::model::document::Document;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Memory-backed store. Closures mutate a scratch copy which only replaces the
/// current document when the transaction reports a change.
#[derive(Debug, Default)]
pub struct MemoryDocumentStore {
    doc: Mutex<Document>,
    commits: AtomicUsize,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Starts from an existing document.
    pub fn with_document(doc: Document) -> Self {
        Self {
            doc: Mutex::new(doc),
            commits: AtomicUsize::new(0),
        }
    }

    /// Copy of the current document.
    pub fn snapshot(&self) -> Document {
        self.doc.lock().clone()
    }

    /// Number of transactions that persisted a change.
    pub fn commit_count(&self) -> usize {
        self.commits.load(Ordering::SeqCst)
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn transact<R, F>(&self, f: F) -> StoreResult<R>
    where
        F: FnOnce(&mut Document) -> TxOutcome<R>,
    {
        let mut current = self.doc.lock();
        let mut scratch = current.clone();
        let outcome = f(&mut scratch);
        if outcome.is_changed() {
            scratch.validate()?;
            *current = scratch;
            self.commits.fetch_add(1, Ordering::SeqCst);
        }
        Ok(outcome.into_value())
    }
}
