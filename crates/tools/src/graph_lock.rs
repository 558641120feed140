//! Per-graph write serialization.
//!
//! Mutating tools rewrite the whole graph document (fetch, modify, save),
//! and the storage service offers no conditional write. Two such cycles on
//! the same graph must not overlap or the later save drops the earlier
//! change. Cycles on different graphs run concurrently.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use gw_domain::error::{Error, Result};

/// Each graph id maps to a `Semaphore(1)`; holding the permit grants
/// exclusive write access to that graph.
#[derive(Debug, Default)]
pub struct GraphLockMap {
    locks: Mutex<HashMap<String, Arc<Semaphore>>>,
}

impl GraphLockMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `graph_id`. Released when the permit
    /// is dropped.
    pub async fn acquire(&self, graph_id: &str) -> Result<OwnedSemaphorePermit> {
        let sem = {
            let mut locks = self.locks.lock();
            // Entries nobody holds or waits on only cost memory.
            locks.retain(|_, sem| Arc::strong_count(sem) > 1);
            locks
                .entry(graph_id.to_owned())
                .or_insert_with(|| Arc::new(Semaphore::new(1)))
                .clone()
        };
        sem.acquire_owned()
            .await
            .map_err(|_| Error::Other(format!("write lock for graph '{graph_id}' closed")))
    }

    /// Number of graphs with a live lock entry.
    pub fn graph_count(&self) -> usize {
        self.locks.lock().len()
    }
}
