//! Global revision counter shared by the request store and fleet registry

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Monotonic stamp applied to every mutation, backing "changed since" reads
#[derive(Debug, Clone, Default)]
pub struct Revisions {
    counter: Arc<AtomicU64>,
}

impl Revisions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Allocate the revision for a new mutation
    pub fn next(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Latest allocated revision
    pub fn current(&self) -> u64 {
        self.counter.load(Ordering::SeqCst)
    }
}
