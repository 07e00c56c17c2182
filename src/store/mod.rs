//! Request Store
//!
//! This module handles:
//! - Persisting submitted requests and assigning their identity
//! - Ordered scans by status, priority and intake time
//! - Check-and-set status updates validated against the lifecycle
//! - Change feeds keyed by global revision

mod memory;

pub use memory::MemoryRequestStore;

use aeroreach_shared::{
    DispatchResult, NewRequest, Priority, Request, RequestFilter, RequestStatus,
};
use async_trait::async_trait;
use std::cmp::Ordering;

/// A requested status change
#[derive(Debug, Clone, PartialEq)]
pub struct StatusChange {
    pub status: RequestStatus,
    /// Required when entering `dispatched`, ignored otherwise
    pub drone_id: Option<String>,
    /// Progress to record with the change
    pub progress: Option<u8>,
    /// Fail with `Conflict` unless the record is still at this version
    pub expected_version: Option<u64>,
}

impl StatusChange {
    pub fn to(status: RequestStatus) -> Self {
        Self {
            status,
            drone_id: None,
            progress: None,
            expected_version: None,
        }
    }

    pub fn with_drone(mut self, drone_id: impl Into<String>) -> Self {
        self.drone_id = Some(drone_id.into());
        self
    }

    pub fn with_progress(mut self, progress: u8) -> Self {
        self.progress = Some(progress);
        self
    }

    pub fn expecting(mut self, version: u64) -> Self {
        self.expected_version = Some(version);
        self
    }
}

/// Result of a successful status change
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub request: Request,
    pub previous_status: RequestStatus,
    /// Drone the request held before the change, when the change ended the
    /// flight. The caller that receives it owns releasing it.
    pub released_drone: Option<String>,
}

/// Persistence contract for requests
///
/// Implementations must make every write a single atomic check-and-set on
/// one record and must never block waiting for another writer's outcome.
#[async_trait]
pub trait RequestStore: Send + Sync {
    /// Persist a new `pending` request
    async fn create(&self, fields: NewRequest, priority: Priority) -> DispatchResult<Request>;

    async fn get(&self, id: &str) -> DispatchResult<Request>;

    /// Requests in `status`, in dispatch order
    async fn list_by_status(&self, status: RequestStatus) -> DispatchResult<Vec<Request>>;

    /// Requests matching `filter`, in dispatch order
    async fn list(&self, filter: &RequestFilter) -> DispatchResult<Vec<Request>>;

    /// Apply a lifecycle transition
    async fn update_status(&self, id: &str, change: StatusChange) -> DispatchResult<Transition>;

    /// Raise the progress of an in-flight request without changing status
    async fn record_progress(
        &self,
        id: &str,
        expected_version: u64,
        progress: u8,
    ) -> DispatchResult<Request>;

    /// Requests mutated after `revision`, oldest change first
    async fn changed_since(&self, revision: u64) -> DispatchResult<Vec<Request>>;
}

/// Dispatch order: priority descending, then FIFO by intake
pub fn dispatch_order(a: &Request, b: &Request) -> Ordering {
    b.priority
        .cmp(&a.priority)
        .then(a.created_at.cmp(&b.created_at))
        .then(a.sequence.cmp(&b.sequence))
}
