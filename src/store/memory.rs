//! In-memory request store

use super::{dispatch_order, RequestStore, StatusChange, Transition};
use crate::revision::Revisions;
use aeroreach_shared::{
    now_ms, state_machine, DispatchError, DispatchResult, NewRequest, Priority, Request,
    RequestFilter, RequestStatus,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Request store backed by a map of records.
///
/// Write sections hold the map lock only for the duration of the
/// check-and-set and never await while holding it.
pub struct MemoryRequestStore {
    /// Map of request id -> record
    requests: Arc<RwLock<HashMap<String, Request>>>,
    sequence: AtomicU64,
    revisions: Revisions,
}

impl MemoryRequestStore {
    /// Create an empty store stamping mutations from `revisions`
    pub fn new(revisions: Revisions) -> Self {
        Self {
            requests: Arc::new(RwLock::new(HashMap::new())),
            sequence: AtomicU64::new(0),
            revisions,
        }
    }

    async fn collect(&self, predicate: impl Fn(&Request) -> bool) -> Vec<Request> {
        let requests = self.requests.read().await;
        let mut matched: Vec<Request> = requests.values().filter(|r| predicate(r)).cloned().collect();
        matched.sort_by(dispatch_order);
        matched
    }
}

#[async_trait]
impl RequestStore for MemoryRequestStore {
    async fn create(&self, fields: NewRequest, priority: Priority) -> DispatchResult<Request> {
        // Revision and sequence are allocated under the lock so readers never
        // observe a later revision before an earlier one
        let mut requests = self.requests.write().await;
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst) + 1;
        let now = now_ms();

        let request = Request {
            id: format!("REQ-{:06}", sequence),
            user_id: fields.user_id,
            name: fields.name,
            age: fields.age,
            location: fields.location,
            coordinates: fields.coordinates,
            injury_category: fields.injury_category,
            injury_type: fields.injury_type,
            injury_description: fields.injury_description,
            priority,
            status: RequestStatus::Pending,
            drone_id: None,
            dispatch_time: None,
            progress: 0,
            created_at: now,
            updated_at: now,
            sequence,
            version: 1,
            revision: self.revisions.next(),
        };

        requests.insert(request.id.clone(), request.clone());

        Ok(request)
    }

    async fn get(&self, id: &str) -> DispatchResult<Request> {
        let requests = self.requests.read().await;
        requests
            .get(id)
            .cloned()
            .ok_or_else(|| DispatchError::request_not_found(id))
    }

    async fn list_by_status(&self, status: RequestStatus) -> DispatchResult<Vec<Request>> {
        Ok(self.collect(|r| r.status == status).await)
    }

    async fn list(&self, filter: &RequestFilter) -> DispatchResult<Vec<Request>> {
        let mut matched = self.collect(|r| filter.matches(r)).await;
        if let Some(limit) = filter.limit {
            matched.truncate(limit);
        }
        Ok(matched)
    }

    async fn update_status(&self, id: &str, change: StatusChange) -> DispatchResult<Transition> {
        let mut requests = self.requests.write().await;
        let record = requests
            .get_mut(id)
            .ok_or_else(|| DispatchError::request_not_found(id))?;

        if let Some(expected) = change.expected_version {
            if record.version != expected {
                return Err(DispatchError::Conflict {
                    id: id.to_string(),
                    expected,
                    actual: record.version,
                });
            }
        }

        state_machine::check_transition(record.status, change.status)?;

        if change.status == RequestStatus::Dispatched && change.drone_id.is_none() {
            return Err(DispatchError::Validation(format!(
                "dispatching {} requires a drone",
                id
            )));
        }

        let previous_status = record.status;
        let now = now_ms();

        // All checks passed; from here on the change is applied in full
        let released_drone = if change.status.is_active() {
            None
        } else {
            record.drone_id.take()
        };

        match change.status {
            RequestStatus::Dispatched => {
                record.drone_id = change.drone_id;
                record.dispatch_time.get_or_insert(now);
                record.progress = 0;
            }
            RequestStatus::InTransit => {
                if let Some(progress) = change.progress {
                    record.progress = record.progress.max(progress.min(100));
                }
            }
            RequestStatus::Delivered => {
                record.progress = state_machine::PROGRESS_COMPLETE;
            }
            RequestStatus::Completed | RequestStatus::Cancelled | RequestStatus::Pending => {}
        }

        record.status = change.status;
        record.updated_at = now;
        record.version += 1;
        record.revision = self.revisions.next();

        Ok(Transition {
            request: record.clone(),
            previous_status,
            released_drone,
        })
    }

    async fn record_progress(
        &self,
        id: &str,
        expected_version: u64,
        progress: u8,
    ) -> DispatchResult<Request> {
        let mut requests = self.requests.write().await;
        let record = requests
            .get_mut(id)
            .ok_or_else(|| DispatchError::request_not_found(id))?;

        if record.version != expected_version {
            return Err(DispatchError::Conflict {
                id: id.to_string(),
                expected: expected_version,
                actual: record.version,
            });
        }

        if !record.status.is_active() {
            return Err(DispatchError::InvalidTransition {
                from: record.status,
                to: RequestStatus::InTransit,
            });
        }

        let progress = record.progress.max(progress.min(100));
        if progress != record.progress {
            record.progress = progress;
            record.updated_at = now_ms();
            record.version += 1;
            record.revision = self.revisions.next();
        }

        Ok(record.clone())
    }

    async fn changed_since(&self, revision: u64) -> DispatchResult<Vec<Request>> {
        let requests = self.requests.read().await;
        let mut changed: Vec<Request> = requests
            .values()
            .filter(|r| r.revision > revision)
            .cloned()
            .collect();
        changed.sort_by_key(|r| r.revision);
        Ok(changed)
    }
}
