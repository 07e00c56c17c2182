//! Flight Tracker
//!
//! Advances simulated progress of every in-flight request by a fixed step
//! per tick and drives the `dispatched -> in_transit -> delivered` part of
//! the lifecycle. Each write is conditioned on the version read at the start
//! of the tick, so a request cancelled or completed meanwhile is skipped
//! rather than resurrected.

use crate::config::TrackerConfig;
use crate::fleet::FleetRegistry;
use crate::store::{RequestStore, StatusChange};
use aeroreach_shared::{
    state_machine::{self, PROGRESS_COMPLETE},
    DispatchError, DispatchResult, Request, RequestFilter, RequestStatus, TickReport,
};
use std::sync::Arc;
use tracing::{debug, error, info};

/// What happened to one request during a tick
#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Advanced,
    /// Carries the release error when the drone could not be handed back
    Delivered(Option<String>),
}

pub struct FlightTracker {
    requests: Arc<dyn RequestStore>,
    fleet: Arc<dyn FleetRegistry>,
    config: TrackerConfig,
}

impl FlightTracker {
    pub fn new(
        requests: Arc<dyn RequestStore>,
        fleet: Arc<dyn FleetRegistry>,
        config: TrackerConfig,
    ) -> Self {
        Self {
            requests,
            fleet,
            config,
        }
    }

    /// Advance every active request by one step.
    ///
    /// Fills the flight part of the report; `dispatched` is left to the
    /// caller. Requests that changed under the tick are listed in `skipped`.
    pub async fn advance(&self) -> DispatchResult<TickReport> {
        let active = self.requests.list(&RequestFilter::active()).await?;
        let mut report = TickReport::default();

        for request in active {
            match self.advance_one(&request).await {
                Ok(Step::Advanced) => report.advanced.push(request.id),
                Ok(Step::Delivered(release_error)) => {
                    if let Some(e) = release_error {
                        report.release_failures.push(format!("{}: {}", request.id, e));
                    }
                    report.delivered.push(request.id.clone());
                    report.advanced.push(request.id);
                }
                Err(
                    e @ (DispatchError::Conflict { .. }
                    | DispatchError::InvalidTransition { .. }
                    | DispatchError::NotFound { .. }),
                ) => {
                    debug!("[TRACK] {} changed during tick: {}", request.id, e);
                    report.skipped.push(request.id);
                }
                Err(e) => return Err(e),
            }
        }

        Ok(report)
    }

    async fn advance_one(&self, request: &Request) -> DispatchResult<Step> {
        let progress = request
            .progress
            .saturating_add(self.config.progress_step)
            .min(PROGRESS_COMPLETE);
        let next = state_machine::status_for_progress(request.status, progress).ok_or(
            DispatchError::InvalidTransition {
                from: request.status,
                to: RequestStatus::InTransit,
            },
        )?;

        if next == request.status {
            self.requests
                .record_progress(&request.id, request.version, progress)
                .await?;
            return Ok(Step::Advanced);
        }

        let change = StatusChange::to(next)
            .with_progress(progress)
            .expecting(request.version);
        let transition = self.requests.update_status(&request.id, change).await?;

        if next != RequestStatus::Delivered {
            debug!("[TRACK] {} now {}", request.id, next);
            return Ok(Step::Advanced);
        }

        info!(
            "[TRACK] {} delivered by {}",
            request.id,
            request.drone_id.as_deref().unwrap_or("?")
        );
        let mut release_error = None;
        if let Some(drone_id) = transition.released_drone {
            if let Err(e) = self.fleet.release(&drone_id, &request.id).await {
                // Request is already delivered; the audit reports the stranded drone
                error!(
                    "[TRACK] Releasing {} after delivering {} failed: {}",
                    drone_id, request.id, e
                );
                release_error = Some(e.to_string());
            }
        }
        Ok(Step::Delivered(release_error))
    }

    /// Minutes until delivery at the configured flight duration; `None`
    /// unless a drone is flying the request.
    pub fn eta_minutes(&self, request: &Request) -> Option<u32> {
        if !request.status.is_active() {
            return None;
        }
        let remaining = f64::from(PROGRESS_COMPLETE.saturating_sub(request.progress));
        let minutes = remaining * self.config.flight_minutes / f64::from(PROGRESS_COMPLETE);
        Some(minutes.ceil() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Backends;
    use aeroreach_shared::{Drone, DroneStatus, InjuryType};

    async fn dispatched(backends: &Backends, drone_id: &str) -> Request {
        let request = backends.pending(InjuryType::HeavyBleeding).await;
        backends.fleet.reserve(drone_id, &request.id).await.unwrap();
        backends
            .requests
            .update_status(
                &request.id,
                StatusChange::to(RequestStatus::Dispatched).with_drone(drone_id),
            )
            .await
            .unwrap()
            .request
    }

    fn tracker(backends: &Backends, step: u8) -> FlightTracker {
        FlightTracker::new(
            backends.requests.clone(),
            backends.fleet.clone(),
            TrackerConfig {
                progress_step: step,
                ..Default::default()
            },
        )
    }

    #[tokio::test]
    async fn test_first_tick_enters_transit() {
        let backends = Backends::with_drones(vec![Drone::new("DRONE-01", "Alpha", 90)]).await;
        let request = dispatched(&backends, "DRONE-01").await;

        let report = tracker(&backends, 2).advance().await.unwrap();
        assert_eq!(report.advanced, vec![request.id.clone()]);

        let request = backends.requests.get(&request.id).await.unwrap();
        assert_eq!(request.status, RequestStatus::InTransit);
        assert_eq!(request.progress, 2);
    }

    #[tokio::test]
    async fn test_progress_is_monotonic_until_delivery() {
        let backends = Backends::with_drones(vec![Drone::new("DRONE-01", "Alpha", 90)]).await;
        let request = dispatched(&backends, "DRONE-01").await;
        let tracker = tracker(&backends, 30);

        let mut last = 0;
        for _ in 0..3 {
            tracker.advance().await.unwrap();
            let current = backends.requests.get(&request.id).await.unwrap();
            assert!(current.progress > last);
            assert_eq!(current.status, RequestStatus::InTransit);
            last = current.progress;
        }

        let report = tracker.advance().await.unwrap();
        assert_eq!(report.delivered, vec![request.id.clone()]);

        let delivered = backends.requests.get(&request.id).await.unwrap();
        assert_eq!(delivered.status, RequestStatus::Delivered);
        assert_eq!(delivered.progress, 100);
        assert!(delivered.drone_id.is_none());

        let drone = backends.fleet.get("DRONE-01").await.unwrap();
        assert_eq!(drone.status, DroneStatus::Available);
        assert!(drone.assigned_request.is_none());

        // Nothing left to advance
        let idle = tracker.advance().await.unwrap();
        assert!(idle.advanced.is_empty());
    }

    #[tokio::test]
    async fn test_delivery_honors_maintenance_flag() {
        let backends = Backends::with_drones(vec![Drone::new("DRONE-01", "Alpha", 90)]).await;
        dispatched(&backends, "DRONE-01").await;
        backends.fleet.flag_maintenance("DRONE-01").await.unwrap();

        let tracker = tracker(&backends, 100);
        tracker.advance().await.unwrap();
        tracker.advance().await.unwrap();

        let drone = backends.fleet.get("DRONE-01").await.unwrap();
        assert_eq!(drone.status, DroneStatus::Maintenance);
    }

    #[tokio::test]
    async fn test_failed_release_is_reported() {
        let backends = Backends::with_drones(vec![Drone::new("DRONE-01", "Alpha", 90)]).await;
        // Assigned in the store without a matching reservation in the fleet
        let request = backends.pending(InjuryType::HeavyBleeding).await;
        backends
            .requests
            .update_status(
                &request.id,
                StatusChange::to(RequestStatus::Dispatched).with_drone("DRONE-01"),
            )
            .await
            .unwrap();

        let tracker = tracker(&backends, 100);
        let first = tracker.advance().await.unwrap();
        assert!(first.release_failures.is_empty());

        let report = tracker.advance().await.unwrap();
        assert_eq!(report.delivered, vec![request.id.clone()]);
        assert_eq!(report.release_failures.len(), 1);
        assert!(report.release_failures[0].starts_with(&request.id));

        let delivered = backends.requests.get(&request.id).await.unwrap();
        assert_eq!(delivered.status, RequestStatus::Delivered);
    }

    #[tokio::test]
    async fn test_cancelled_request_is_not_advanced() {
        let backends = Backends::with_drones(vec![Drone::new("DRONE-01", "Alpha", 90)]).await;
        let request = dispatched(&backends, "DRONE-01").await;

        // Cancel lands between the tracker's read and its write
        let stale = request.clone();
        let transition = backends
            .requests
            .update_status(&request.id, StatusChange::to(RequestStatus::Cancelled))
            .await
            .unwrap();
        assert_eq!(transition.released_drone.as_deref(), Some("DRONE-01"));

        let tracker = tracker(&backends, 2);
        let result = tracker.advance_one(&stale).await;
        assert!(matches!(result, Err(DispatchError::Conflict { .. })));

        let current = backends.requests.get(&request.id).await.unwrap();
        assert_eq!(current.status, RequestStatus::Cancelled);
        assert_eq!(current.progress, 0);
    }

    #[tokio::test]
    async fn test_eta() {
        let backends = Backends::with_drones(vec![Drone::new("DRONE-01", "Alpha", 90)]).await;
        let pending = backends.pending(InjuryType::Other).await;
        let tracker = tracker(&backends, 2);
        assert_eq!(tracker.eta_minutes(&pending), None);

        let mut flying = dispatched(&backends, "DRONE-01").await;
        assert_eq!(tracker.eta_minutes(&flying), Some(8));

        flying.progress = 50;
        assert_eq!(tracker.eta_minutes(&flying), Some(4));

        flying.progress = 99;
        assert_eq!(tracker.eta_minutes(&flying), Some(1));
    }
}
