//! Dispatch Scheduler
//!
//! Matches pending requests to available drones. A match is two steps
//! against two stores: reserve the drone, then move the request to
//! `dispatched` at the version that was read. When the second step fails
//! the reservation is released again, so a drone is never left held by a
//! request that does not know about it.
//!
//! Passes may run concurrently with each other, with the flight tracker and
//! with cancellations. Mutual exclusion comes from the check-and-set
//! operations of the stores, not from a lock around the pass.

use crate::config::SchedulerConfig;
use crate::fleet::FleetRegistry;
use crate::store::{RequestStore, StatusChange};
use aeroreach_shared::{
    state_machine, Assignment, DispatchError, DispatchResult, Drone, DroneStatus, Request,
    RequestStatus,
};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Outcome of trying to match one request
#[derive(Debug)]
enum MatchOutcome {
    Assigned(Request),
    /// Every candidate was taken by someone else first
    NoDrone,
    /// The request moved on (cancelled, dispatched elsewhere) since it was read
    Superseded(DispatchError),
}

pub struct Scheduler {
    requests: Arc<dyn RequestStore>,
    fleet: Arc<dyn FleetRegistry>,
    config: SchedulerConfig,
}

impl Scheduler {
    pub fn new(
        requests: Arc<dyn RequestStore>,
        fleet: Arc<dyn FleetRegistry>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            requests,
            fleet,
            config,
        }
    }

    /// Run one scheduling pass.
    ///
    /// Pending requests are served in dispatch order; each gets the
    /// best-charged drone still available. The pass ends when either side
    /// runs out. An error is returned only when a rollback itself failed;
    /// assignments committed before that point stay committed.
    pub async fn run_pass(&self) -> DispatchResult<Vec<Assignment>> {
        let pending = self.requests.list_by_status(RequestStatus::Pending).await?;
        let mut assignments = Vec::new();

        for request in pending {
            let candidates = self.candidates().await?;
            if candidates.is_empty() {
                debug!("[SCHED] No dispatchable drones, {} left pending", request.id);
                break;
            }

            match self.try_match(&request, &candidates).await? {
                MatchOutcome::Assigned(assigned) => {
                    if let Some(drone_id) = assigned.drone_id {
                        assignments.push(Assignment {
                            request_id: assigned.id,
                            drone_id,
                        });
                    }
                }
                MatchOutcome::NoDrone => break,
                MatchOutcome::Superseded(reason) => {
                    debug!("[SCHED] Skipping {}: {}", request.id, reason);
                }
            }
        }

        if !assignments.is_empty() {
            info!("[SCHED] Pass dispatched {} request(s)", assignments.len());
        }
        Ok(assignments)
    }

    /// Assign a specific drone to a specific pending request.
    ///
    /// Goes through the same reserve-then-assign protocol as a pass, so it
    /// can neither double-book the drone nor re-dispatch the request.
    pub async fn dispatch_to(&self, request_id: &str, drone_id: &str) -> DispatchResult<Request> {
        let request = self.requests.get(request_id).await?;
        state_machine::check_transition(request.status, RequestStatus::Dispatched)?;

        let drone = self.fleet.get(drone_id).await?;
        match drone.status {
            DroneStatus::Available => {}
            DroneStatus::Dispatched => return Err(DispatchError::AlreadyReserved(drone.id)),
            other => {
                return Err(DispatchError::DroneUnavailable {
                    drone_id: drone.id,
                    reason: other.to_string(),
                })
            }
        }
        if !self.has_charge(&drone) {
            return Err(DispatchError::DroneUnavailable {
                reason: format!("battery at {}%", drone.battery_level),
                drone_id: drone.id,
            });
        }

        match self.try_match(&request, std::slice::from_ref(&drone)).await? {
            MatchOutcome::Assigned(assigned) => Ok(assigned),
            MatchOutcome::NoDrone => Err(DispatchError::AlreadyReserved(drone.id)),
            MatchOutcome::Superseded(reason) => Err(reason),
        }
    }

    fn has_charge(&self, drone: &Drone) -> bool {
        drone.battery_level > self.config.min_dispatch_battery
    }

    /// Available drones above the battery floor, best first
    async fn candidates(&self) -> DispatchResult<Vec<Drone>> {
        let mut available = self.fleet.list_available().await?;
        available.retain(|d| self.has_charge(d));
        Ok(available)
    }

    async fn try_match(
        &self,
        request: &Request,
        candidates: &[Drone],
    ) -> DispatchResult<MatchOutcome> {
        for drone in candidates {
            match self.fleet.reserve(&drone.id, &request.id).await {
                Ok(_) => {}
                Err(DispatchError::AlreadyReserved(_)) => {
                    debug!("[SCHED] {} taken concurrently, trying next", drone.id);
                    continue;
                }
                Err(e) => return Err(e),
            }

            let change = StatusChange::to(RequestStatus::Dispatched)
                .with_drone(&drone.id)
                .expecting(request.version);

            match self.requests.update_status(&request.id, change).await {
                Ok(transition) => {
                    info!(
                        "[SCHED] Dispatched {} to {} ({:?}, battery {}%)",
                        drone.id, request.id, request.priority, drone.battery_level
                    );
                    return Ok(MatchOutcome::Assigned(transition.request));
                }
                Err(reason) => {
                    warn!(
                        "[SCHED] Assigning {} to {} failed ({}), releasing drone",
                        drone.id, request.id, reason
                    );
                    if let Err(rollback) = self.fleet.release(&drone.id, &request.id).await {
                        error!(
                            "[SCHED] Rollback of {} for {} failed: {}",
                            drone.id, request.id, rollback
                        );
                        return Err(rollback);
                    }
                    return match reason {
                        DispatchError::Conflict { .. }
                        | DispatchError::InvalidTransition { .. }
                        | DispatchError::NotFound { .. } => Ok(MatchOutcome::Superseded(reason)),
                        other => Err(other),
                    };
                }
            }
        }

        Ok(MatchOutcome::NoDrone)
    }
}
