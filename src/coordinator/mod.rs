//! Coordinator API
//!
//! The façade responders and the tick driver call into. It owns the
//! scheduler and flight tracker, and is the only place where a request
//! transition and the matching drone release are paired up.

mod audit;
mod intake;

pub use audit::InvariantViolation;

use crate::config::CoordinatorConfig;
use crate::fleet::{FleetRegistry, MemoryFleetRegistry};
use crate::revision::Revisions;
use crate::scheduler::Scheduler;
use crate::store::{MemoryRequestStore, RequestStore, StatusChange};
use crate::tracker::FlightTracker;
use aeroreach_shared::{
    triage, Assignment, ChangeSet, Coordinates, DispatchError, DispatchResult, Drone,
    DroneStatus, NewRequest, Request, RequestFilter, RequestStatus, RequestView, TickReport,
};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{error, info, warn};

pub struct Coordinator {
    requests: Arc<dyn RequestStore>,
    fleet: Arc<dyn FleetRegistry>,
    revisions: Revisions,
    scheduler: Scheduler,
    tracker: FlightTracker,
    /// Signalled when queued work or newly free drones warrant an early pass
    schedule_hint: Arc<Notify>,
}

impl Coordinator {
    /// Coordinator over fresh in-memory stores
    pub fn new(config: &CoordinatorConfig) -> Self {
        let revisions = Revisions::new();
        Self::with_backends(
            Arc::new(MemoryRequestStore::new(revisions.clone())),
            Arc::new(MemoryFleetRegistry::new(revisions.clone())),
            revisions,
            config,
        )
    }

    /// Coordinator over caller-supplied stores. Both must stamp mutations
    /// from `revisions` for `changes_since` to see them.
    pub fn with_backends(
        requests: Arc<dyn RequestStore>,
        fleet: Arc<dyn FleetRegistry>,
        revisions: Revisions,
        config: &CoordinatorConfig,
    ) -> Self {
        Self {
            scheduler: Scheduler::new(requests.clone(), fleet.clone(), config.scheduler.clone()),
            tracker: FlightTracker::new(requests.clone(), fleet.clone(), config.tracker.clone()),
            requests,
            fleet,
            revisions,
            schedule_hint: Arc::new(Notify::new()),
        }
    }

    pub fn schedule_hint(&self) -> Arc<Notify> {
        self.schedule_hint.clone()
    }

    fn view(&self, request: Request) -> RequestView {
        RequestView {
            eta_minutes: self.tracker.eta_minutes(&request),
            request,
        }
    }

    /// Hand a drone back to the fleet after its request let go of it
    async fn release(&self, drone_id: &str, request_id: &str) -> DispatchResult<()> {
        match self.fleet.release(drone_id, request_id).await {
            Ok(drone) => {
                info!("[FLEET] {} released by {}, now {}", drone_id, request_id, drone.status);
                if drone.status == DroneStatus::Available {
                    self.schedule_hint.notify_one();
                }
                Ok(())
            }
            Err(e) => {
                error!("[FLEET] Releasing {} from {} failed: {}", drone_id, request_id, e);
                Err(e)
            }
        }
    }

    pub async fn register_drone(&self, drone: Drone) -> DispatchResult<Drone> {
        let drone = self.fleet.register(drone).await?;
        info!("[FLEET] Registered {} ({}, {}%)", drone.id, drone.status, drone.battery_level);
        if drone.status == DroneStatus::Available {
            self.schedule_hint.notify_one();
        }
        Ok(drone)
    }

    /// Register a batch of drones, returning how many joined
    pub async fn seed_fleet(&self, drones: Vec<Drone>) -> DispatchResult<usize> {
        let mut count = 0;
        for drone in drones {
            self.register_drone(drone).await?;
            count += 1;
        }
        Ok(count)
    }

    /// Validate, triage and persist a request.
    ///
    /// Critical injuries are matched before this returns; everything else
    /// waits for the next scheduling pass.
    pub async fn submit_request(&self, fields: NewRequest) -> DispatchResult<RequestView> {
        let fields = intake::validate(fields)?;
        let priority = triage::classify(fields.injury_type);
        let request = self.requests.create(fields, priority).await?;
        info!(
            "[INTAKE] {} for {} at {}: {} ({:?})",
            request.id,
            request.name,
            request.location,
            request.injury_type.label(),
            request.priority
        );

        if triage::requires_immediate_dispatch(request.injury_type) {
            if let Err(e) = self.scheduler.run_pass().await {
                // The request is stored; the driver retries on its next pass
                error!("[INTAKE] Immediate dispatch pass for {} failed: {}", request.id, e);
            }
        } else {
            self.schedule_hint.notify_one();
        }

        let current = self.requests.get(&request.id).await?;
        Ok(self.view(current))
    }

    pub async fn list_requests(&self, filter: &RequestFilter) -> DispatchResult<Vec<RequestView>> {
        let requests = self.requests.list(filter).await?;
        Ok(requests.into_iter().map(|r| self.view(r)).collect())
    }

    pub async fn get_request(&self, request_id: &str) -> DispatchResult<RequestView> {
        let request = self.requests.get(request_id).await?;
        Ok(self.view(request))
    }

    pub async fn list_drones(&self) -> DispatchResult<Vec<Drone>> {
        self.fleet.list().await
    }

    /// Responder override: fly `drone_id` to `request_id`
    pub async fn dispatch_manually(
        &self,
        request_id: &str,
        drone_id: &str,
    ) -> DispatchResult<RequestView> {
        let request = self.scheduler.dispatch_to(request_id, drone_id).await?;
        info!("[DISPATCH] Manual dispatch of {} to {}", drone_id, request_id);
        Ok(self.view(request))
    }

    /// Cancel a request, freeing its drone if one was assigned
    pub async fn cancel_request(&self, request_id: &str) -> DispatchResult<RequestView> {
        let transition = self
            .requests
            .update_status(request_id, StatusChange::to(RequestStatus::Cancelled))
            .await?;
        info!(
            "[DISPATCH] {} cancelled (was {})",
            request_id, transition.previous_status
        );

        if let Some(drone_id) = &transition.released_drone {
            self.release(drone_id, request_id).await?;
        }
        Ok(self.view(transition.request))
    }

    /// Responder confirms a delivered request
    pub async fn complete_request(&self, request_id: &str) -> DispatchResult<RequestView> {
        let transition = self
            .requests
            .update_status(request_id, StatusChange::to(RequestStatus::Completed))
            .await?;
        info!("[DISPATCH] {} completed", request_id);
        Ok(self.view(transition.request))
    }

    /// Advance every flight by one step, then run a scheduling pass so
    /// drones freed by deliveries are reused in the same tick.
    pub async fn tick(&self) -> DispatchResult<TickReport> {
        let mut report = self.tracker.advance().await?;

        match self.scheduler.run_pass().await {
            Ok(assignments) => report.dispatched = assignments,
            Err(e) => {
                error!("[TICK] Scheduling pass aborted: {}", e);
                report.scheduler_error = Some(e.to_string());
            }
        }

        Ok(report)
    }

    /// Scheduling pass without advancing flights
    pub async fn run_scheduler(&self) -> DispatchResult<Vec<Assignment>> {
        self.scheduler.run_pass().await
    }

    pub async fn update_telemetry(
        &self,
        drone_id: &str,
        battery_level: u8,
        location: Option<Coordinates>,
    ) -> DispatchResult<Drone> {
        let drone = self
            .fleet
            .update_telemetry(drone_id, battery_level, location)
            .await?;
        if drone.status == DroneStatus::Available {
            self.schedule_hint.notify_one();
        }
        Ok(drone)
    }

    pub async fn flag_maintenance(&self, drone_id: &str) -> DispatchResult<Drone> {
        let drone = self.fleet.flag_maintenance(drone_id).await?;
        info!("[FLEET] {} flagged for maintenance, now {}", drone_id, drone.status);
        Ok(drone)
    }

    pub async fn return_to_service(&self, drone_id: &str) -> DispatchResult<Drone> {
        let drone = self.fleet.return_to_service(drone_id).await?;
        info!("[FLEET] {} back in service", drone_id);
        self.schedule_hint.notify_one();
        Ok(drone)
    }

    /// Take a drone out of the fleet after losing contact.
    ///
    /// A drone lost mid-flight is marked offline first so its release lands
    /// in `offline`; its request is then cancelled and the case resubmitted
    /// as a new request for another drone to pick up.
    pub async fn report_offline(&self, drone_id: &str) -> DispatchResult<Drone> {
        let marked = self.fleet.set_offline(drone_id).await?;

        let request_id = match (&marked.status, &marked.assigned_request) {
            (DroneStatus::Dispatched, Some(request_id)) => request_id.clone(),
            _ => {
                warn!("[FLEET] {} is offline", drone_id);
                return Ok(marked);
            }
        };

        warn!(
            "[FLEET] {} lost contact while flying {}, re-queueing the case",
            drone_id, request_id
        );
        match self.cancel_request(&request_id).await {
            Ok(cancelled) => {
                let replacement = self.submit_request(cancelled.request.to_submission()).await?;
                info!(
                    "[DISPATCH] {} resubmitted as {} ({})",
                    request_id, replacement.request.id, replacement.request.status
                );
            }
            // Delivered or cancelled in the meantime; the drone went offline on release
            Err(DispatchError::InvalidTransition { from, .. }) => {
                info!("[DISPATCH] {} already {}, nothing to re-queue", request_id, from);
            }
            Err(e) => return Err(e),
        }

        self.fleet.get(drone_id).await
    }

    pub async fn report_online(&self, drone_id: &str) -> DispatchResult<Drone> {
        let drone = self.fleet.set_online(drone_id).await?;
        info!("[FLEET] {} online, now {}", drone_id, drone.status);
        if drone.status == DroneStatus::Available {
            self.schedule_hint.notify_one();
        }
        Ok(drone)
    }

    /// Everything mutated after `revision`, oldest first.
    ///
    /// With a `limit`, only that many records are returned and the change
    /// set's revision points at the last one, so feeding it back resumes
    /// where this batch stopped.
    pub async fn changes_since(
        &self,
        revision: u64,
        limit: Option<usize>,
    ) -> DispatchResult<ChangeSet> {
        // Read before the stores so nothing stamped after it can be missed
        let current = self.revisions.current();
        let (mut requests, mut drones) = futures::try_join!(
            self.requests.changed_since(revision),
            self.fleet.changed_since(revision)
        )?;

        let mut next = current;
        let mut truncated = false;
        if let Some(limit) = limit {
            let mut stamps: Vec<u64> = requests
                .iter()
                .map(|r| r.revision)
                .chain(drones.iter().map(|d| d.revision))
                .collect();
            if stamps.len() > limit {
                stamps.sort_unstable();
                // Revisions are unique across both stores
                let cutoff = limit.checked_sub(1).map_or(revision, |i| stamps[i]);
                requests.retain(|r| r.revision <= cutoff);
                drones.retain(|d| d.revision <= cutoff);
                next = cutoff;
                truncated = true;
            }
        }

        Ok(ChangeSet {
            revision: next,
            requests: requests.into_iter().map(|r| self.view(r)).collect(),
            drones,
            truncated,
        })
    }

    /// Check assignment consistency across both stores
    pub async fn audit(&self) -> DispatchResult<Vec<InvariantViolation>> {
        let all = RequestFilter::default();
        let (requests, drones) =
            futures::try_join!(self.requests.list(&all), self.fleet.list())?;

        let violations = audit::check(&requests, &drones);
        for violation in &violations {
            warn!("[AUDIT] {}", violation);
        }
        Ok(violations)
    }
}
