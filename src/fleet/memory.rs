//! In-memory fleet registry

use super::FleetRegistry;
use crate::revision::Revisions;
use aeroreach_shared::{
    now_ms, Coordinates, DispatchError, DispatchResult, Drone, DroneStatus,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Fleet registry backed by a map of drone records
pub struct MemoryFleetRegistry {
    /// Map of drone id -> record
    drones: Arc<RwLock<HashMap<String, Drone>>>,
    revisions: Revisions,
}

impl MemoryFleetRegistry {
    /// Create an empty registry stamping mutations from `revisions`
    pub fn new(revisions: Revisions) -> Self {
        Self {
            drones: Arc::new(RwLock::new(HashMap::new())),
            revisions,
        }
    }

    /// Apply `change` to one drone under the write lock.
    ///
    /// The record is stamped only when `change` reports a modification, and
    /// left untouched when it fails.
    async fn mutate<F>(&self, drone_id: &str, change: F) -> DispatchResult<Drone>
    where
        F: FnOnce(&mut Drone) -> DispatchResult<bool> + Send,
    {
        let mut drones = self.drones.write().await;
        let drone = drones
            .get_mut(drone_id)
            .ok_or_else(|| DispatchError::drone_not_found(drone_id))?;

        let mut draft = drone.clone();
        if change(&mut draft)? {
            draft.version += 1;
            draft.revision = self.revisions.next();
            draft.updated_at = now_ms();
            *drone = draft;
        }

        Ok(drone.clone())
    }
}

fn unavailable(drone: &Drone, reason: impl Into<String>) -> DispatchError {
    DispatchError::DroneUnavailable {
        drone_id: drone.id.clone(),
        reason: reason.into(),
    }
}

#[async_trait]
impl FleetRegistry for MemoryFleetRegistry {
    async fn register(&self, mut drone: Drone) -> DispatchResult<Drone> {
        if drone.id.trim().is_empty() {
            return Err(DispatchError::Validation("drone id is required".into()));
        }
        if drone.status == DroneStatus::Dispatched {
            return Err(DispatchError::Validation(format!(
                "{} cannot join the fleet already dispatched",
                drone.id
            )));
        }

        let mut drones = self.drones.write().await;
        drone.battery_level = drone.battery_level.min(100);
        match drones.get(&drone.id) {
            // Still flying: only the descriptive fields are refreshed
            Some(live) if live.status == DroneStatus::Dispatched => {
                drone.status = live.status;
                drone.assigned_request = live.assigned_request.clone();
                drone.maintenance_due = live.maintenance_due || drone.maintenance_due;
                drone.offline_due = live.offline_due;
            }
            _ => {
                drone.assigned_request = None;
                drone.offline_due = false;
            }
        }
        drone.version = drones.get(&drone.id).map_or(1, |d| d.version + 1);
        drone.revision = self.revisions.next();
        drone.updated_at = now_ms();
        drones.insert(drone.id.clone(), drone.clone());

        Ok(drone)
    }

    async fn get(&self, id: &str) -> DispatchResult<Drone> {
        let drones = self.drones.read().await;
        drones
            .get(id)
            .cloned()
            .ok_or_else(|| DispatchError::drone_not_found(id))
    }

    async fn list(&self) -> DispatchResult<Vec<Drone>> {
        let drones = self.drones.read().await;
        let mut all: Vec<Drone> = drones.values().cloned().collect();
        all.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(all)
    }

    async fn list_available(&self) -> DispatchResult<Vec<Drone>> {
        let drones = self.drones.read().await;
        let mut available: Vec<Drone> = drones
            .values()
            .filter(|d| d.status == DroneStatus::Available)
            .cloned()
            .collect();
        available.sort_by(|a, b| {
            b.battery_level
                .cmp(&a.battery_level)
                .then_with(|| a.id.cmp(&b.id))
        });
        Ok(available)
    }

    async fn reserve(&self, drone_id: &str, request_id: &str) -> DispatchResult<Drone> {
        self.mutate(drone_id, |drone| {
            if drone.status != DroneStatus::Available {
                return Err(DispatchError::AlreadyReserved(drone.id.clone()));
            }
            drone.status = DroneStatus::Dispatched;
            drone.assigned_request = Some(request_id.to_string());
            Ok(true)
        })
        .await
    }

    async fn release(&self, drone_id: &str, request_id: &str) -> DispatchResult<Drone> {
        self.mutate(drone_id, |drone| {
            let held = drone.status == DroneStatus::Dispatched
                && drone.assigned_request.as_deref() == Some(request_id);
            if !held {
                return Err(DispatchError::NotReserved {
                    drone_id: drone.id.clone(),
                    request_id: request_id.to_string(),
                });
            }

            drone.assigned_request = None;
            if drone.offline_due {
                // maintenance_due is kept for when it reconnects
                drone.offline_due = false;
                drone.status = DroneStatus::Offline;
            } else if drone.maintenance_due {
                drone.maintenance_due = false;
                drone.status = DroneStatus::Maintenance;
            } else {
                drone.status = DroneStatus::Available;
            }
            Ok(true)
        })
        .await
    }

    async fn update_telemetry(
        &self,
        drone_id: &str,
        battery_level: u8,
        location: Option<Coordinates>,
    ) -> DispatchResult<Drone> {
        self.mutate(drone_id, |drone| {
            drone.battery_level = battery_level.min(100);
            if location.is_some() {
                drone.current_location = location;
            }
            Ok(true)
        })
        .await
    }

    async fn flag_maintenance(&self, drone_id: &str) -> DispatchResult<Drone> {
        self.mutate(drone_id, |drone| match drone.status {
            DroneStatus::Available => {
                drone.status = DroneStatus::Maintenance;
                Ok(true)
            }
            DroneStatus::Dispatched | DroneStatus::Offline => {
                let changed = !drone.maintenance_due;
                drone.maintenance_due = true;
                Ok(changed)
            }
            DroneStatus::Maintenance => Ok(false),
        })
        .await
    }

    async fn return_to_service(&self, drone_id: &str) -> DispatchResult<Drone> {
        self.mutate(drone_id, |drone| {
            if drone.status != DroneStatus::Maintenance {
                return Err(unavailable(
                    drone,
                    format!("not in maintenance ({})", drone.status),
                ));
            }
            drone.status = DroneStatus::Available;
            drone.maintenance_due = false;
            drone.last_maintenance = now_ms();
            Ok(true)
        })
        .await
    }

    async fn set_offline(&self, drone_id: &str) -> DispatchResult<Drone> {
        self.mutate(drone_id, |drone| match drone.status {
            DroneStatus::Available => {
                drone.status = DroneStatus::Offline;
                Ok(true)
            }
            DroneStatus::Maintenance => {
                // Comes back into maintenance when it reconnects
                drone.maintenance_due = true;
                drone.status = DroneStatus::Offline;
                Ok(true)
            }
            DroneStatus::Dispatched => {
                // Takes effect when its request lets go of it
                let changed = !drone.offline_due;
                drone.offline_due = true;
                Ok(changed)
            }
            DroneStatus::Offline => Ok(false),
        })
        .await
    }

    async fn set_online(&self, drone_id: &str) -> DispatchResult<Drone> {
        self.mutate(drone_id, |drone| {
            if drone.status == DroneStatus::Dispatched && drone.offline_due {
                drone.offline_due = false;
                return Ok(true);
            }
            if drone.status != DroneStatus::Offline {
                return Ok(false);
            }
            if drone.maintenance_due {
                drone.maintenance_due = false;
                drone.status = DroneStatus::Maintenance;
            } else {
                drone.status = DroneStatus::Available;
            }
            Ok(true)
        })
        .await
    }

    async fn changed_since(&self, revision: u64) -> DispatchResult<Vec<Drone>> {
        let drones = self.drones.read().await;
        let mut changed: Vec<Drone> = drones
            .values()
            .filter(|d| d.revision > revision)
            .cloned()
            .collect();
        changed.sort_by_key(|d| d.revision);
        Ok(changed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fleet::demo_fleet;

    async fn registry_with(drones: Vec<Drone>) -> MemoryFleetRegistry {
        let registry = MemoryFleetRegistry::new(Revisions::new());
        for drone in drones {
            registry.register(drone).await.unwrap();
        }
        registry
    }

    #[tokio::test]
    async fn test_list_available_order() {
        let registry = registry_with(vec![
            Drone::new("DRONE-02", "Beta", 80),
            Drone::new("DRONE-01", "Alpha", 80),
            Drone::new("DRONE-03", "Gamma", 95),
            Drone::new("DRONE-04", "Delta", 99).with_status(DroneStatus::Maintenance),
        ])
        .await;

        let available = registry.list_available().await.unwrap();
        let ids: Vec<&str> = available.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["DRONE-03", "DRONE-01", "DRONE-02"]);
    }

    #[tokio::test]
    async fn test_reserve_is_exclusive() {
        let registry = registry_with(vec![Drone::new("DRONE-01", "Alpha", 90)]).await;

        let reserved = registry.reserve("DRONE-01", "REQ-000001").await.unwrap();
        assert_eq!(reserved.status, DroneStatus::Dispatched);
        assert_eq!(reserved.assigned_request.as_deref(), Some("REQ-000001"));

        let second = registry.reserve("DRONE-01", "REQ-000002").await;
        assert!(matches!(second, Err(DispatchError::AlreadyReserved(_))));
        assert!(registry.list_available().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_release_checks_holder() {
        let registry = registry_with(vec![Drone::new("DRONE-01", "Alpha", 90)]).await;
        registry.reserve("DRONE-01", "REQ-000001").await.unwrap();

        let wrong = registry.release("DRONE-01", "REQ-000002").await;
        assert!(matches!(wrong, Err(DispatchError::NotReserved { .. })));

        let released = registry.release("DRONE-01", "REQ-000001").await.unwrap();
        assert_eq!(released.status, DroneStatus::Available);
        assert!(released.assigned_request.is_none());

        // A second release is detected rather than ignored
        let again = registry.release("DRONE-01", "REQ-000001").await;
        assert!(matches!(again, Err(DispatchError::NotReserved { .. })));
    }

    #[tokio::test]
    async fn test_release_honours_maintenance_flag() {
        let registry = registry_with(vec![Drone::new("DRONE-01", "Alpha", 90)]).await;
        registry.reserve("DRONE-01", "REQ-000001").await.unwrap();

        let flagged = registry.flag_maintenance("DRONE-01").await.unwrap();
        assert_eq!(flagged.status, DroneStatus::Dispatched);
        assert!(flagged.maintenance_due);

        let released = registry.release("DRONE-01", "REQ-000001").await.unwrap();
        assert_eq!(released.status, DroneStatus::Maintenance);
        assert!(!released.maintenance_due);

        let serviced = registry.return_to_service("DRONE-01").await.unwrap();
        assert_eq!(serviced.status, DroneStatus::Available);
        assert!(serviced.last_maintenance > 0);
    }

    #[tokio::test]
    async fn test_telemetry_never_changes_status() {
        let registry = registry_with(vec![Drone::new("DRONE-01", "Alpha", 90)]).await;
        registry.reserve("DRONE-01", "REQ-000001").await.unwrap();

        let location = Coordinates {
            lat: -1.3,
            lng: 36.8,
        };
        let updated = registry
            .update_telemetry("DRONE-01", 150, Some(location))
            .await
            .unwrap();
        assert_eq!(updated.battery_level, 100);
        assert_eq!(updated.current_location, Some(location));
        assert_eq!(updated.status, DroneStatus::Dispatched);
    }

    #[tokio::test]
    async fn test_offline_round_trip() {
        let registry = registry_with(demo_fleet()).await;

        let offline = registry.set_offline("DRONE-03").await.unwrap();
        assert_eq!(offline.status, DroneStatus::Offline);

        // DRONE-04 starts in maintenance and must come back there
        registry.set_offline("DRONE-04").await.unwrap();
        let back = registry.set_online("DRONE-04").await.unwrap();
        assert_eq!(back.status, DroneStatus::Maintenance);

        let back = registry.set_online("DRONE-03").await.unwrap();
        assert_eq!(back.status, DroneStatus::Available);
    }

    #[tokio::test]
    async fn test_offline_deferred_while_dispatched() {
        let registry = registry_with(vec![Drone::new("DRONE-01", "Alpha", 90)]).await;
        registry.reserve("DRONE-01", "REQ-000001").await.unwrap();

        let marked = registry.set_offline("DRONE-01").await.unwrap();
        assert_eq!(marked.status, DroneStatus::Dispatched);
        assert!(marked.offline_due);

        // Released straight to offline, never back into the pool
        let released = registry.release("DRONE-01", "REQ-000001").await.unwrap();
        assert_eq!(released.status, DroneStatus::Offline);
        assert!(registry.list_available().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_register_rejects_dispatched() {
        let registry = MemoryFleetRegistry::new(Revisions::new());
        let result = registry
            .register(Drone::new("DRONE-09", "Rogue", 50).with_status(DroneStatus::Dispatched))
            .await;
        assert!(matches!(result, Err(DispatchError::Validation(_))));
        assert!(registry.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_reregister_keeps_live_reservation() {
        let registry = registry_with(vec![Drone::new("DRONE-01", "Alpha", 90)]).await;
        registry.reserve("DRONE-01", "REQ-000001").await.unwrap();

        let refreshed = registry
            .register(Drone::new("DRONE-01", "Alpha Mk2", 70))
            .await
            .unwrap();
        assert_eq!(refreshed.name, "Alpha Mk2");
        assert_eq!(refreshed.battery_level, 70);
        assert_eq!(refreshed.status, DroneStatus::Dispatched);
        assert_eq!(refreshed.assigned_request.as_deref(), Some("REQ-000001"));

        assert!(registry.list_available().await.unwrap().is_empty());
        let second = registry.reserve("DRONE-01", "REQ-000002").await;
        assert!(matches!(second, Err(DispatchError::AlreadyReserved(_))));

        let released = registry.release("DRONE-01", "REQ-000001").await.unwrap();
        assert_eq!(released.status, DroneStatus::Available);
    }

    #[tokio::test]
    async fn test_reregister_idle_drone_replaces_record() {
        let registry = registry_with(vec![Drone::new("DRONE-01", "Alpha", 90)]).await;
        registry.set_offline("DRONE-01").await.unwrap();

        let replaced = registry
            .register(Drone::new("DRONE-01", "Alpha", 100))
            .await
            .unwrap();
        assert_eq!(replaced.status, DroneStatus::Available);
        assert_eq!(replaced.version, 3);
    }

    #[tokio::test]
    async fn test_failed_change_does_not_stamp() {
        let registry = registry_with(vec![Drone::new("DRONE-01", "Alpha", 90)]).await;
        let before = registry.get("DRONE-01").await.unwrap();

        let _ = registry.return_to_service("DRONE-01").await;
        let after = registry.get("DRONE-01").await.unwrap();
        assert_eq!(before, after);
        assert!(registry.changed_since(before.revision).await.unwrap().is_empty());
    }
}
