//! Fixtures shared by the unit tests

use crate::fleet::{FleetRegistry, MemoryFleetRegistry};
use crate::revision::Revisions;
use crate::store::{MemoryRequestStore, RequestStore};
use aeroreach_shared::{triage, Drone, InjuryCategory, InjuryType, NewRequest, Request};
use std::sync::Arc;

pub fn submission(injury_type: InjuryType) -> NewRequest {
    NewRequest {
        user_id: None,
        name: "Sarah Johnson".into(),
        age: 34,
        location: "Downtown Medical Center, Block A".into(),
        coordinates: None,
        injury_category: triage::category_of(injury_type).unwrap_or(InjuryCategory::Other),
        injury_type,
        injury_description: None,
    }
}

pub struct Backends {
    pub revisions: Revisions,
    pub requests: Arc<dyn RequestStore>,
    pub fleet: Arc<dyn FleetRegistry>,
}

impl Backends {
    pub async fn with_drones(drones: Vec<Drone>) -> Self {
        let revisions = Revisions::new();
        let requests = Arc::new(MemoryRequestStore::new(revisions.clone()));
        let fleet = Arc::new(MemoryFleetRegistry::new(revisions.clone()));
        for drone in drones {
            fleet.register(drone).await.unwrap();
        }
        Self {
            revisions,
            requests,
            fleet,
        }
    }

    /// Persist a pending request with its triaged priority
    pub async fn pending(&self, injury_type: InjuryType) -> Request {
        self.requests
            .create(submission(injury_type), triage::classify(injury_type))
            .await
            .unwrap()
    }
}
