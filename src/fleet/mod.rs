//! Fleet Registry
//!
//! This module handles:
//! - Tracking every registered drone and its operational status
//! - Atomic reservation of available drones for a request
//! - Releasing drones back to the pool (or to maintenance)
//! - Advisory telemetry (battery, position)

mod demo;
mod memory;

pub use demo::demo_fleet;
pub use memory::MemoryFleetRegistry;

use aeroreach_shared::{Coordinates, DispatchResult, Drone};
use async_trait::async_trait;

/// Persistence contract for drones
///
/// `reserve` and `release` are single atomic check-and-set operations that
/// return immediately with success or failure.
#[async_trait]
pub trait FleetRegistry: Send + Sync {
    /// Add a drone to the fleet, replacing any previous record with its id
    async fn register(&self, drone: Drone) -> DispatchResult<Drone>;

    async fn get(&self, id: &str) -> DispatchResult<Drone>;

    /// All drones ordered by id
    async fn list(&self) -> DispatchResult<Vec<Drone>>;

    /// Available drones, battery descending, then id ascending
    async fn list_available(&self) -> DispatchResult<Vec<Drone>>;

    /// `available` -> `dispatched`, held by `request_id`
    async fn reserve(&self, drone_id: &str, request_id: &str) -> DispatchResult<Drone>;

    /// `dispatched` -> `available`, or `offline`/`maintenance` when flagged
    async fn release(&self, drone_id: &str, request_id: &str) -> DispatchResult<Drone>;

    /// Record battery and position; never changes status
    async fn update_telemetry(
        &self,
        drone_id: &str,
        battery_level: u8,
        location: Option<Coordinates>,
    ) -> DispatchResult<Drone>;

    /// Send the drone to maintenance now, or on release if it is flying
    async fn flag_maintenance(&self, drone_id: &str) -> DispatchResult<Drone>;

    /// `maintenance` -> `available`
    async fn return_to_service(&self, drone_id: &str) -> DispatchResult<Drone>;

    /// `available`/`maintenance` -> `offline`; a flying drone goes offline on release
    async fn set_offline(&self, drone_id: &str) -> DispatchResult<Drone>;

    /// `offline` -> `available`, or `maintenance` when flagged
    async fn set_online(&self, drone_id: &str) -> DispatchResult<Drone>;

    /// Drones mutated after `revision`, oldest change first
    async fn changed_since(&self, revision: u64) -> DispatchResult<Vec<Drone>>;
}
