//! AeroReach Shared Types
//!
//! This crate provides the domain model, triage rules, request lifecycle and
//! wire codec shared by the dispatch coordinator and its clients.

pub mod codec;
pub mod error;
pub mod protocol;
pub mod state_machine;
pub mod triage;
pub mod types;

use std::time::{SystemTime, UNIX_EPOCH};

// Re-export commonly used types at crate root
pub use error::{DispatchError, DispatchResult, EntityKind, ErrorCode};
pub use types::*;

/// Get current timestamp in milliseconds since Unix epoch
pub fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

/// Operational parameters for dispatch
pub mod dispatch {
    /// Interval between clock ticks driven by the service binary
    pub const TICK_INTERVAL_MS: u64 = 2000;

    /// Progress gained per tick by an in-flight drone
    pub const PROGRESS_STEP: u8 = 2;

    /// Nominal duration of a full flight, used for ETA only
    pub const FLIGHT_MINUTES: f64 = 8.0;

    /// Drones at or below this battery level are never dispatched
    pub const BATTERY_CRITICAL_PERCENT: u8 = 20;

    /// Oldest plausible requester age accepted at intake
    pub const MAX_REQUESTER_AGE: u32 = 130;

    /// Maximum length of free-text fields
    pub const MAX_TEXT_LEN: usize = 2000;
}
