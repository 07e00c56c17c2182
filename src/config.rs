//! Coordinator configuration loaded from environment variables.
//!
//! All settings have defaults so the coordinator can start with zero
//! configuration for local development.

use aeroreach_shared::dispatch;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

/// Flight Tracker parameters
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    /// Progress added per tick, in percent
    pub progress_step: u8,
    /// Nominal duration of a full flight, used only to derive ETA
    pub flight_minutes: f64,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            progress_step: dispatch::PROGRESS_STEP,
            flight_minutes: dispatch::FLIGHT_MINUTES,
        }
    }
}

/// Dispatch Scheduler parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerConfig {
    /// Drones at or below this battery level are not dispatched
    pub min_dispatch_battery: u8,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            min_dispatch_battery: dispatch::BATTERY_CRITICAL_PERCENT,
        }
    }
}

/// Coordinator service configuration
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Socket address for the responder API.
    /// Env: `LISTEN_ADDR`
    /// Default: `0.0.0.0:8080`
    pub listen_addr: SocketAddr,

    /// Interval of the built-in tick driver; zero disables it so an
    /// external caller drives the clock through the API.
    /// Env: `TICK_INTERVAL_MS`
    /// Default: `2000`
    pub tick_interval: Duration,

    /// Env: `PROGRESS_STEP`, `FLIGHT_MINUTES`
    pub tracker: TrackerConfig,

    /// Env: `MIN_DISPATCH_BATTERY`
    pub scheduler: SchedulerConfig,

    /// Run an invariant audit every N ticks (0 = never).
    /// Env: `AUDIT_EVERY_TICKS`
    /// Default: `30`
    pub audit_every_ticks: u64,

    /// Register the demo fleet at startup.
    /// Env: `SEED_DEMO_FLEET` (true/false)
    /// Default: `true`
    pub seed_demo_fleet: bool,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            listen_addr: ([0, 0, 0, 0], 8080).into(),
            tick_interval: Duration::from_millis(dispatch::TICK_INTERVAL_MS),
            tracker: TrackerConfig::default(),
            scheduler: SchedulerConfig::default(),
            audit_every_ticks: 30,
            seed_demo_fleet: true,
        }
    }
}

impl CoordinatorConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(addr) = parsed::<SocketAddr>(&lookup, "LISTEN_ADDR") {
            config.listen_addr = addr;
        }

        if let Some(ms) = parsed::<u64>(&lookup, "TICK_INTERVAL_MS") {
            config.tick_interval = Duration::from_millis(ms);
        }

        if let Some(step) = parsed::<u8>(&lookup, "PROGRESS_STEP") {
            if (1..=100).contains(&step) {
                config.tracker.progress_step = step;
            } else {
                tracing::warn!(value = step, "PROGRESS_STEP out of range 1-100, using default");
            }
        }

        if let Some(minutes) = parsed::<f64>(&lookup, "FLIGHT_MINUTES") {
            if minutes.is_finite() && minutes > 0.0 {
                config.tracker.flight_minutes = minutes;
            } else {
                tracing::warn!(value = minutes, "FLIGHT_MINUTES must be positive, using default");
            }
        }

        if let Some(battery) = parsed::<u8>(&lookup, "MIN_DISPATCH_BATTERY") {
            config.scheduler.min_dispatch_battery = battery.min(100);
        }

        if let Some(n) = parsed::<u64>(&lookup, "AUDIT_EVERY_TICKS") {
            config.audit_every_ticks = n;
        }

        if let Some(val) = lookup("SEED_DEMO_FLEET") {
            config.seed_demo_fleet = val != "false" && val != "0";
        }

        // RUST_LOG is handled directly by tracing-subscriber's EnvFilter,
        // so we do not store it here.

        config
    }

    /// Whether the built-in tick driver should run
    pub fn drives_clock(&self) -> bool {
        !self.tick_interval.is_zero()
    }
}

/// Parse an optional variable, warning and ignoring it when malformed
fn parsed<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse::<T>() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(key, value = %raw, "Invalid value, using default");
            None
        }
    }
}
