//! Built-in tick driver
//!
//! Owns the coordinator's clock when the service runs standalone: a fixed
//! interval drives `tick`, and schedule hints from the coordinator trigger
//! an extra scheduling pass without waiting for the next tick.

use crate::config::CoordinatorConfig;
use crate::coordinator::Coordinator;
use std::sync::Arc;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tracing::{debug, error, info, warn};

pub struct TickDriver {
    coordinator: Arc<Coordinator>,
    tick_interval: Duration,
    /// Audit every N ticks, 0 = never
    audit_every_ticks: u64,
}

impl TickDriver {
    pub fn new(coordinator: Arc<Coordinator>, config: &CoordinatorConfig) -> Self {
        Self {
            coordinator,
            tick_interval: config.tick_interval,
            audit_every_ticks: config.audit_every_ticks,
        }
    }

    /// Drive the clock forever
    pub async fn run(&self) {
        let hint = self.coordinator.schedule_hint();
        let mut ticker = interval(self.tick_interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut ticks: u64 = 0;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    ticks += 1;
                    self.on_tick(ticks).await;
                }
                _ = hint.notified() => self.on_hint().await,
            }
        }
    }

    async fn on_tick(&self, ticks: u64) {
        match self.coordinator.tick().await {
            Ok(report) => {
                if !report.delivered.is_empty() || !report.dispatched.is_empty() {
                    info!(
                        "[TICK] #{}: {} in flight, {} delivered, {} dispatched",
                        ticks,
                        report.advanced.len(),
                        report.delivered.len(),
                        report.dispatched.len()
                    );
                } else {
                    debug!("[TICK] #{}: {} in flight", ticks, report.advanced.len());
                }
            }
            Err(e) => error!("[TICK] #{} failed: {}", ticks, e),
        }

        if self.audit_every_ticks > 0 && ticks % self.audit_every_ticks == 0 {
            match self.coordinator.audit().await {
                Ok(violations) if violations.is_empty() => debug!("[AUDIT] Assignments consistent"),
                Ok(violations) => warn!("[AUDIT] {} invariant violation(s)", violations.len()),
                Err(e) => error!("[AUDIT] Failed: {}", e),
            }
        }
    }

    async fn on_hint(&self) {
        match self.coordinator.run_scheduler().await {
            Ok(assignments) if !assignments.is_empty() => {
                debug!("[TICK] Early pass dispatched {}", assignments.len())
            }
            Ok(_) => {}
            Err(e) => error!("[TICK] Early scheduling pass failed: {}", e),
        }
    }
}
