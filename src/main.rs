mod api;
mod clock;
mod config;
mod coordinator;
mod fleet;
mod revision;
mod scheduler;
mod store;
mod tracker;

#[cfg(test)]
mod testing;

use api::ApiServer;
use clock::TickDriver;
use config::CoordinatorConfig;
use coordinator::Coordinator;
use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .init();

    let config = CoordinatorConfig::from_env();
    info!("AeroReach coordinator starting");
    info!("  API: {}", config.listen_addr);
    info!(
        "  Progress step: {}% per tick, full flight {} min",
        config.tracker.progress_step, config.tracker.flight_minutes
    );
    info!("  Dispatch battery floor: {}%", config.scheduler.min_dispatch_battery);

    let coordinator = Arc::new(Coordinator::new(&config));

    if config.seed_demo_fleet {
        let count = coordinator.seed_fleet(fleet::demo_fleet()).await?;
        info!("Demo fleet registered ({} drones)", count);
    }

    if config.drives_clock() {
        let driver = TickDriver::new(coordinator.clone(), &config);
        tokio::spawn(async move { driver.run().await });
        info!("Tick driver started ({:?} interval)", config.tick_interval);
    } else {
        info!("Tick driver disabled; clock is driven through the API");
    }

    let server = ApiServer::bind(config.listen_addr, coordinator).await?;
    server.run().await
}
