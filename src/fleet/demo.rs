//! Demo fleet used when no external fleet source is configured

use aeroreach_shared::{now_ms, Coordinates, Drone, DroneStatus};

const DAY_MS: u64 = 24 * 60 * 60 * 1000;

/// The five AeroMed units of the pilot deployment
pub fn demo_fleet() -> Vec<Drone> {
    let now = now_ms();
    let base = Coordinates {
        lat: -1.2921,
        lng: 36.8219,
    };

    let mut alpha = Drone::new("DRONE-01", "AeroMed Alpha", 78).with_location(Coordinates {
        lat: -1.2850,
        lng: 36.8200,
    });
    alpha.last_maintenance = now.saturating_sub(3 * DAY_MS);

    let mut beta = Drone::new("DRONE-02", "AeroMed Beta", 92).with_location(Coordinates {
        lat: -1.2700,
        lng: 36.8150,
    });
    beta.last_maintenance = now.saturating_sub(DAY_MS);

    let mut gamma = Drone::new("DRONE-03", "AeroMed Gamma", 100).with_location(base);
    gamma.last_maintenance = now.saturating_sub(5 * DAY_MS);

    let mut delta = Drone::new("DRONE-04", "AeroMed Delta", 45).with_status(DroneStatus::Maintenance);
    delta.last_maintenance = now;

    let mut echo = Drone::new("DRONE-05", "AeroMed Echo", 88).with_location(base);
    echo.last_maintenance = now.saturating_sub(2 * DAY_MS);

    vec![alpha, beta, gamma, delta, echo]
}
