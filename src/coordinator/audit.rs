//! Cross-store consistency check of assignments
//!
//! Request and drone records are checked against each other: every active
//! request holds exactly one dispatched drone that points back at it, and
//! every dispatched drone is held by an active request. The check reads two
//! snapshots, so while writes are in flight it may report a window that
//! closes on its own; in a quiescent system any report is a real breach.

use aeroreach_shared::{Drone, DroneStatus, Request, RequestStatus};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

#[derive(Debug, Clone, PartialEq)]
pub enum InvariantViolation {
    /// Active request with no drone reference
    ActiveWithoutDrone { request_id: String },
    /// Finished or pending request still referencing a drone
    InactiveWithDrone {
        request_id: String,
        status: RequestStatus,
        drone_id: String,
    },
    /// Active request whose drone is missing, not dispatched, or held by
    /// another request
    DroneNotHeld {
        request_id: String,
        drone_id: String,
        drone_status: Option<DroneStatus>,
    },
    /// One drone referenced by several active requests
    DoubleBooked {
        drone_id: String,
        request_ids: Vec<String>,
    },
    /// Dispatched drone no active request references
    StrandedDrone {
        drone_id: String,
        assigned_request: Option<String>,
    },
}

impl fmt::Display for InvariantViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvariantViolation::ActiveWithoutDrone { request_id } => {
                write!(f, "{request_id} is active without a drone")
            }
            InvariantViolation::InactiveWithDrone {
                request_id,
                status,
                drone_id,
            } => write!(f, "{request_id} is {status} but still references {drone_id}"),
            InvariantViolation::DroneNotHeld {
                request_id,
                drone_id,
                drone_status,
            } => match drone_status {
                Some(status) => write!(
                    f,
                    "{request_id} references {drone_id}, which is {status} and not held by it"
                ),
                None => write!(f, "{request_id} references unknown drone {drone_id}"),
            },
            InvariantViolation::DoubleBooked {
                drone_id,
                request_ids,
            } => write!(f, "{drone_id} is assigned to {}", request_ids.join(", ")),
            InvariantViolation::StrandedDrone {
                drone_id,
                assigned_request,
            } => write!(
                f,
                "{drone_id} is dispatched but no active request holds it (recorded holder: {})",
                assigned_request.as_deref().unwrap_or("none")
            ),
        }
    }
}

/// Check the assignment invariants over a snapshot of both stores
pub fn check(requests: &[Request], drones: &[Drone]) -> Vec<InvariantViolation> {
    let drones_by_id: HashMap<&str, &Drone> = drones.iter().map(|d| (d.id.as_str(), d)).collect();
    let mut holders: BTreeMap<&str, Vec<&str>> = BTreeMap::new();
    let mut violations = Vec::new();

    for request in requests {
        match (request.status.is_active(), request.drone_id.as_deref()) {
            (true, None) => violations.push(InvariantViolation::ActiveWithoutDrone {
                request_id: request.id.clone(),
            }),
            (false, Some(drone_id)) => violations.push(InvariantViolation::InactiveWithDrone {
                request_id: request.id.clone(),
                status: request.status,
                drone_id: drone_id.to_string(),
            }),
            (true, Some(drone_id)) => {
                holders.entry(drone_id).or_default().push(&request.id);

                let drone = drones_by_id.get(drone_id);
                let held = drone.is_some_and(|d| {
                    d.status == DroneStatus::Dispatched
                        && d.assigned_request.as_deref() == Some(request.id.as_str())
                });
                if !held {
                    violations.push(InvariantViolation::DroneNotHeld {
                        request_id: request.id.clone(),
                        drone_id: drone_id.to_string(),
                        drone_status: drone.map(|d| d.status),
                    });
                }
            }
            (false, None) => {}
        }
    }

    for (drone_id, request_ids) in &holders {
        if request_ids.len() > 1 {
            violations.push(InvariantViolation::DoubleBooked {
                drone_id: drone_id.to_string(),
                request_ids: request_ids.iter().map(|id| id.to_string()).collect(),
            });
        }
    }

    for drone in drones {
        if drone.status == DroneStatus::Dispatched && !holders.contains_key(drone.id.as_str()) {
            violations.push(InvariantViolation::StrandedDrone {
                drone_id: drone.id.clone(),
                assigned_request: drone.assigned_request.clone(),
            });
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;
    use aeroreach_shared::{InjuryCategory, InjuryType, Priority};

    fn request(id: &str, status: RequestStatus, drone_id: Option<&str>) -> Request {
        Request {
            id: id.into(),
            user_id: None,
            name: "Amina Njeri".into(),
            age: 29,
            location: "Kibera, Olympic Estate".into(),
            coordinates: None,
            injury_category: InjuryCategory::Trauma,
            injury_type: InjuryType::HeavyBleeding,
            injury_description: None,
            priority: Priority::Emergency,
            status,
            drone_id: drone_id.map(String::from),
            dispatch_time: None,
            progress: 0,
            created_at: 0,
            updated_at: 0,
            sequence: 0,
            version: 1,
            revision: 0,
        }
    }

    fn flying(id: &str, holder: &str) -> Drone {
        let mut drone = Drone::new(id, id, 90).with_status(DroneStatus::Dispatched);
        drone.assigned_request = Some(holder.into());
        drone
    }

    #[test]
    fn test_consistent_snapshot() {
        let requests = vec![
            request("REQ-000001", RequestStatus::InTransit, Some("DRONE-01")),
            request("REQ-000002", RequestStatus::Pending, None),
            request("REQ-000003", RequestStatus::Delivered, None),
        ];
        let drones = vec![flying("DRONE-01", "REQ-000001"), Drone::new("DRONE-02", "Beta", 80)];
        assert!(check(&requests, &drones).is_empty());
    }

    #[test]
    fn test_double_booking() {
        let requests = vec![
            request("REQ-000001", RequestStatus::Dispatched, Some("DRONE-01")),
            request("REQ-000002", RequestStatus::InTransit, Some("DRONE-01")),
        ];
        let drones = vec![flying("DRONE-01", "REQ-000001")];

        let violations = check(&requests, &drones);
        assert!(violations.contains(&InvariantViolation::DoubleBooked {
            drone_id: "DRONE-01".into(),
            request_ids: vec!["REQ-000001".into(), "REQ-000002".into()],
        }));
        assert!(violations
            .iter()
            .any(|v| matches!(v, InvariantViolation::DroneNotHeld { request_id, .. } if request_id == "REQ-000002")));
    }

    #[test]
    fn test_stranded_and_dangling() {
        let requests = vec![
            request("REQ-000001", RequestStatus::Cancelled, Some("DRONE-02")),
            request("REQ-000002", RequestStatus::Dispatched, None),
        ];
        let drones = vec![flying("DRONE-01", "REQ-000009")];

        let violations = check(&requests, &drones);
        assert_eq!(violations.len(), 3);
        assert!(violations.iter().any(|v| matches!(v, InvariantViolation::StrandedDrone { .. })));
        assert!(violations.iter().any(|v| matches!(v, InvariantViolation::InactiveWithDrone { .. })));
        assert!(violations.iter().any(|v| matches!(v, InvariantViolation::ActiveWithoutDrone { .. })));
        assert!(violations[0].to_string().contains("REQ-00000"));
    }
}
