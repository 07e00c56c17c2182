//! Domain types shared by the coordinator and its clients
//!
//! All records are plain data. The coordinator hands out clones, so a value
//! held by a client is an immutable snapshot of the record at read time.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Broad grouping of injuries, as selected on the intake form
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjuryCategory {
    Trauma,
    Postpartum,
    Gbv,
    Chronic,
    Other,
}

impl InjuryCategory {
    pub const ALL: [InjuryCategory; 5] = [
        InjuryCategory::Trauma,
        InjuryCategory::Postpartum,
        InjuryCategory::Gbv,
        InjuryCategory::Chronic,
        InjuryCategory::Other,
    ];

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            InjuryCategory::Trauma => "Trauma / Emergency",
            InjuryCategory::Postpartum => "Postpartum",
            InjuryCategory::Gbv => "Gender-Based Violence",
            InjuryCategory::Chronic => "Chronic Condition",
            InjuryCategory::Other => "Other",
        }
    }
}

/// Specific injury reported by the requester
///
/// Values this build does not know deserialize to `Unknown` instead of
/// failing, so a newer client cannot crash intake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InjuryType {
    HeavyBleeding,
    BreathingDifficulty,
    HeadInjury,
    NeckInjury,
    SpinalInjury,
    PostpartumHemorrhage,
    PostpartumInfection,
    GbvPhysical,
    GbvEmergency,
    ChronicCardiac,
    ChronicDiabetic,
    ChronicRespiratory,
    Other,
    #[serde(other)]
    Unknown,
}

impl InjuryType {
    /// Every injury type the intake form offers
    pub const KNOWN: [InjuryType; 13] = [
        InjuryType::HeavyBleeding,
        InjuryType::BreathingDifficulty,
        InjuryType::HeadInjury,
        InjuryType::NeckInjury,
        InjuryType::SpinalInjury,
        InjuryType::PostpartumHemorrhage,
        InjuryType::PostpartumInfection,
        InjuryType::GbvPhysical,
        InjuryType::GbvEmergency,
        InjuryType::ChronicCardiac,
        InjuryType::ChronicDiabetic,
        InjuryType::ChronicRespiratory,
        InjuryType::Other,
    ];

    /// Human-readable label
    pub fn label(&self) -> &'static str {
        match self {
            InjuryType::HeavyBleeding => "Heavy Bleeding",
            InjuryType::BreathingDifficulty => "Breathing Difficulty",
            InjuryType::HeadInjury => "Head Injury",
            InjuryType::NeckInjury => "Neck Injury",
            InjuryType::SpinalInjury => "Spinal Injury",
            InjuryType::PostpartumHemorrhage => "Postpartum Hemorrhage",
            InjuryType::PostpartumInfection => "Postpartum Infection",
            InjuryType::GbvPhysical => "Physical Injury (GBV)",
            InjuryType::GbvEmergency => "Emergency (GBV)",
            InjuryType::ChronicCardiac => "Cardiac Event",
            InjuryType::ChronicDiabetic => "Diabetic Emergency",
            InjuryType::ChronicRespiratory => "Respiratory Distress",
            InjuryType::Other => "Other",
            InjuryType::Unknown => "Unrecognized",
        }
    }
}

/// Dispatch priority. Ordering is significant: `Emergency > High > Normal`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Normal,
    High,
    Emergency,
}

/// Lifecycle status of a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Dispatched,
    InTransit,
    Delivered,
    Completed,
    Cancelled,
}

impl RequestStatus {
    pub const ALL: [RequestStatus; 6] = [
        RequestStatus::Pending,
        RequestStatus::Dispatched,
        RequestStatus::InTransit,
        RequestStatus::Delivered,
        RequestStatus::Completed,
        RequestStatus::Cancelled,
    ];

    /// A drone is bound to the request in these states
    pub fn is_active(&self) -> bool {
        matches!(self, RequestStatus::Dispatched | RequestStatus::InTransit)
    }

    /// No outgoing transitions
    pub fn is_terminal(&self) -> bool {
        matches!(self, RequestStatus::Completed | RequestStatus::Cancelled)
    }
}

impl fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Dispatched => "dispatched",
            RequestStatus::InTransit => "in_transit",
            RequestStatus::Delivered => "delivered",
            RequestStatus::Completed => "completed",
            RequestStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Operational status of a drone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DroneStatus {
    Available,
    Dispatched,
    Maintenance,
    Offline,
}

impl fmt::Display for DroneStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DroneStatus::Available => "available",
            DroneStatus::Dispatched => "dispatched",
            DroneStatus::Maintenance => "maintenance",
            DroneStatus::Offline => "offline",
        };
        f.write_str(s)
    }
}

/// WGS84 position
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lng: f64,
}

impl Coordinates {
    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Fields supplied by the requester on submission
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewRequest {
    #[serde(default)]
    pub user_id: Option<String>,
    pub name: String,
    pub age: u32,
    pub location: String,
    #[serde(default)]
    pub coordinates: Option<Coordinates>,
    pub injury_category: InjuryCategory,
    pub injury_type: InjuryType,
    #[serde(default)]
    pub injury_description: Option<String>,
}

/// One medical-assistance case
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub id: String,
    pub user_id: Option<String>,
    pub name: String,
    pub age: u32,
    pub location: String,
    pub coordinates: Option<Coordinates>,
    pub injury_category: InjuryCategory,
    pub injury_type: InjuryType,
    pub injury_description: Option<String>,
    pub priority: Priority,
    pub status: RequestStatus,
    pub drone_id: Option<String>,
    pub dispatch_time: Option<u64>,
    pub progress: u8,
    pub created_at: u64,
    pub updated_at: u64,
    /// Intake ordinal, breaks `created_at` ties
    pub sequence: u64,
    /// Bumped on every mutation of this record
    pub version: u64,
    /// Global revision of the last mutation
    pub revision: u64,
}

impl Request {
    /// Rebuild the submission that produced this request
    pub fn to_submission(&self) -> NewRequest {
        NewRequest {
            user_id: self.user_id.clone(),
            name: self.name.clone(),
            age: self.age,
            location: self.location.clone(),
            coordinates: self.coordinates,
            injury_category: self.injury_category,
            injury_type: self.injury_type,
            injury_description: self.injury_description.clone(),
        }
    }
}

/// A request snapshot together with its derived, display-only ETA
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestView {
    #[serde(flatten)]
    pub request: Request,
    pub eta_minutes: Option<u32>,
}

/// Reply to a submission: the stored request plus first-aid guidance for
/// whoever is with the patient until the drone arrives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReceipt {
    #[serde(flatten)]
    pub view: RequestView,
    pub first_aid: Vec<String>,
}

impl SubmitReceipt {
    pub fn new(view: RequestView) -> Self {
        let first_aid = crate::triage::first_aid_tips(view.request.injury_type)
            .iter()
            .map(|tip| tip.to_string())
            .collect();
        Self { view, first_aid }
    }
}

/// One fleet unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Drone {
    pub id: String,
    pub name: String,
    pub status: DroneStatus,
    pub battery_level: u8,
    pub current_location: Option<Coordinates>,
    pub last_maintenance: u64,
    /// Send to maintenance instead of back to the pool on release
    pub maintenance_due: bool,
    /// Lost contact while flying; goes offline on release
    pub offline_due: bool,
    /// Request currently holding the reservation
    pub assigned_request: Option<String>,
    pub version: u64,
    pub revision: u64,
    pub updated_at: u64,
}

impl Drone {
    /// A fresh, available drone
    pub fn new(id: impl Into<String>, name: impl Into<String>, battery_level: u8) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            status: DroneStatus::Available,
            battery_level: battery_level.min(100),
            current_location: None,
            last_maintenance: 0,
            maintenance_due: false,
            offline_due: false,
            assigned_request: None,
            version: 0,
            revision: 0,
            updated_at: 0,
        }
    }

    pub fn with_location(mut self, location: Coordinates) -> Self {
        self.current_location = Some(location);
        self
    }

    pub fn with_status(mut self, status: DroneStatus) -> Self {
        self.status = status;
        self
    }
}

/// Selection criteria for listing requests. Empty fields match everything.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestFilter {
    #[serde(default)]
    pub statuses: Vec<RequestStatus>,
    #[serde(default)]
    pub priority: Option<Priority>,
    #[serde(default)]
    pub drone_id: Option<String>,
    /// Return at most this many matches, in dispatch order
    #[serde(default)]
    pub limit: Option<usize>,
}

impl RequestFilter {
    pub fn status(status: RequestStatus) -> Self {
        Self {
            statuses: vec![status],
            ..Default::default()
        }
    }

    /// Requests currently holding a drone
    pub fn active() -> Self {
        Self {
            statuses: vec![RequestStatus::Dispatched, RequestStatus::InTransit],
            ..Default::default()
        }
    }

    pub fn matches(&self, request: &Request) -> bool {
        (self.statuses.is_empty() || self.statuses.contains(&request.status))
            && self.priority.map_or(true, |p| p == request.priority)
            && self
                .drone_id
                .as_ref()
                .map_or(true, |d| request.drone_id.as_ref() == Some(d))
    }
}

/// Binding of one drone to one request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub request_id: String,
    pub drone_id: String,
}

/// Outcome of one clock advance
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TickReport {
    /// Requests whose progress moved this tick
    pub advanced: Vec<String>,
    /// Requests that reached 100% and were delivered
    pub delivered: Vec<String>,
    /// Requests changed concurrently and left for the next tick
    pub skipped: Vec<String>,
    /// Assignments made by the scheduling pass that followed
    pub dispatched: Vec<Assignment>,
    /// Set when the scheduling pass aborted
    pub scheduler_error: Option<String>,
    /// Delivered requests whose drone could not be handed back
    pub release_failures: Vec<String>,
}

/// Everything mutated after a given revision
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeSet {
    /// Pass this back to fetch the next batch of changes
    pub revision: u64,
    pub requests: Vec<RequestView>,
    pub drones: Vec<Drone>,
    /// More changes are waiting after `revision`
    pub truncated: bool,
}
