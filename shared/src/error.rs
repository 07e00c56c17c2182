//! Error taxonomy for dispatch operations

use crate::RequestStatus;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of record an id refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Request,
    Drone,
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKind::Request => write!(f, "request"),
            EntityKind::Drone => write!(f, "drone"),
        }
    }
}

/// Errors returned by the store, the registry and the coordinator
#[derive(Error, Debug, Clone, PartialEq)]
pub enum DispatchError {
    /// Malformed or missing submission fields; nothing was persisted
    #[error("Validation failed: {0}")]
    Validation(String),

    /// State machine violation; the request is unchanged
    #[error("Invalid transition: {from} -> {to}")]
    InvalidTransition {
        from: RequestStatus,
        to: RequestStatus,
    },

    /// Another caller reserved the drone first
    #[error("Drone already reserved: {0}")]
    AlreadyReserved(String),

    /// Release attempted by a request that does not hold the drone
    #[error("Drone {drone_id} is not reserved by {request_id}")]
    NotReserved {
        drone_id: String,
        request_id: String,
    },

    /// Drone exists but cannot take this action right now
    #[error("Drone {drone_id} unavailable: {reason}")]
    DroneUnavailable { drone_id: String, reason: String },

    #[error("Unknown {kind}: {id}")]
    NotFound { kind: EntityKind, id: String },

    /// Optimistic concurrency check failed; retry the whole operation
    #[error("Version conflict on {id}: expected {expected}, found {actual}")]
    Conflict {
        id: String,
        expected: u64,
        actual: u64,
    },
}

impl DispatchError {
    pub fn request_not_found(id: impl Into<String>) -> Self {
        DispatchError::NotFound {
            kind: EntityKind::Request,
            id: id.into(),
        }
    }

    pub fn drone_not_found(id: impl Into<String>) -> Self {
        DispatchError::NotFound {
            kind: EntityKind::Drone,
            id: id.into(),
        }
    }

    /// Stable code used on the wire
    pub fn code(&self) -> ErrorCode {
        match self {
            DispatchError::Validation(_) => ErrorCode::ValidationError,
            DispatchError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            DispatchError::AlreadyReserved(_) => ErrorCode::AlreadyReserved,
            DispatchError::NotReserved { .. } => ErrorCode::NotReserved,
            DispatchError::DroneUnavailable { .. } => ErrorCode::DroneUnavailable,
            DispatchError::NotFound { .. } => ErrorCode::NotFound,
            DispatchError::Conflict { .. } => ErrorCode::Conflict,
        }
    }

    /// Whether the caller may simply retry the same operation
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            DispatchError::Conflict { .. } | DispatchError::AlreadyReserved(_)
        )
    }
}

/// Error codes carried in API responses
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    ValidationError,
    InvalidTransition,
    AlreadyReserved,
    NotReserved,
    DroneUnavailable,
    NotFound,
    Conflict,
    /// Frame could not be decoded or the server failed internally
    BadRequest,
    /// Reply exceeded the frame size limit; narrow the query or page it
    ResponseTooLarge,
}

pub type DispatchResult<T> = Result<T, DispatchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = DispatchError::InvalidTransition {
            from: RequestStatus::Completed,
            to: RequestStatus::Cancelled,
        };
        assert_eq!(err.to_string(), "Invalid transition: completed -> cancelled");

        let err = DispatchError::request_not_found("REQ-000042");
        assert_eq!(err.to_string(), "Unknown request: REQ-000042");
        assert_eq!(err.code(), ErrorCode::NotFound);
    }

    #[test]
    fn test_retryable() {
        assert!(DispatchError::Conflict {
            id: "REQ-000001".into(),
            expected: 1,
            actual: 2
        }
        .is_retryable());
        assert!(!DispatchError::Validation("name is required".into()).is_retryable());
    }
}
