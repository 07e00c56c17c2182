//! Request/response messages exchanged between responder consoles and the
//! coordinator

use crate::{
    now_ms, ChangeSet, Coordinates, DispatchError, Drone, ErrorCode, NewRequest, RequestFilter,
    RequestView, SubmitReceipt, TickReport,
};
use serde::{Deserialize, Serialize};

/// Metadata carried by every frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Header {
    /// Identifies the responder console or service sending the frame
    pub client_id: String,
    pub sequence_id: u64,
    pub timestamp_ms: u64,
}

impl Header {
    /// Create a new header with the given client ID and sequence number
    pub fn new(client_id: impl Into<String>, sequence_id: u64) -> Self {
        Self {
            client_id: client_id.into(),
            sequence_id,
            timestamp_ms: now_ms(),
        }
    }
}

/// A framed message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub header: Header,
    pub body: T,
}

pub type RequestEnvelope = Envelope<ApiRequest>;
pub type ResponseEnvelope = Envelope<ApiResponse>;

/// Operations a client can invoke on the coordinator.
///
/// The `op` tag is snake_case like every other enum value on the wire;
/// field names are camelCase like the records they carry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum ApiRequest {
    SubmitRequest {
        request: NewRequest,
    },
    ListRequests {
        #[serde(default)]
        filter: RequestFilter,
    },
    GetRequest {
        request_id: String,
    },
    ListDrones,
    DispatchManually {
        request_id: String,
        drone_id: String,
    },
    CancelRequest {
        request_id: String,
    },
    CompleteRequest {
        request_id: String,
    },
    UpdateTelemetry {
        drone_id: String,
        battery_level: u8,
        #[serde(default)]
        location: Option<Coordinates>,
    },
    FlagMaintenance {
        drone_id: String,
    },
    ReturnToService {
        drone_id: String,
    },
    ReportOffline {
        drone_id: String,
    },
    ReportOnline {
        drone_id: String,
    },
    ChangesSince {
        revision: u64,
        #[serde(default)]
        limit: Option<usize>,
    },
    Tick,
}

/// Replies from the coordinator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum ApiResponse {
    Submitted(SubmitReceipt),
    Request(RequestView),
    Requests(Vec<RequestView>),
    Drone(Drone),
    Drones(Vec<Drone>),
    Changes(ChangeSet),
    Tick(TickReport),
    Error { code: ErrorCode, message: String },
}

impl ApiResponse {
    pub fn is_error(&self) -> bool {
        matches!(self, ApiResponse::Error { .. })
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        ApiResponse::Error {
            code: ErrorCode::BadRequest,
            message: message.into(),
        }
    }
}

impl From<DispatchError> for ApiResponse {
    fn from(err: DispatchError) -> Self {
        ApiResponse::Error {
            code: err.code(),
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_wire_format() {
        let json = r#"{"op":"dispatch_manually","requestId":"REQ-000003","droneId":"DRONE-05"}"#;
        let parsed: ApiRequest = serde_json::from_str(json).unwrap();
        assert_eq!(
            parsed,
            ApiRequest::DispatchManually {
                request_id: "REQ-000003".into(),
                drone_id: "DRONE-05".into(),
            }
        );

        let parsed: ApiRequest = serde_json::from_str(r#"{"op":"tick"}"#).unwrap();
        assert_eq!(parsed, ApiRequest::Tick);

        let parsed: ApiRequest = serde_json::from_str(r#"{"op":"list_requests"}"#).unwrap();
        assert_eq!(
            parsed,
            ApiRequest::ListRequests {
                filter: RequestFilter::default()
            }
        );
    }

    #[test]
    fn test_envelope_is_camel_case() {
        let envelope = RequestEnvelope {
            header: Header::new("console-1", 12),
            body: ApiRequest::UpdateTelemetry {
                drone_id: "DRONE-02".into(),
                battery_level: 64,
                location: None,
            },
        };
        let json = serde_json::to_value(&envelope).unwrap();
        assert_eq!(json["header"]["clientId"], "console-1");
        assert_eq!(json["header"]["sequenceId"], 12);
        assert!(json["header"]["timestampMs"].is_u64());
        assert_eq!(json["body"]["op"], "update_telemetry");
        assert_eq!(json["body"]["droneId"], "DRONE-02");
        assert_eq!(json["body"]["batteryLevel"], 64);

        let parsed: ApiRequest =
            serde_json::from_str(r#"{"op":"changes_since","revision":40,"limit":100}"#).unwrap();
        assert_eq!(
            parsed,
            ApiRequest::ChangesSince {
                revision: 40,
                limit: Some(100)
            }
        );
    }

    #[test]
    fn test_error_response() {
        let response: ApiResponse = DispatchError::request_not_found("REQ-000009").into();
        assert!(response.is_error());

        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["kind"], "error");
        assert_eq!(json["data"]["code"], "not_found");
    }

    #[test]
    fn test_header_creation() {
        let header = Header::new("console-1", 7);
        assert_eq!(header.client_id, "console-1");
        assert_eq!(header.sequence_id, 7);
        assert!(header.timestamp_ms > 0);
    }
}
