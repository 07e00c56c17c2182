//! Routes decoded API requests into the coordinator

use crate::coordinator::Coordinator;
use aeroreach_shared::SubmitReceipt;
use aeroreach_shared::protocol::{
    ApiRequest, ApiResponse, Envelope, Header, RequestEnvelope, ResponseEnvelope,
};
use tracing::debug;

/// Client id the coordinator stamps on its replies
pub const SERVER_ID: &str = "coordinator";

/// Execute one request and build the reply body
pub async fn handle(coordinator: &Coordinator, request: ApiRequest) -> ApiResponse {
    let result = match request {
        ApiRequest::SubmitRequest { request } => coordinator
            .submit_request(request)
            .await
            .map(|view| ApiResponse::Submitted(SubmitReceipt::new(view))),
        ApiRequest::ListRequests { filter } => coordinator
            .list_requests(&filter)
            .await
            .map(ApiResponse::Requests),
        ApiRequest::GetRequest { request_id } => coordinator
            .get_request(&request_id)
            .await
            .map(ApiResponse::Request),
        ApiRequest::ListDrones => coordinator.list_drones().await.map(ApiResponse::Drones),
        ApiRequest::DispatchManually {
            request_id,
            drone_id,
        } => coordinator
            .dispatch_manually(&request_id, &drone_id)
            .await
            .map(ApiResponse::Request),
        ApiRequest::CancelRequest { request_id } => coordinator
            .cancel_request(&request_id)
            .await
            .map(ApiResponse::Request),
        ApiRequest::CompleteRequest { request_id } => coordinator
            .complete_request(&request_id)
            .await
            .map(ApiResponse::Request),
        ApiRequest::UpdateTelemetry {
            drone_id,
            battery_level,
            location,
        } => coordinator
            .update_telemetry(&drone_id, battery_level, location)
            .await
            .map(ApiResponse::Drone),
        ApiRequest::FlagMaintenance { drone_id } => coordinator
            .flag_maintenance(&drone_id)
            .await
            .map(ApiResponse::Drone),
        ApiRequest::ReturnToService { drone_id } => coordinator
            .return_to_service(&drone_id)
            .await
            .map(ApiResponse::Drone),
        ApiRequest::ReportOffline { drone_id } => coordinator
            .report_offline(&drone_id)
            .await
            .map(ApiResponse::Drone),
        ApiRequest::ReportOnline { drone_id } => coordinator
            .report_online(&drone_id)
            .await
            .map(ApiResponse::Drone),
        ApiRequest::ChangesSince { revision, limit } => coordinator
            .changes_since(revision, limit)
            .await
            .map(ApiResponse::Changes),
        ApiRequest::Tick => coordinator.tick().await.map(ApiResponse::Tick),
    };

    result.unwrap_or_else(ApiResponse::from)
}

/// Execute an enveloped request, echoing its sequence id in the reply
pub async fn respond(coordinator: &Coordinator, envelope: RequestEnvelope) -> ResponseEnvelope {
    let Envelope { header, body } = envelope;
    debug!(
        "[API] {} seq={} {:?}",
        header.client_id, header.sequence_id, body
    );

    let body = handle(coordinator, body).await;
    if let ApiResponse::Error { code, message } = &body {
        debug!(
            "[API] {} seq={} failed: {:?} {}",
            header.client_id, header.sequence_id, code, message
        );
    }

    Envelope {
        header: Header::new(SERVER_ID, header.sequence_id),
        body,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CoordinatorConfig;
    use crate::testing::submission;
    use aeroreach_shared::{Drone, ErrorCode, InjuryType, RequestStatus};

    async fn coordinator() -> Coordinator {
        let coordinator = Coordinator::new(&CoordinatorConfig::default());
        coordinator
            .register_drone(Drone::new("DRONE-01", "Alpha", 90))
            .await
            .unwrap();
        coordinator
    }

    #[tokio::test]
    async fn test_submit_and_get() {
        let coordinator = coordinator().await;

        let response = handle(
            &coordinator,
            ApiRequest::SubmitRequest {
                request: submission(InjuryType::GbvEmergency),
            },
        )
        .await;
        let receipt = match response {
            ApiResponse::Submitted(receipt) => receipt,
            other => panic!("expected a receipt, got {:?}", other),
        };
        let view = receipt.view;
        assert_eq!(view.request.status, RequestStatus::Dispatched);
        assert_eq!(
            receipt.first_aid,
            aeroreach_shared::triage::first_aid_tips(InjuryType::GbvEmergency)
        );

        let response = handle(
            &coordinator,
            ApiRequest::GetRequest {
                request_id: view.request.id.clone(),
            },
        )
        .await;
        assert!(matches!(response, ApiResponse::Request(v) if v.request.id == view.request.id));
    }

    #[tokio::test]
    async fn test_errors_carry_codes() {
        let coordinator = coordinator().await;

        let response = handle(
            &coordinator,
            ApiRequest::CancelRequest {
                request_id: "REQ-404404".into(),
            },
        )
        .await;
        assert!(matches!(
            response,
            ApiResponse::Error {
                code: ErrorCode::NotFound,
                ..
            }
        ));

        let response = handle(
            &coordinator,
            ApiRequest::ReturnToService {
                drone_id: "DRONE-01".into(),
            },
        )
        .await;
        assert!(matches!(
            response,
            ApiResponse::Error {
                code: ErrorCode::DroneUnavailable,
                ..
            }
        ));
    }

    #[tokio::test]
    async fn test_respond_echoes_sequence() {
        let coordinator = coordinator().await;
        let envelope = Envelope {
            header: Header::new("console-3", 41),
            body: ApiRequest::ListDrones,
        };

        let reply = respond(&coordinator, envelope).await;
        assert_eq!(reply.header.sequence_id, 41);
        assert_eq!(reply.header.client_id, SERVER_ID);
        assert!(matches!(reply.body, ApiResponse::Drones(d) if d.len() == 1));
    }
}
