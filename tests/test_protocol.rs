//! Integration tests for the resolution protocol.
//! Tests JSON serialization/deserialization of endpoint messages.

use changegate::error::ApprovalError;
use changegate::gateway::protocol::{ResolutionRequest, ResolutionResponse};
use changegate::request::{ApprovalStatus, RequestId};

#[test]
fn test_request_serialization() {
    let request = ResolutionRequest {
        token: "tok-001".to_string(),
        request_id: "11111111-2222-3333-4444-555555555555".to_string(),
        approved: true,
        verification_code: Some("123456".to_string()),
    };

    let json = serde_json::to_string(&request).unwrap();
    let parsed: ResolutionRequest = serde_json::from_str(&json).unwrap();

    assert_eq!(parsed.token, "tok-001");
    assert!(parsed.approved);
    assert_eq!(parsed.verification_code.as_deref(), Some("123456"));
}

#[test]
fn test_verification_code_omitted_when_absent() {
    let request = ResolutionRequest {
        token: "tok-001".to_string(),
        request_id: "11111111-2222-3333-4444-555555555555".to_string(),
        approved: false,
        verification_code: None,
    };

    let json = serde_json::to_string(&request).unwrap();
    assert!(!json.contains("verification_code"));
}

#[test]
fn test_response_success() {
    let response = ResolutionResponse::success();
    let json = serde_json::to_string(&response).unwrap();
    let parsed: ResolutionResponse = serde_json::from_str(&json).unwrap();

    assert!(parsed.ok);
    assert_eq!(parsed.status, 200);
    assert!(parsed.error.is_none());
}

#[test]
fn test_response_from_engine_errors() {
    let id = RequestId::new();

    let not_found = ResolutionResponse::from_error(&ApprovalError::NotFound(id.clone()));
    assert!(!not_found.ok);
    assert_eq!(not_found.status, 404);
    assert!(not_found.error.unwrap().contains(&id.to_string()));

    let not_pending = ResolutionResponse::from_error(&ApprovalError::NotPending {
        id,
        status: ApprovalStatus::Rejected,
    });
    assert_eq!(not_pending.status, 400);

    let forbidden =
        ResolutionResponse::from_error(&ApprovalError::Forbidden("not a reviewer".to_string()));
    assert_eq!(forbidden.status, 403);

    let downstream =
        ResolutionResponse::from_error(&ApprovalError::Connector("store down".to_string()));
    assert_eq!(downstream.status, 500);
}
