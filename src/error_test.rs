use super::*;
use serde_json::json;

// =============================================================================
// fallback_message
// =============================================================================

#[test]
fn fallback_message_by_status_class() {
    assert_eq!(fallback_message(401), INVALID_CREDENTIALS_MESSAGE);
    assert_eq!(fallback_message(403), PERMISSION_DENIED_MESSAGE);
    assert_eq!(fallback_message(404), NOT_FOUND_MESSAGE);
    assert_eq!(fallback_message(500), SERVER_ERROR_MESSAGE);
    assert_eq!(fallback_message(503), SERVER_ERROR_MESSAGE);
    assert_eq!(fallback_message(422), PROCESSING_FAILED_MESSAGE);
}

// =============================================================================
// AuthError::from_response
// =============================================================================

#[test]
fn server_message_wins_over_error_field() {
    let err = AuthError::from_response(400, &json!({ "message": "Phone already registered", "error": "conflict" }));
    assert_eq!(err.message(), "Phone already registered");
    assert_eq!(err.status(), Some(400));
    assert!(err.is_api_error());
    assert!(!err.is_network_error());
}

#[test]
fn error_field_used_when_message_missing() {
    let err = AuthError::from_response(400, &json!({ "error": "Bad payload" }));
    assert_eq!(err.message(), "Bad payload");
}

#[test]
fn blank_server_message_falls_through() {
    let err = AuthError::from_response(401, &json!({ "message": "  " }));
    assert_eq!(err.message(), INVALID_CREDENTIALS_MESSAGE);
}

#[test]
fn non_object_body_uses_status_message() {
    let err = AuthError::from_response(502, &json!("gateway"));
    assert_eq!(err.message(), SERVER_ERROR_MESSAGE);
}

#[test]
fn null_body_uses_generic_message() {
    let err = AuthError::from_response(418, &Value::Null);
    assert_eq!(err.message(), PROCESSING_FAILED_MESSAGE);
}

// =============================================================================
// conversions
// =============================================================================

#[test]
fn status_request_error_becomes_api_error() {
    let err: AuthError = RequestError::Status { status: 403, body: json!({}) }.into();
    assert_eq!(err, AuthError::Api { status: 403, message: PERMISSION_DENIED_MESSAGE.to_owned() });
}

#[test]
fn decode_request_error_becomes_client_error() {
    let err: AuthError = RequestError::Decode("eof".into()).into();
    assert!(!err.is_api_error());
    assert!(!err.is_network_error());
    assert!(err.message().contains("eof"));
}

#[test]
fn network_error_is_flagged() {
    let err = AuthError::network();
    assert!(err.is_network_error());
    assert_eq!(err.status(), None);
    assert_eq!(err.to_string(), NETWORK_ERROR_MESSAGE);
}

#[test]
fn request_error_status_accessors() {
    let err = RequestError::Status { status: 401, body: Value::Null };
    assert!(err.is_unauthorized());
    assert_eq!(RequestError::Decode(String::new()).status(), None);
}
