//! HTTP body to canonical request parameters, and relay errors to HTTP
//! responses.

use poke_relay::{ErrorKind, RelayError};
use serde_json::{json, Map, Value};
use warp::http::StatusCode;

pub const INVALID_PARAMETERS_MESSAGE: &str = "Invalid request parameters";
pub const BROKER_UNAVAILABLE_MESSAGE: &str = "Unable to connect to Solace broker";
pub const SEND_FAILED_MESSAGE: &str = "Failed to send message";

/// Map an inbound body onto the canonical parameter shape.
///
/// `vpn` and `message` are accepted as aliases for `vpnName` and `payload`;
/// the canonical key wins unless it is missing, null or an empty string.
/// `isQueue` is copied as given, or `default_is_queue` when the key is absent.
pub fn normalize_send_body(body: &Value, default_is_queue: bool) -> Value {
    let empty = Map::new();
    let fields = body.as_object().unwrap_or(&empty);
    let mut canonical = Map::new();

    for key in ["brokerUrl", "username", "password", "destination"] {
        if let Some(value) = fields.get(key) {
            canonical.insert(key.to_string(), value.clone());
        }
    }
    if let Some(value) = aliased(fields, "vpnName", "vpn") {
        canonical.insert("vpnName".to_string(), value.clone());
    }
    if let Some(value) = aliased(fields, "payload", "message") {
        canonical.insert("payload".to_string(), value.clone());
    }

    let is_queue = fields
        .get("isQueue")
        .cloned()
        .unwrap_or(Value::Bool(default_is_queue));
    canonical.insert("isQueue".to_string(), is_queue);

    Value::Object(canonical)
}

fn aliased<'a>(fields: &'a Map<String, Value>, key: &str, alias: &str) -> Option<&'a Value> {
    match fields.get(key) {
        None | Some(Value::Null) => fields.get(alias),
        Some(Value::String(s)) if s.is_empty() => fields.get(alias).or(fields.get(key)),
        present => present,
    }
}

/// Status code and JSON body for a failed relay
pub fn error_response(err: &RelayError) -> (StatusCode, Value) {
    let (status, message) = match err.kind() {
        ErrorKind::Validation => (StatusCode::BAD_REQUEST, INVALID_PARAMETERS_MESSAGE),
        ErrorKind::Connection => (StatusCode::SERVICE_UNAVAILABLE, BROKER_UNAVAILABLE_MESSAGE),
        ErrorKind::Message => (StatusCode::INTERNAL_SERVER_ERROR, SEND_FAILED_MESSAGE),
    };

    let mut body = json!({
        "success": false,
        "message": message,
        "error": err.to_string(),
    });
    if let Some(details) = err.details() {
        body["details"] = json!(details);
    }

    (status, body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use poke_relay::ErrorDetails;

    #[test]
    fn test_aliases_fill_canonical_fields() {
        let body = json!({
            "brokerUrl": "ws://localhost:8000",
            "vpn": "default",
            "username": "test-user",
            "password": "test-password",
            "destination": "test-queue",
            "message": "test message"
        });

        assert_eq!(
            normalize_send_body(&body, true),
            json!({
                "brokerUrl": "ws://localhost:8000",
                "vpnName": "default",
                "username": "test-user",
                "password": "test-password",
                "destination": "test-queue",
                "payload": "test message",
                "isQueue": true
            })
        );
    }

    #[test]
    fn test_canonical_fields_win() {
        let body = json!({
            "vpnName": "primary",
            "vpn": "alias",
            "payload": {"a": 1},
            "message": "ignored"
        });
        let normalized = normalize_send_body(&body, true);
        assert_eq!(normalized["vpnName"], "primary");
        assert_eq!(normalized["payload"], json!({"a": 1}));
    }

    #[test]
    fn test_empty_or_null_canonical_falls_back() {
        let body = json!({"vpnName": "", "vpn": "alias", "payload": null, "message": "hi"});
        let normalized = normalize_send_body(&body, true);
        assert_eq!(normalized["vpnName"], "alias");
        assert_eq!(normalized["payload"], "hi");

        let body = json!({"vpnName": ""});
        assert_eq!(normalize_send_body(&body, true)["vpnName"], "");
    }

    #[test]
    fn test_falsy_payload_is_kept() {
        let body = json!({"payload": 0, "message": "other"});
        assert_eq!(normalize_send_body(&body, true)["payload"], 0);
    }

    #[test]
    fn test_is_queue_default_and_passthrough() {
        assert_eq!(normalize_send_body(&json!({}), false)["isQueue"], false);
        assert_eq!(normalize_send_body(&json!({"isQueue": false}), true)["isQueue"], false);
        assert_eq!(
            normalize_send_body(&json!({"isQueue": "yes"}), true)["isQueue"],
            "yes"
        );
        assert_eq!(
            normalize_send_body(&json!({"isQueue": null}), true)["isQueue"],
            Value::Null
        );
    }

    #[test]
    fn test_non_object_body_normalizes_to_defaults() {
        assert_eq!(normalize_send_body(&json!([1, 2]), true), json!({"isQueue": true}));
    }

    #[test]
    fn test_error_response_mapping() {
        let (status, body) = error_response(&RelayError::validation(
            "Parameter 'brokerUrl' is required and must be a string",
        ));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({
                "success": false,
                "message": "Invalid request parameters",
                "error": "Parameter 'brokerUrl' is required and must be a string"
            })
        );

        let (status, body) = error_response(&RelayError::connection(
            "Connection to Solace broker failed",
            ErrorDetails::new().with_broker_url("ws://localhost:8008"),
        ));
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["message"], BROKER_UNAVAILABLE_MESSAGE);
        assert_eq!(body["details"]["brokerUrl"], "ws://localhost:8008");

        let (status, body) =
            error_response(&RelayError::message("Failed to send message: boom", ErrorDetails::new()));
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], SEND_FAILED_MESSAGE);
        assert_eq!(body["error"], "Failed to send message: boom");
    }
}
