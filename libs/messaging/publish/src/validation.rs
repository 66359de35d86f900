//! Request shape validation
//!
//! Runs before any network activity. Reports one error at a time: the first
//! offending field in a fixed order decides the message.

use serde_json::{Map, Value};

use crate::error::RelayError;
use crate::request::{Payload, SendRequest};

/// Required string fields, in reporting order
pub const REQUIRED_STRING_PARAMS: [&str; 5] =
    ["brokerUrl", "vpnName", "username", "password", "destination"];

/// Validate canonical request parameters and produce a typed [`SendRequest`].
///
/// The canonical shape uses the keys in [`REQUIRED_STRING_PARAMS`] plus
/// `payload` and `isQueue`. Pure function, no I/O.
pub fn validate_send_params(params: &Value) -> Result<SendRequest, RelayError> {
    let object = params
        .as_object()
        .ok_or_else(|| RelayError::validation("Parameters must be provided as an object"))?;

    let [broker_url, vpn_name, username, password, destination] =
        REQUIRED_STRING_PARAMS.map(|name| required_string(object, name));
    let broker_url = broker_url?;
    let vpn_name = vpn_name?;
    let username = username?;
    let password = password?;
    let destination = destination?;

    let payload = match object.get("payload") {
        None | Some(Value::Null) => {
            return Err(RelayError::validation("Parameter 'payload' is required"))
        }
        Some(value) => Payload::from_value(value.clone()),
    };

    let is_queue = object.get("isQueue").and_then(Value::as_bool).ok_or_else(|| {
        RelayError::validation("Parameter 'isQueue' is required and must be a boolean")
    })?;

    Ok(SendRequest {
        broker_url,
        vpn_name,
        username,
        password,
        destination,
        payload,
        is_queue,
    })
}

fn required_string(object: &Map<String, Value>, name: &str) -> Result<String, RelayError> {
    match object.get(name) {
        Some(Value::String(value)) if !value.is_empty() => Ok(value.clone()),
        _ => Err(RelayError::validation(format!(
            "Parameter '{}' is required and must be a string",
            name
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn valid_params() -> Value {
        json!({
            "brokerUrl": "ws://localhost:8008",
            "vpnName": "default",
            "username": "admin",
            "password": "admin",
            "destination": "DEAL.IN",
            "payload": "hello",
            "isQueue": true
        })
    }

    fn message_of(params: &Value) -> String {
        validate_send_params(params).unwrap_err().to_string()
    }

    #[test]
    fn test_valid_params_produce_request() {
        let request = validate_send_params(&valid_params()).unwrap();
        assert_eq!(request.broker_url, "ws://localhost:8008");
        assert_eq!(request.vpn_name, "default");
        assert_eq!(request.username, "admin");
        assert_eq!(request.password, "admin");
        assert_eq!(request.destination, "DEAL.IN");
        assert_eq!(request.payload, Payload::Text("hello".to_string()));
        assert!(request.is_queue);
    }

    #[test]
    fn test_non_object_rejected() {
        for params in [json!(null), json!("text"), json!([1, 2]), json!(7)] {
            assert_eq!(message_of(&params), "Parameters must be provided as an object");
        }
    }

    #[test]
    fn test_each_missing_field_is_named() {
        for name in REQUIRED_STRING_PARAMS {
            let mut params = valid_params();
            params.as_object_mut().unwrap().remove(name);
            assert_eq!(
                message_of(&params),
                format!("Parameter '{}' is required and must be a string", name)
            );
        }
    }

    #[test]
    fn test_first_offending_field_wins() {
        let params = json!({
            "vpnName": "",
            "username": 5,
            "payload": null,
            "isQueue": "yes"
        });
        assert_eq!(
            message_of(&params),
            "Parameter 'brokerUrl' is required and must be a string"
        );

        let mut params = valid_params();
        params["password"] = json!("");
        params["destination"] = json!(null);
        assert_eq!(
            message_of(&params),
            "Parameter 'password' is required and must be a string"
        );
    }

    #[test]
    fn test_empty_and_non_string_values_rejected() {
        let mut params = valid_params();
        params["brokerUrl"] = json!("");
        assert_eq!(
            message_of(&params),
            "Parameter 'brokerUrl' is required and must be a string"
        );

        let mut params = valid_params();
        params["username"] = json!({"name": "admin"});
        assert_eq!(
            message_of(&params),
            "Parameter 'username' is required and must be a string"
        );
    }

    #[test]
    fn test_payload_required() {
        let mut params = valid_params();
        params.as_object_mut().unwrap().remove("payload");
        assert_eq!(message_of(&params), "Parameter 'payload' is required");

        params["payload"] = json!(null);
        assert_eq!(message_of(&params), "Parameter 'payload' is required");
    }

    #[test]
    fn test_falsy_payloads_accepted() {
        for payload in [json!(""), json!(0), json!(false), json!({})] {
            let mut params = valid_params();
            params["payload"] = payload;
            assert!(validate_send_params(&params).is_ok());
        }
    }

    #[test]
    fn test_is_queue_must_be_boolean() {
        for is_queue in [json!("true"), json!(1), json!(null)] {
            let mut params = valid_params();
            params["isQueue"] = is_queue;
            assert_eq!(
                message_of(&params),
                "Parameter 'isQueue' is required and must be a boolean"
            );
        }

        let mut params = valid_params();
        params.as_object_mut().unwrap().remove("isQueue");
        assert_eq!(
            message_of(&params),
            "Parameter 'isQueue' is required and must be a boolean"
        );
    }

    #[test]
    fn test_validation_is_repeatable() {
        let mut params = valid_params();
        params["isQueue"] = json!("true");
        let first = validate_send_params(&params).unwrap_err();
        let second = validate_send_params(&params).unwrap_err();
        assert_eq!(first, second);
        assert!(first.is_validation_error());
    }
}
