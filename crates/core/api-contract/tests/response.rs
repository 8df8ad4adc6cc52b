use api_contract::{ErrorResponse, HealthResponse};

#[test]
fn error_response_has_single_field() {
    let value = serde_json::to_value(ErrorResponse::new("Device ID is required")).expect("serialize");
    assert_eq!(value["error"], "Device ID is required");
    assert_eq!(value.as_object().map(|o| o.len()), Some(1));
}

#[test]
fn health_response_fields() {
    let response = HealthResponse {
        status: "OK".to_string(),
        timestamp: "2026-01-01T00:00:00.000Z".to_string(),
        service: "homelab-iot-backend".to_string(),
    };
    let value = serde_json::to_value(response).expect("serialize");
    assert_eq!(value["status"], "OK");
    assert_eq!(value["service"], "homelab-iot-backend");
    assert!(value.get("timestamp").is_some());
}
