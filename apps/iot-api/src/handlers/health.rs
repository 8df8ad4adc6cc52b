//! 服务说明与健康检查
//!
//! - GET /
//! - GET /health

use crate::utils::now_iso;
use api_contract::{HealthResponse, ServiceInfoResponse};
use axum::Json;
use std::collections::BTreeMap;

pub const SERVICE_NAME: &str = "homelab-iot-backend";

pub async fn service_info() -> Json<ServiceInfoResponse> {
    let endpoints = BTreeMap::from([
        ("health".to_string(), "/health".to_string()),
        ("metrics".to_string(), "/metrics".to_string()),
        ("sensors".to_string(), "/sensors/:deviceId/latest".to_string()),
    ]);
    Json(ServiceInfoResponse {
        message: "Homelab IoT API".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        endpoints,
    })
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "OK".to_string(),
        timestamp: now_iso(),
        service: SERVICE_NAME.to_string(),
    })
}
