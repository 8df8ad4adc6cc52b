//! 稳定的 DTO 与 API 响应契约。

use serde::Serialize;
use std::collections::BTreeMap;

/// 失败响应体：`{"error": "..."}`。
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}

/// 健康检查响应体。
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: String,
    pub service: String,
}

/// 根路径服务说明。
#[derive(Debug, Serialize)]
pub struct ServiceInfoResponse {
    pub message: String,
    pub version: String,
    pub endpoints: BTreeMap<String, String>,
}

/// 单设备最新传感器值；无读数的字段不输出。
#[derive(Debug, Default, Serialize)]
pub struct SensorValuesDto {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub humidity: Option<f64>,
}

/// GET /sensors/{deviceId}/latest 响应体。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LatestSensorResponse {
    pub device_id: String,
    pub data: SensorValuesDto,
    pub timestamp: String,
}

/// 采集指标快照。
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSnapshotDto {
    pub messages_received: u64,
    pub decode_failures: u64,
    pub readings_accepted: u64,
    pub readings_dropped: u64,
    pub points_buffered: u64,
    pub write_failures: u64,
    pub points_flushed: u64,
    pub flush_failures: u64,
    pub reconnects: u64,
}
