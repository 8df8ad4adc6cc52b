//! 传感器最新值查询
//!
//! - GET /sensors/{deviceId}/latest

use crate::AppState;
use crate::utils::now_iso;
use crate::utils::response::{bad_request_error, internal_error};
use api_contract::{LatestSensorResponse, SensorValuesDto};
use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use iot_storage::QueryError;
use tracing::warn;

#[derive(serde::Deserialize)]
pub struct DevicePath {
    pub(crate) device_id: String,
}

pub async fn get_latest_sensor_values(
    State(state): State<AppState>,
    Path(path): Path<DevicePath>,
) -> Response {
    let result = state.query.latest(&path.device_id).await;
    match result {
        Ok(values) => (
            StatusCode::OK,
            Json(LatestSensorResponse {
                device_id: path.device_id,
                data: SensorValuesDto {
                    temperature: values.temperature,
                    humidity: values.humidity,
                },
                timestamp: now_iso(),
            }),
        )
            .into_response(),
        Err(QueryError::MissingDeviceId) => bad_request_error("Device ID is required"),
        Err(QueryError::FetchFailed(message)) => {
            warn!(
                target: "iot.api",
                device_id = %path.device_id,
                error = %message,
                "sensor_query_failed"
            );
            internal_error("Failed to fetch sensor data")
        }
    }
}
