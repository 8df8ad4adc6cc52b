//! InfluxDB 批量写入

use super::InfluxConfig;
use crate::error::StorageError;
use crate::models::WritePoint;
use crate::traits::BatchWriter;
use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use std::sync::Arc;
use tracing::debug;

/// line protocol 批量写入器（`precision=ns`）。
pub struct InfluxWriter {
    client: reqwest::Client,
    config: Arc<InfluxConfig>,
}

impl InfluxWriter {
    pub fn new(client: reqwest::Client, config: Arc<InfluxConfig>) -> Self {
        Self { client, config }
    }
}

#[async_trait::async_trait]
impl BatchWriter for InfluxWriter {
    async fn write_batch(&self, points: &[WritePoint]) -> Result<(), StorageError> {
        if points.is_empty() {
            return Ok(());
        }
        let body = points
            .iter()
            .map(|point| point.to_line_protocol(&self.config.default_tags))
            .collect::<Vec<_>>()
            .join("\n");
        let response = self
            .client
            .post(self.config.endpoint("/api/v2/write"))
            .query(&[
                ("org", self.config.org.as_str()),
                ("bucket", self.config.bucket.as_str()),
                ("precision", "ns"),
            ])
            .header(AUTHORIZATION, self.config.authorization())
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body)
            .send()
            .await?;
        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            let message = format!("influxdb write failed ({status}): {detail}");
            // 4xx（429 除外）表示这批数据本身被拒绝，重发无意义
            if status.is_client_error() && status != StatusCode::TOO_MANY_REQUESTS {
                return Err(StorageError::permanent(message));
            }
            return Err(StorageError::new(message));
        }
        debug!(target: "iot.storage", points = points.len(), "influx_batch_written");
        Ok(())
    }
}
