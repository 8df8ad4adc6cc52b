//! InfluxDB v2 存储实现
//!
//! - 写入：line protocol，经 [`WriteBuffer`] 批量 `POST /api/v2/write`
//! - 查询：Flux，`POST /api/v2/query`，解析 CSV 结果
//!
//! 一个 `InfluxStore` 持有一个长连接 HTTP 客户端，写入和查询共用。

mod query;
mod write;

pub use query::{latest_values_flux, parse_latest_csv};
pub use write::InfluxWriter;

use crate::buffer::{WriteBuffer, WriteBufferConfig};
use crate::error::StorageError;
use crate::models::{WritePoint, default_tags};
use crate::traits::TimeSeriesStore;
use domain::LatestValues;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

/// InfluxDB 连接配置。
#[derive(Debug, Clone)]
pub struct InfluxConfig {
    pub url: String,
    pub token: String,
    pub org: String,
    pub bucket: String,
    /// 所有点默认附带的 tag（点自身同名 tag 优先）。
    pub default_tags: BTreeMap<String, String>,
    pub request_timeout: Duration,
}

impl InfluxConfig {
    pub fn new(
        url: impl Into<String>,
        token: impl Into<String>,
        org: impl Into<String>,
        bucket: impl Into<String>,
    ) -> Self {
        Self {
            url: url.into(),
            token: token.into(),
            org: org.into(),
            bucket: bucket.into(),
            default_tags: default_tags(),
            request_timeout: Duration::from_secs(10),
        }
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!("{}{}", self.url.trim_end_matches('/'), path)
    }

    pub(crate) fn authorization(&self) -> String {
        format!("Token {}", self.token)
    }
}

/// InfluxDB 时序存储客户端
pub struct InfluxStore {
    config: Arc<InfluxConfig>,
    client: reqwest::Client,
    buffer: WriteBuffer,
}

impl InfluxStore {
    /// 建立客户端并启动定时刷盘任务（需在 tokio 运行时内调用）。
    pub fn connect(config: InfluxConfig, buffer_config: WriteBufferConfig) -> Result<Self, StorageError> {
        let config = Arc::new(config);
        let client = crate::connection::http_client(config.request_timeout)?;
        let writer = InfluxWriter::new(client.clone(), config.clone());
        let buffer = WriteBuffer::new(Arc::new(writer), buffer_config);
        buffer.spawn_flusher();
        Ok(Self {
            config,
            client,
            buffer,
        })
    }

    pub fn config(&self) -> &InfluxConfig {
        &self.config
    }

    /// 写缓冲中尚未刷出的点数。
    pub async fn pending(&self) -> usize {
        self.buffer.len().await
    }
}

#[async_trait::async_trait]
impl TimeSeriesStore for InfluxStore {
    async fn write_point(&self, point: WritePoint) -> Result<(), StorageError> {
        point.validate()?;
        self.buffer.push(point).await
    }

    async fn flush(&self) -> Result<usize, StorageError> {
        self.buffer.flush().await
    }

    async fn close(&self) -> Result<(), StorageError> {
        self.buffer.close().await.map(|_| ())
    }

    async fn query_latest(&self, device_id: &str) -> Result<LatestValues, StorageError> {
        query::query_latest(&self.client, &self.config, device_id).await
    }
}
