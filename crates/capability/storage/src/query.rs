//! 最新值查询服务
//!
//! 校验设备 ID 非空白后原样委托给 [`TimeSeriesStore::query_latest`]，结果原样返回。
//! 查询失败统一转换为 `FetchFailed`，不重试。

use crate::traits::TimeSeriesStore;
use domain::LatestValues;
use std::sync::Arc;

/// 查询错误。
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("device id is required")]
    MissingDeviceId,
    #[error("failed to fetch sensor data: {0}")]
    FetchFailed(String),
}

/// 读侧查询服务。
#[derive(Clone)]
pub struct QueryService {
    store: Arc<dyn TimeSeriesStore>,
}

impl QueryService {
    pub fn new(store: Arc<dyn TimeSeriesStore>) -> Self {
        Self { store }
    }

    pub async fn latest(&self, device_id: &str) -> Result<LatestValues, QueryError> {
        if device_id.trim().is_empty() {
            return Err(QueryError::MissingDeviceId);
        }
        self.store
            .query_latest(device_id)
            .await
            .map_err(|err| QueryError::FetchFailed(err.to_string()))
    }
}
