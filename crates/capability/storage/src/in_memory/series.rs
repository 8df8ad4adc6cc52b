//! 时序存储内存实现
//!
//! 与 InfluxDB 实现共用写缓冲语义：写入的点只有在刷盘后才对
//! `query_latest` 可见。用于测试和无 InfluxDB 的本地演示。

use crate::buffer::{WriteBuffer, WriteBufferConfig};
use crate::error::StorageError;
use crate::models::{
    FIELD_VALUE, LATEST_LOOKBACK_HOURS, SENSOR_MEASUREMENT, TAG_DEVICE_ID, TAG_SENSOR_TYPE,
    WritePoint, default_tags,
};
use crate::traits::{BatchWriter, TimeSeriesStore};
use domain::{LatestValues, SensorType, now_epoch_ms};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, RwLock};

/// 已落库的点（时间戳已确定）。
#[derive(Debug, Clone)]
pub struct StoredPoint {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub point: WritePoint,
    pub timestamp_ms: i64,
}

struct MemoryWriter {
    points: RwLock<Vec<StoredPoint>>,
    default_tags: BTreeMap<String, String>,
}

#[async_trait::async_trait]
impl BatchWriter for MemoryWriter {
    async fn write_batch(&self, points: &[WritePoint]) -> Result<(), StorageError> {
        let now_ms = now_epoch_ms();
        let mut store = self
            .points
            .write()
            .map_err(|_| StorageError::new("lock failed"))?;
        store.extend(points.iter().map(|point| StoredPoint {
            measurement: point.measurement.clone(),
            tags: point.merged_tags(&self.default_tags),
            point: point.clone(),
            timestamp_ms: point.timestamp_ms.unwrap_or(now_ms),
        }));
        Ok(())
    }
}

/// 时序存储内存实现
pub struct InMemoryTimeSeriesStore {
    writer: Arc<MemoryWriter>,
    buffer: WriteBuffer,
}

impl InMemoryTimeSeriesStore {
    /// 创建新的内存存储（不启动定时刷盘，需显式 `flush`）
    pub fn new() -> Self {
        Self::with_config(WriteBufferConfig::default())
    }

    pub fn with_config(config: WriteBufferConfig) -> Self {
        let writer = Arc::new(MemoryWriter {
            points: RwLock::new(Vec::new()),
            default_tags: default_tags(),
        });
        let buffer = WriteBuffer::new(writer.clone(), config);
        Self { writer, buffer }
    }

    /// 启动定时刷盘任务
    pub fn spawn_flusher(&self) {
        self.buffer.spawn_flusher();
    }

    /// 已落库的点（用于测试）
    pub fn stored(&self) -> Vec<StoredPoint> {
        self.writer
            .points
            .read()
            .map(|points| points.clone())
            .unwrap_or_default()
    }

    /// 写缓冲中尚未刷出的点数
    pub async fn pending(&self) -> usize {
        self.buffer.len().await
    }
}

impl Default for InMemoryTimeSeriesStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl TimeSeriesStore for InMemoryTimeSeriesStore {
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
        let now_ms = now_epoch_ms();
        let window_start_ms = now_ms - LATEST_LOOKBACK_HOURS * 3600 * 1000;
        let points = self
            .writer
            .points
            .read()
            .map_err(|_| StorageError::new("lock failed"))?;
        let mut newest: HashMap<SensorType, (i64, f64)> = HashMap::new();
        for stored in points.iter() {
            if stored.measurement != SENSOR_MEASUREMENT
                || stored.timestamp_ms < window_start_ms
                || stored.timestamp_ms > now_ms
                || stored.tags.get(TAG_DEVICE_ID).map(String::as_str) != Some(device_id)
            {
                continue;
            }
            let Some(sensor_type) = stored
                .tags
                .get(TAG_SENSOR_TYPE)
                .and_then(|value| SensorType::parse(value))
            else {
                continue;
            };
            let Some(value) = stored
                .point
                .fields
                .get(FIELD_VALUE)
                .and_then(|value| value.as_f64())
            else {
                continue;
            };
            match newest.get(&sensor_type) {
                Some((ts, _)) if stored.timestamp_ms < *ts => {}
                _ => {
                    newest.insert(sensor_type, (stored.timestamp_ms, value));
                }
            }
        }

        let mut latest = LatestValues::default();
        for (sensor_type, (_, value)) in newest {
            latest.set(sensor_type, value);
        }
        Ok(latest)
    }
}
