//! 存储接口 Trait 定义
//!
//! - TimeSeriesStore：时序存储客户端（缓冲写入 + 最新值查询）
//! - BatchWriter：写缓冲刷盘时的批量写入目标
//!
//! 设计原则：
//! - 写入只保证进入缓冲，不等待持久化
//! - 查询同步返回，错误向调用方传播
//! - 使用 async_trait 支持动态分发

use crate::error::StorageError;
use crate::models::WritePoint;
use async_trait::async_trait;
use domain::LatestValues;

/// 时序存储客户端接口
#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    /// 追加一个点到写缓冲；缓冲接受即返回。
    async fn write_point(&self, point: WritePoint) -> Result<(), StorageError>;

    /// 立即刷盘，返回写出的点数。
    async fn flush(&self) -> Result<usize, StorageError>;

    /// 刷出剩余的点并释放写会话；之后的写入被拒绝。
    async fn close(&self) -> Result<(), StorageError>;

    /// 回溯窗口内每种传感器的最后一个值。
    async fn query_latest(&self, device_id: &str) -> Result<LatestValues, StorageError>;
}

/// 批量写入目标
#[async_trait]
pub trait BatchWriter: Send + Sync {
    async fn write_batch(&self, points: &[WritePoint]) -> Result<(), StorageError>;
}
