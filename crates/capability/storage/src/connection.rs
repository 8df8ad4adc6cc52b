//! HTTP 连接管理
//!
//! 提供 InfluxDB 访问用的 HTTP 客户端：
//! - http_client：建立带超时与连接池的 reqwest 客户端
//!
//! 设计原则：
//! - 写入与查询共用一个长连接客户端
//! - 每个主机最多保留 8 个空闲连接

use crate::error::StorageError;
use std::time::Duration;

/// 建立 HTTP 客户端
///
/// # 参数
/// - `timeout`：单次请求超时（写入与查询共用）
pub fn http_client(timeout: Duration) -> Result<reqwest::Client, StorageError> {
    let client = reqwest::Client::builder()
        .timeout(timeout)
        .pool_max_idle_per_host(8)
        .build()?;
    Ok(client)
}
