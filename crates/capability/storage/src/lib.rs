//! # IoT Storage 模块
//!
//! 本模块隔离与外部时序数据库的全部交互，对外只暴露两类操作：
//!
//! 1. **缓冲写入** (`write_point`)：点进入客户端写缓冲即视为接受，
//!    由定时任务（或达到批量阈值）批量刷出；不等待持久化。
//! 2. **最新值查询** (`query_latest`)：固定 24 小时回溯窗口内，
//!    按 `sensor_type` 取最后一个数值；查询错误向调用方传播。
//!
//! ## 模块说明
//!
//! - [`models`]：写入点模型与 line protocol 编码
//! - [`traits`]：`TimeSeriesStore` / `BatchWriter` 接口
//! - [`buffer`]：写缓冲（多写入方追加、定时排空、失败重试与回填）
//! - [`influx`]：InfluxDB v2 HTTP 实现（生产环境）
//! - [`in_memory`]：内存实现（测试与本地演示）
//! - [`query`]：读侧查询服务
//! - [`error`]：存储错误类型
//! - [`connection`]：HTTP 客户端构建
//!
//! ## 一致性
//!
//! 查询只读外部存储，看不到尚在写缓冲中的点；刷盘间隔即为可接受的
//! 可见性延迟。进程崩溃时缓冲中的点会丢失。
//!
//! ## 使用示例
//!
//! ```rust,ignore
//! use iot_storage::{InfluxConfig, InfluxStore, TimeSeriesStore, WriteBufferConfig, WritePoint};
//!
//! let store = InfluxStore::connect(
//!     InfluxConfig::new("http://localhost:8086", "token", "homelab", "iot_data"),
//!     WriteBufferConfig::default(),
//! )?;
//! store
//!     .write_point(WritePoint::new("sensor_readings").tag("device_id", "esp32-001").field("value", 22.5))
//!     .await?;
//! let latest = store.query_latest("esp32-001").await?;
//! store.close().await?;
//! ```

pub mod buffer;
pub mod connection;
pub mod error;
pub mod in_memory;
pub mod influx;
pub mod models;
pub mod query;
pub mod traits;

pub use buffer::{WriteBuffer, WriteBufferConfig};
pub use connection::*;
pub use error::*;
pub use in_memory::{InMemoryTimeSeriesStore, StoredPoint};
pub use influx::{InfluxConfig, InfluxStore, InfluxWriter};
pub use models::*;
pub use query::{QueryError, QueryService};
pub use traits::*;
