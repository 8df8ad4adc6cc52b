//! # IoT Ingest 模块
//!
//! 维护到 MQTT Broker 的单一订阅连接，把收到的每条报文交给
//! [`MessageHandler`]（解码、分类、写入由调用方装配）。
//!
//! - [`source`]：Broker 地址解析、客户端 ID、连接参数
//! - [`dispatch`]：连接事件分发（状态迁移、订阅、报文转交）
//! - [`service`]：连接生命周期（connect / publish / disconnect）
//!
//! 连接错误只记录日志，不向调用方抛出；断线后按固定间隔无限重连。

use async_trait::async_trait;
use domain::RawMessage;

pub mod dispatch;
pub mod service;
pub mod source;

pub use dispatch::{ConnectionEvent, ConnectionState, Dispatcher, Subscriber};
pub use service::IngestService;
pub use source::{MqttSourceConfig, new_client_id, parse_broker_url};

/// 采集错误。
#[derive(Debug, thiserror::Error)]
pub enum IngestError {
    #[error("invalid broker url: {0}")]
    InvalidBroker(String),
    #[error("handler error: {0}")]
    Handler(String),
    #[error("source error: {0}")]
    Source(String),
}

/// 原始报文处理器。
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, message: RawMessage) -> Result<(), IngestError>;
}
