//! 连接事件分发
//!
//! 事件循环把底层 MQTT 事件翻译为 [`ConnectionEvent`]，在同一个任务里
//! 逐个交给 [`Dispatcher`]，处理器不会并发重入。

use crate::{IngestError, MessageHandler};
use domain::RawMessage;
use iot_telemetry::{record_message_received, record_reconnect};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

/// 连接状态。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

impl ConnectionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Reconnecting => "reconnecting",
        }
    }
}

/// 连接事件。
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// Broker 确认连接；`session_present` 为 true 时 Broker 保留了原有订阅。
    Connected { session_present: bool },
    MessageReceived(RawMessage),
    Error(String),
    Closed,
    Reconnecting,
}

/// 订阅动作（事件循环内调用，不得阻塞）。
pub trait Subscriber: Send + Sync {
    fn subscribe(&self, topic: &str) -> Result<(), IngestError>;
}

impl Subscriber for rumqttc::AsyncClient {
    fn subscribe(&self, topic: &str) -> Result<(), IngestError> {
        self.try_subscribe(topic, rumqttc::QoS::AtMostOnce)
            .map_err(|err| IngestError::Source(err.to_string()))
    }
}

/// 单连接事件分发器。
pub struct Dispatcher {
    topic: String,
    subscriber: Arc<dyn Subscriber>,
    handler: Arc<dyn MessageHandler>,
    state: Arc<watch::Sender<ConnectionState>>,
}

impl Dispatcher {
    pub fn new(
        topic: impl Into<String>,
        subscriber: Arc<dyn Subscriber>,
        handler: Arc<dyn MessageHandler>,
        state: Arc<watch::Sender<ConnectionState>>,
    ) -> Self {
        Self {
            topic: topic.into(),
            subscriber,
            handler,
            state,
        }
    }

    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    pub async fn dispatch(&self, event: ConnectionEvent) {
        match event {
            ConnectionEvent::Connected { session_present } => {
                self.state.send_replace(ConnectionState::Connected);
                info!(target: "iot.ingest", session_present, "mqtt_connected");
                if session_present {
                    debug!(target: "iot.ingest", topic = %self.topic, "mqtt_subscription_retained");
                    return;
                }
                match self.subscriber.subscribe(&self.topic) {
                    Ok(()) => info!(target: "iot.ingest", topic = %self.topic, "mqtt_subscribed"),
                    Err(err) => {
                        warn!(target: "iot.ingest", topic = %self.topic, error = %err, "mqtt_subscribe_failed")
                    }
                }
            }
            ConnectionEvent::MessageReceived(message) => {
                record_message_received();
                let topic = message.topic.clone();
                if let Err(err) = self.handler.handle(message).await {
                    warn!(target: "iot.ingest", topic = %topic, error = %err, "message_handler_failed");
                }
            }
            ConnectionEvent::Error(cause) => {
                warn!(target: "iot.ingest", error = %cause, "mqtt_connection_error");
                self.state.send_if_modified(|state| {
                    if *state == ConnectionState::Connected {
                        *state = ConnectionState::Disconnected;
                        true
                    } else {
                        false
                    }
                });
            }
            ConnectionEvent::Closed => {
                info!(target: "iot.ingest", "mqtt_connection_closed");
                self.state.send_replace(ConnectionState::Disconnected);
            }
            ConnectionEvent::Reconnecting => {
                record_reconnect();
                info!(target: "iot.ingest", "mqtt_reconnecting");
                self.state.send_replace(ConnectionState::Reconnecting);
            }
        }
    }
}
