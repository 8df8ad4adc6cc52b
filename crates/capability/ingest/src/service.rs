//! MQTT 采集服务
//!
//! 一个 `IngestService` 持有一条 Broker 连接。事件循环在独立任务中运行，
//! 报文在该任务内同步走完 解码 → 分类 → 写缓冲，没有额外队列。

use crate::dispatch::{ConnectionEvent, ConnectionState, Dispatcher};
use crate::source::{MqttSourceConfig, new_client_id};
use crate::MessageHandler;
use domain::RawMessage;
use rumqttc::{AsyncClient, Event, EventLoop, Outgoing, Packet, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

const REQUEST_CHANNEL_CAPACITY: usize = 64;

struct Session {
    client: AsyncClient,
    shutdown: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// MQTT 采集服务。
pub struct IngestService {
    config: MqttSourceConfig,
    handler: Arc<dyn MessageHandler>,
    state: Arc<watch::Sender<ConnectionState>>,
    session: Mutex<Option<Session>>,
}

impl IngestService {
    pub fn new(config: MqttSourceConfig, handler: Arc<dyn MessageHandler>) -> Self {
        let (state, _) = watch::channel(ConnectionState::Disconnected);
        Self {
            config,
            handler,
            state: Arc::new(state),
            session: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &MqttSourceConfig {
        &self.config
    }

    /// 当前连接状态。
    pub fn state(&self) -> ConnectionState {
        *self.state.borrow()
    }

    /// 订阅连接状态变化。
    pub fn watch_state(&self) -> watch::Receiver<ConnectionState> {
        self.state.subscribe()
    }

    /// 建立连接并启动事件循环；连接确认后订阅通配 topic。
    ///
    /// 已连接时直接返回。连接失败只记录日志，事件循环按固定间隔重连。
    /// 需在 tokio 运行时内调用。
    pub async fn connect(&self) {
        let mut session = self.session.lock().await;
        if session.is_some() {
            return;
        }
        let client_id = new_client_id(&self.config.client_id_prefix);
        let (client, eventloop) = AsyncClient::new(
            self.config.mqtt_options(client_id.clone()),
            REQUEST_CHANNEL_CAPACITY,
        );
        self.state.send_replace(ConnectionState::Connecting);
        info!(
            target: "iot.ingest",
            host = %self.config.host,
            port = self.config.port,
            client_id = %client_id,
            topic = %self.config.topic,
            "mqtt_connecting"
        );

        let dispatcher = Dispatcher::new(
            self.config.topic.clone(),
            Arc::new(client.clone()),
            self.handler.clone(),
            self.state.clone(),
        );
        let (shutdown, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(run_event_loop(
            eventloop,
            dispatcher,
            shutdown_rx,
            self.config.connect_timeout,
            self.config.reconnect_period,
        ));
        *session = Some(Session {
            client,
            shutdown,
            handle,
        });
    }

    /// 发布一条消息（QoS 0）。未连接或发送失败时记录日志并返回 false。
    pub async fn publish(&self, topic: &str, payload: impl Into<Vec<u8>>) -> bool {
        if self.state() != ConnectionState::Connected {
            warn!(target: "iot.ingest", topic = %topic, "mqtt_publish_not_connected");
            return false;
        }
        let client = {
            let session = self.session.lock().await;
            session.as_ref().map(|session| session.client.clone())
        };
        let Some(client) = client else {
            warn!(target: "iot.ingest", topic = %topic, "mqtt_publish_not_connected");
            return false;
        };
        match client
            .publish(topic, QoS::AtMostOnce, false, payload.into())
            .await
        {
            Ok(()) => true,
            Err(err) => {
                warn!(target: "iot.ingest", topic = %topic, error = %err, "mqtt_publish_failed");
                false
            }
        }
    }

    /// 断开连接并停止事件循环。可重复调用，未连接时直接返回。
    pub async fn disconnect(&self) {
        let Some(session) = self.session.lock().await.take() else {
            return;
        };
        let Session {
            client,
            shutdown,
            mut handle,
        } = session;

        let graceful = self.state() == ConnectionState::Connected && client.try_disconnect().is_ok();
        let finished = graceful
            && tokio::time::timeout(self.config.connect_timeout, &mut handle)
                .await
                .is_ok();
        if !finished {
            let _ = shutdown.send(true);
            if let Err(err) = handle.await {
                warn!(target: "iot.ingest", error = %err, "mqtt_event_loop_join_failed");
            }
        }
        self.state.send_replace(ConnectionState::Disconnected);
        info!(target: "iot.ingest", graceful, "mqtt_disconnected");
    }
}

async fn run_event_loop(
    mut eventloop: EventLoop,
    dispatcher: Dispatcher,
    mut shutdown: watch::Receiver<bool>,
    connect_timeout: Duration,
    reconnect_period: Duration,
) {
    loop {
        let awaiting_connack = matches!(
            dispatcher.state(),
            ConnectionState::Connecting | ConnectionState::Reconnecting
        );
        let limit = awaiting_connack.then_some(connect_timeout);
        let polled = tokio::select! {
            _ = shutdown.changed() => break,
            polled = poll_once(&mut eventloop, limit) => polled,
        };
        match polled {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                dispatcher
                    .dispatch(ConnectionEvent::Connected {
                        session_present: ack.session_present,
                    })
                    .await;
            }
            Ok(Event::Incoming(Packet::Publish(publish))) => {
                let message = RawMessage::new(publish.topic.clone(), publish.payload.to_vec());
                dispatcher
                    .dispatch(ConnectionEvent::MessageReceived(message))
                    .await;
            }
            Ok(Event::Incoming(Packet::Disconnect)) => {
                dispatcher.dispatch(ConnectionEvent::Closed).await;
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                dispatcher.dispatch(ConnectionEvent::Closed).await;
                break;
            }
            Ok(_) => {}
            Err(cause) => {
                dispatcher.dispatch(ConnectionEvent::Error(cause)).await;
                tokio::select! {
                    _ = shutdown.changed() => break,
                    _ = tokio::time::sleep(reconnect_period) => {}
                }
                dispatcher.dispatch(ConnectionEvent::Reconnecting).await;
            }
        }
    }
}

async fn poll_once(eventloop: &mut EventLoop, limit: Option<Duration>) -> Result<Event, String> {
    match limit {
        Some(limit) => match tokio::time::timeout(limit, eventloop.poll()).await {
            Ok(polled) => polled.map_err(|err| err.to_string()),
            Err(_) => Err(format!("connect timed out after {}ms", limit.as_millis())),
        },
        None => eventloop.poll().await.map_err(|err| err.to_string()),
    }
}
