//! 采集链路装配模块
//!
//! 把 MQTT 报文接到 解码 → 分类 → 缓冲写入。处理器内部的任何失败都只记录
//! 日志并返回 `Ok(())`，保证订阅不受畸形报文影响。

use domain::{DecodedPayload, RawMessage};
use iot_classify::{classify, decode_payload};
use iot_config::AppConfig;
use iot_ingest::{IngestError, IngestService, MessageHandler, MqttSourceConfig};
use iot_storage::{TimeSeriesStore, WritePoint};
use iot_telemetry::{
    MessageLog, record_decode_failure, record_point_buffered, record_reading_accepted,
    record_reading_dropped, record_write_failure,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// 传感器读数处理器
///
/// 由事件循环逐条调用，只向写缓冲追加，不等待持久化。
pub struct ReadingHandler {
    store: Arc<dyn TimeSeriesStore>,
    message_log: Arc<MessageLog>,
}

impl ReadingHandler {
    pub fn new(store: Arc<dyn TimeSeriesStore>, message_log: Arc<MessageLog>) -> Self {
        Self { store, message_log }
    }
}

#[async_trait::async_trait]
impl MessageHandler for ReadingHandler {
    async fn handle(&self, message: RawMessage) -> Result<(), IngestError> {
        info!(
            target: "iot.ingest",
            topic = %message.topic,
            payload_size = message.payload.len(),
            received_at_ms = message.received_at_ms,
            "mqtt_message_received"
        );

        // 1. 解码：非 UTF-8 记录错误后丢弃
        let decoded = match decode_payload(&message.payload) {
            Ok(decoded) => decoded,
            Err(err) => {
                record_decode_failure();
                warn!(target: "iot.ingest", topic = %message.topic, error = %err, "payload_decode_failed");
                self.message_log.error(
                    format!("Failed to decode payload on topic {}", message.topic),
                    Some(&err),
                );
                return Ok(());
            }
        };
        self.message_log.info(format!(
            "Message received - topic: {}, payload: {}",
            message.topic,
            String::from_utf8_lossy(&message.payload)
        ));
        if let DecodedPayload::Structured(value) = &decoded {
            self.message_log
                .json(&format!("Payload on {}", message.topic), value);
        }

        // 2. 分类：不可入库的报文静默丢弃
        let Some(reading) = classify(&message.topic, &decoded) else {
            record_reading_dropped();
            debug!(
                target: "iot.ingest",
                topic = %message.topic,
                payload_kind = decoded.kind(),
                "message_not_classified"
            );
            return Ok(());
        };
        let reading = reading.observed_at(message.received_at_ms);
        record_reading_accepted();

        // 3. 写缓冲：失败只记录，不重试
        match self.store.write_point(WritePoint::from_reading(&reading)).await {
            Ok(()) => {
                record_point_buffered();
                info!(
                    target: "iot.ingest",
                    device_id = %reading.device_id,
                    sensor_type = %reading.sensor_type,
                    value = reading.value,
                    "reading_buffered"
                );
                self.message_log.debug(format!(
                    "Buffered {} = {} for device {}",
                    reading.sensor_type, reading.value, reading.device_id
                ));
            }
            Err(err) => {
                record_write_failure();
                warn!(
                    target: "iot.ingest",
                    device_id = %reading.device_id,
                    sensor_type = %reading.sensor_type,
                    error = %err,
                    "reading_write_failed"
                );
                self.message_log
                    .error(format!("Failed to write {} reading", reading.sensor_type), Some(&err));
            }
        }
        Ok(())
    }
}

/// 启动 MQTT 采集（`IOT_INGEST=off` 时返回 `None`）。
pub async fn start_ingest(
    config: &AppConfig,
    store: Arc<dyn TimeSeriesStore>,
    message_log: Arc<MessageLog>,
) -> Result<Option<Arc<IngestService>>, IngestError> {
    if !config.ingest_enabled {
        info!(target: "iot.ingest", "ingest disabled (IOT_INGEST=off)");
        return Ok(None);
    }
    let source = mqtt_source_config(config)?;
    message_log.info(format!(
        "Connecting to MQTT broker {}:{} (topic {})",
        source.host, source.port, source.topic
    ));
    let handler = Arc::new(ReadingHandler::new(store, message_log));
    let service = Arc::new(IngestService::new(source, handler));
    service.connect().await;
    Ok(Some(service))
}

fn mqtt_source_config(config: &AppConfig) -> Result<MqttSourceConfig, IngestError> {
    let mut source = MqttSourceConfig::from_url(&config.mqtt_broker)?;
    source.username = config.mqtt_username.clone();
    source.password = config.mqtt_password.clone();
    source.topic = config.mqtt_topic.clone();
    source.client_id_prefix = config.mqtt_client_id_prefix.clone();
    source.connect_timeout = config.mqtt_connect_timeout();
    source.reconnect_period = config.mqtt_reconnect_period();
    source.keep_alive = Duration::from_secs(config.mqtt_keep_alive_seconds);
    Ok(source)
}

#[cfg(test)]
mod tests {
    use super::*;
    use iot_storage::InMemoryTimeSeriesStore;

    fn handler(store: Arc<InMemoryTimeSeriesStore>) -> (ReadingHandler, tempfile::TempDir) {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = Arc::new(MessageLog::open(dir.path()).expect("open log"));
        (ReadingHandler::new(store, log), dir)
    }

    async fn deliver(handler: &ReadingHandler, topic: &str, payload: &[u8]) {
        handler
            .handle(RawMessage::new(topic, payload.to_vec()))
            .await
            .expect("handler never fails");
    }

    #[tokio::test]
    async fn numeric_temperature_is_stored() {
        let store = Arc::new(InMemoryTimeSeriesStore::new());
        let (handler, _dir) = handler(store.clone());
        deliver(&handler, "sensors/esp32-001/temperature", b"22.5").await;
        store.flush().await.expect("flush");

        let stored = store.stored();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].measurement, "sensor_readings");
        assert_eq!(stored[0].tags.get("device_id").map(String::as_str), Some("esp32-001"));
        assert_eq!(stored[0].tags.get("sensor_type").map(String::as_str), Some("temperature"));

        let latest = store.query_latest("esp32-001").await.expect("query");
        assert_eq!(latest.temperature, Some(22.5));
        assert_eq!(latest.humidity, None);
    }

    #[tokio::test]
    async fn unsupported_or_non_numeric_messages_are_dropped() {
        let store = Arc::new(InMemoryTimeSeriesStore::new());
        let (handler, _dir) = handler(store.clone());
        deliver(&handler, "sensors/esp32-001/pressure", b"101.3").await;
        deliver(&handler, "sensors/esp32-001/humidity", b"\"wet\"").await;
        deliver(&handler, "sensors/esp32-001/humidity", b"{\"value\": 40}").await;
        deliver(&handler, "esp32-001/temperature", b"21").await;
        deliver(&handler, "sensors/esp32-001/temperature", &[0xff, 0xfe, 0x00]).await;

        assert_eq!(store.pending().await, 0);
        store.flush().await.expect("flush");
        assert!(store.query_latest("esp32-001").await.expect("query").is_empty());
    }

    #[tokio::test]
    async fn reading_keeps_receive_time() {
        let store = Arc::new(InMemoryTimeSeriesStore::new());
        let (handler, _dir) = handler(store.clone());
        let mut message = RawMessage::new("home/esp32-002/humidity", b"48".to_vec());
        message.received_at_ms = 1_700_000_000_000;
        handler.handle(message).await.expect("handle");
        store.flush().await.expect("flush");
        assert_eq!(store.stored()[0].timestamp_ms, 1_700_000_000_000);
    }

    #[tokio::test]
    async fn write_rejection_is_swallowed() {
        let store = Arc::new(InMemoryTimeSeriesStore::new());
        store.close().await.expect("close");
        let (handler, dir) = handler(store.clone());
        deliver(&handler, "sensors/esp32-001/temperature", b"22.5").await;
        assert!(store.stored().is_empty());

        let log_files: Vec<_> = std::fs::read_dir(dir.path()).expect("read dir").collect();
        assert_eq!(log_files.len(), 1);
    }
}
