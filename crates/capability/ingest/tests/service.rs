use async_trait::async_trait;
use domain::RawMessage;
use iot_ingest::{ConnectionState, IngestError, IngestService, MessageHandler, MqttSourceConfig};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;

struct ChannelHandler {
    tx: mpsc::UnboundedSender<RawMessage>,
}

#[async_trait]
impl MessageHandler for ChannelHandler {
    async fn handle(&self, message: RawMessage) -> Result<(), IngestError> {
        let _ = self.tx.send(message);
        Ok(())
    }
}

fn config(host: &str, port: u16) -> MqttSourceConfig {
    let mut config = MqttSourceConfig::from_url(&format!("mqtt://{host}:{port}")).expect("url");
    config.connect_timeout = Duration::from_millis(500);
    config.reconnect_period = Duration::from_millis(50);
    config
}

fn handler() -> (Arc<ChannelHandler>, mpsc::UnboundedReceiver<RawMessage>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (Arc::new(ChannelHandler { tx }), rx)
}

async fn read_packet(stream: &mut TcpStream) -> std::io::Result<Option<(u8, Vec<u8>)>> {
    let mut header = [0u8; 1];
    if stream.read(&mut header).await? == 0 {
        return Ok(None);
    }
    let mut remaining = 0usize;
    let mut shift = 0;
    loop {
        let mut byte = [0u8; 1];
        stream.read_exact(&mut byte).await?;
        remaining |= ((byte[0] & 0x7f) as usize) << shift;
        if byte[0] & 0x80 == 0 {
            break;
        }
        shift += 7;
    }
    let mut body = vec![0u8; remaining];
    stream.read_exact(&mut body).await?;
    Ok(Some((header[0], body)))
}

fn publish_packet(topic: &str, payload: &[u8]) -> Vec<u8> {
    let mut packet = vec![0x30, (2 + topic.len() + payload.len()) as u8];
    packet.extend_from_slice(&(topic.len() as u16).to_be_bytes());
    packet.extend_from_slice(topic.as_bytes());
    packet.extend_from_slice(payload);
    packet
}

/// 单连接假 Broker：应答 CONNECT/SUBSCRIBE/PINGREQ，订阅后推送一条报文。
async fn fake_broker(listener: TcpListener) -> (Vec<String>, bool) {
    let Ok((mut stream, _)) = listener.accept().await else {
        return (Vec::new(), false);
    };
    let mut subscriptions = Vec::new();
    let mut disconnected = false;
    while let Ok(Some((header, body))) = read_packet(&mut stream).await {
        match header >> 4 {
            1 => {
                let _ = stream.write_all(&[0x20, 0x02, 0x00, 0x00]).await;
            }
            8 => {
                let topic_len = u16::from_be_bytes([body[2], body[3]]) as usize;
                subscriptions.push(String::from_utf8_lossy(&body[4..4 + topic_len]).into_owned());
                let _ = stream.write_all(&[0x90, 0x03, body[0], body[1], 0x00]).await;
                let _ = stream
                    .write_all(&publish_packet("sensors/esp32-001/temperature", b"22.5"))
                    .await;
            }
            12 => {
                let _ = stream.write_all(&[0xD0, 0x00]).await;
            }
            14 => {
                disconnected = true;
                break;
            }
            _ => {}
        }
    }
    (subscriptions, disconnected)
}

#[tokio::test]
async fn disconnect_without_connect_is_noop() {
    let (handler, _rx) = handler();
    let service = IngestService::new(config("127.0.0.1", 1883), handler);
    assert_eq!(service.state(), ConnectionState::Disconnected);
    service.disconnect().await;
    service.disconnect().await;
    assert_eq!(service.state(), ConnectionState::Disconnected);
}

#[tokio::test]
async fn publish_while_disconnected_is_rejected() {
    let (handler, _rx) = handler();
    let service = IngestService::new(config("127.0.0.1", 1883), handler);
    assert!(!service.publish("sensors/esp32-001/cmd", "on").await);
}

#[tokio::test]
async fn unreachable_broker_keeps_retrying() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);

    let (handler, _rx) = handler();
    let service = IngestService::new(config("127.0.0.1", port), handler);
    let mut state = service.watch_state();
    service.connect().await;
    tokio::time::timeout(
        Duration::from_secs(5),
        state.wait_for(|state| *state == ConnectionState::Reconnecting),
    )
    .await
    .expect("reconnecting in time")
    .expect("state channel open");

    service.disconnect().await;
    assert_eq!(service.state(), ConnectionState::Disconnected);
    service.disconnect().await;
}

#[tokio::test]
async fn subscribes_and_delivers_messages() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let port = listener.local_addr().expect("addr").port();
    let broker = tokio::spawn(fake_broker(listener));

    let (handler, mut rx) = handler();
    let service = IngestService::new(config("127.0.0.1", port), handler);
    service.connect().await;
    service.connect().await;

    let message = tokio::time::timeout(Duration::from_secs(5), rx.recv())
        .await
        .expect("message in time")
        .expect("channel open");
    assert_eq!(message.topic, "sensors/esp32-001/temperature");
    assert_eq!(message.payload, b"22.5".to_vec());
    assert_eq!(service.state(), ConnectionState::Connected);

    service.disconnect().await;
    assert_eq!(service.state(), ConnectionState::Disconnected);

    let (subscriptions, disconnected) = tokio::time::timeout(Duration::from_secs(5), broker)
        .await
        .expect("broker finished")
        .expect("broker task");
    assert_eq!(subscriptions, vec!["#".to_string()]);
    assert!(disconnected);
}
