/// Broker 投递的原始报文。
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub received_at_ms: i64,
}

impl RawMessage {
    /// 以当前时间作为接收时间构造报文。
    pub fn new(topic: impl Into<String>, payload: impl Into<Vec<u8>>) -> Self {
        Self {
            topic: topic.into(),
            payload: payload.into(),
            received_at_ms: now_epoch_ms(),
        }
    }
}

/// 解码后的 payload。
///
/// - `Number`：裸 JSON 数值（唯一可入库的形态）
/// - `Text`：非 JSON 文本，或 JSON 字符串
/// - `Structured`：其余 JSON（对象、数组、布尔、null）
#[derive(Debug, Clone, PartialEq)]
pub enum DecodedPayload {
    Number(f64),
    Text(String),
    Structured(serde_json::Value),
}

impl DecodedPayload {
    /// 日志用的形态名称。
    pub fn kind(&self) -> &'static str {
        match self {
            DecodedPayload::Number(_) => "number",
            DecodedPayload::Text(_) => "text",
            DecodedPayload::Structured(_) => "structured",
        }
    }

    pub fn as_number(&self) -> Option<f64> {
        match self {
            DecodedPayload::Number(value) => Some(*value),
            _ => None,
        }
    }
}

/// 获取当前 Unix 时间戳（毫秒）
pub fn now_epoch_ms() -> i64 {
    let now = std::time::SystemTime::now();
    let duration = now
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    duration.as_millis() as i64
}
