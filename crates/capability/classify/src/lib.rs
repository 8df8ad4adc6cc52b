//! 报文解码与分类。
//!
//! topic 约定：`<任意>/<device_id>/<sensor_type>[/...]`，按 `/` 切分后
//! 第 2、3 段有意义。只有裸数值 payload 且传感器类型为
//! temperature/humidity 的报文才会产生读数，其余一律静默丢弃。

use domain::{DecodedPayload, SensorReading, SensorType};
use serde_json::Value;

/// payload 解码错误。
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("payload is not valid utf-8: {0}")]
    InvalidUtf8(#[from] std::str::Utf8Error),
}

/// 分类时识别的 topic 段下标。
const DEVICE_SEGMENT: usize = 1;
const SENSOR_SEGMENT: usize = 2;
const MIN_SEGMENTS: usize = 3;

/// 解码 payload：先按 UTF-8 取文本，再尝试 JSON。
///
/// JSON 解析失败不是错误，直接以原文本作为 `Text` 返回；
/// 只有非 UTF-8 字节会返回 [`DecodeError`]。
pub fn decode_payload(payload: &[u8]) -> Result<DecodedPayload, DecodeError> {
    let text = std::str::from_utf8(payload)?;
    let decoded = match serde_json::from_str::<Value>(text) {
        Ok(Value::Number(number)) => match number.as_f64() {
            Some(value) => DecodedPayload::Number(value),
            None => DecodedPayload::Text(text.to_string()),
        },
        Ok(Value::String(value)) => DecodedPayload::Text(value),
        Ok(other) => DecodedPayload::Structured(other),
        Err(_) => DecodedPayload::Text(text.to_string()),
    };
    Ok(decoded)
}

/// topic + 解码后的 payload -> 可入库读数（无副作用、可重复调用）。
pub fn classify(topic: &str, payload: &DecodedPayload) -> Option<SensorReading> {
    let value = payload.as_number()?;
    if !value.is_finite() {
        return None;
    }
    let segments: Vec<&str> = topic.split('/').collect();
    if segments.len() < MIN_SEGMENTS {
        return None;
    }
    let device_id = segments[DEVICE_SEGMENT];
    if device_id.is_empty() {
        return None;
    }
    let sensor_type = SensorType::parse(segments[SENSOR_SEGMENT])?;
    Some(SensorReading::new(device_id, sensor_type, value))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_number() {
        let payload = decode_payload(b"22.5").expect("decode");
        assert_eq!(payload, DecodedPayload::Number(22.5));
    }

    #[test]
    fn decode_integer_as_number() {
        let payload = decode_payload(b" 48 ").expect("decode");
        assert_eq!(payload, DecodedPayload::Number(48.0));
    }

    #[test]
    fn decode_json_string_as_text() {
        let payload = decode_payload(br#""wet""#).expect("decode");
        assert_eq!(payload, DecodedPayload::Text("wet".to_string()));
    }

    #[test]
    fn decode_plain_text_falls_back() {
        let payload = decode_payload(b"online").expect("decode");
        assert_eq!(payload, DecodedPayload::Text("online".to_string()));
    }

    #[test]
    fn decode_truncated_json_falls_back() {
        let payload = decode_payload(br#"{"temperature": 2"#).expect("decode");
        assert_eq!(payload.kind(), "text");
    }

    #[test]
    fn decode_object_is_structured() {
        let payload = decode_payload(br#"{"temperature": 21.5}"#).expect("decode");
        match payload {
            DecodedPayload::Structured(value) => assert_eq!(value["temperature"], 21.5),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn decode_bool_and_null_are_structured() {
        assert_eq!(decode_payload(b"true").expect("decode").kind(), "structured");
        assert_eq!(decode_payload(b"null").expect("decode").kind(), "structured");
    }

    #[test]
    fn decode_rejects_invalid_utf8() {
        let err = decode_payload(&[0xff, 0xfe, 0x32]).expect_err("invalid utf8");
        assert!(err.to_string().contains("utf-8"));
    }

    #[test]
    fn classify_requires_three_segments() {
        let payload = DecodedPayload::Number(1.0);
        assert!(classify("esp32-001/temperature", &payload).is_none());
        assert!(classify("temperature", &payload).is_none());
        assert!(classify("", &payload).is_none());
    }

    #[test]
    fn classify_rejects_empty_device_segment() {
        let payload = DecodedPayload::Number(1.0);
        assert!(classify("sensors//temperature", &payload).is_none());
    }

    #[test]
    fn classify_accepts_leading_slash_topic() {
        let payload = DecodedPayload::Number(20.0);
        let reading = classify("/esp32-009/temperature", &payload).expect("reading");
        assert_eq!(reading.device_id, "esp32-009");
    }
}
