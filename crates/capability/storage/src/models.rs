//! 时序写入模型
//!
//! - [`WritePoint`]：measurement + tags + fields + 可选时间戳
//! - [`FieldValue`]：字段值（float / integer / boolean / string）
//! - 行协议（line protocol）编码

use crate::error::StorageError;
use domain::SensorReading;
use std::collections::BTreeMap;

/// 传感器读数使用的 measurement。
pub const SENSOR_MEASUREMENT: &str = "sensor_readings";
pub const TAG_DEVICE_ID: &str = "device_id";
pub const TAG_SENSOR_TYPE: &str = "sensor_type";
pub const FIELD_VALUE: &str = "value";

/// 所有点默认附带的服务 tag。
pub const SERVICE_TAG_KEY: &str = "service";
pub const SERVICE_TAG_VALUE: &str = "homelab-iot";

/// 最新值查询的回溯窗口（小时）。
pub const LATEST_LOOKBACK_HOURS: i64 = 24;

/// 默认 tag 集合（`service=homelab-iot`）。
pub fn default_tags() -> BTreeMap<String, String> {
    BTreeMap::from([(SERVICE_TAG_KEY.to_string(), SERVICE_TAG_VALUE.to_string())])
}

/// 字段值。
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Float(f64),
    Integer(i64),
    Boolean(bool),
    String(String),
}

impl FieldValue {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Float(v) => Some(*v),
            FieldValue::Integer(v) => Some(*v as f64),
            _ => None,
        }
    }

    fn encode(&self) -> String {
        match self {
            FieldValue::Float(v) => v.to_string(),
            FieldValue::Integer(v) => format!("{v}i"),
            FieldValue::Boolean(v) => v.to_string(),
            FieldValue::String(v) => format!("\"{}\"", escape(v, &['"', '\\'])),
        }
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

/// 写入时序库的点。
#[derive(Debug, Clone, PartialEq)]
pub struct WritePoint {
    pub measurement: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
    /// 毫秒时间戳；为空时由存储端取写入时刻。
    pub timestamp_ms: Option<i64>,
}

impl WritePoint {
    pub fn new(measurement: impl Into<String>) -> Self {
        Self {
            measurement: measurement.into(),
            tags: BTreeMap::new(),
            fields: BTreeMap::new(),
            timestamp_ms: None,
        }
    }

    pub fn tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn timestamp_ms(mut self, timestamp_ms: i64) -> Self {
        self.timestamp_ms = Some(timestamp_ms);
        self
    }

    /// 传感器读数 -> `sensor_readings{device_id, sensor_type} value=<f64>`。
    pub fn from_reading(reading: &SensorReading) -> Self {
        let point = WritePoint::new(SENSOR_MEASUREMENT)
            .tag(TAG_DEVICE_ID, reading.device_id.clone())
            .tag(TAG_SENSOR_TYPE, reading.sensor_type.as_str())
            .field(FIELD_VALUE, reading.value);
        match reading.timestamp_ms {
            Some(ts) => point.timestamp_ms(ts),
            None => point,
        }
    }

    /// 写入前校验：measurement 非空、至少一个字段、浮点值有限，
    /// 且名称与 tag 值可安全编码为单行 line protocol。
    pub fn validate(&self) -> Result<(), StorageError> {
        if self.measurement.is_empty() {
            return Err(StorageError::new("point has no measurement"));
        }
        if self.fields.is_empty() {
            return Err(StorageError::new("point has no fields"));
        }
        check_identifier("measurement", &self.measurement)?;
        for (key, value) in &self.tags {
            check_identifier("tag key", key)?;
            check_identifier("tag value", value)?;
        }
        for (key, value) in &self.fields {
            check_identifier("field key", key)?;
            if let FieldValue::Float(v) = value {
                if !v.is_finite() {
                    return Err(StorageError::new(format!("field {key} is not finite")));
                }
            }
        }
        Ok(())
    }

    /// 合并默认 tag（点自身的 tag 优先）。
    pub fn merged_tags(&self, default_tags: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut tags = default_tags.clone();
        tags.extend(self.tags.iter().map(|(k, v)| (k.clone(), v.clone())));
        tags
    }

    /// 编码为一行 line protocol（纳秒精度）；空值 tag 不输出。
    pub fn to_line_protocol(&self, default_tags: &BTreeMap<String, String>) -> String {
        let mut line = escape(&self.measurement, &[',', ' ']);
        for (key, value) in self.merged_tags(default_tags) {
            if value.is_empty() {
                continue;
            }
            line.push(',');
            line.push_str(&escape(&key, &[',', '=', ' ']));
            line.push('=');
            line.push_str(&escape(&value, &[',', '=', ' ']));
        }
        let fields = self
            .fields
            .iter()
            .map(|(key, value)| format!("{}={}", escape(key, &[',', '=', ' ']), value.encode()))
            .collect::<Vec<_>>()
            .join(",");
        line.push(' ');
        line.push_str(&fields);
        if let Some(ns) = self.timestamp_ms.and_then(|ms| ms.checked_mul(1_000_000)) {
            line.push(' ');
            line.push_str(&ns.to_string());
        }
        line
    }
}

/// 换行会把一个点拆成两行；结尾的 `\` 会转义紧随其后的分隔符。
fn check_identifier(kind: &str, value: &str) -> Result<(), StorageError> {
    if value.contains(['\n', '\r']) || value.ends_with('\\') {
        return Err(StorageError::new(format!(
            "{kind} {value:?} cannot be encoded as line protocol"
        )));
    }
    Ok(())
}

fn escape(value: &str, special: &[char]) -> String {
    let mut escaped = String::with_capacity(value.len());
    for ch in value.chars() {
        if special.contains(&ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }
    escaped
}

#[cfg(test)]
mod tests {
    use super::*;
    use domain::SensorType;

    #[test]
    fn reading_line_protocol() {
        let reading =
            SensorReading::new("esp32-001", SensorType::Temperature, 22.5).observed_at(1_000);
        let line = WritePoint::from_reading(&reading).to_line_protocol(&default_tags());
        assert_eq!(
            line,
            "sensor_readings,device_id=esp32-001,sensor_type=temperature,service=homelab-iot value=22.5 1000000000"
        );
    }

    #[test]
    fn line_without_timestamp() {
        let point = WritePoint::new("m").field("value", 1.0);
        assert_eq!(point.to_line_protocol(&BTreeMap::new()), "m value=1");
    }

    #[test]
    fn special_characters_are_escaped() {
        let point = WritePoint::new("my measurement")
            .tag("room name", "living,room")
            .field("note", "say \"hi\" \\o/")
            .field("count", 3i64)
            .field("ok", true);
        assert_eq!(
            point.to_line_protocol(&BTreeMap::new()),
            r#"my\ measurement,room\ name=living\,room count=3i,note="say \"hi\" \\o/",ok=true"#
        );
    }

    #[test]
    fn point_tags_override_defaults_and_empty_tags_skipped() {
        let point = WritePoint::new("m")
            .tag("service", "other")
            .tag("zone", "")
            .field("value", 2.5);
        assert_eq!(
            point.to_line_protocol(&default_tags()),
            "m,service=other value=2.5"
        );
    }

    #[test]
    fn validate_rejects_empty_and_non_finite() {
        assert!(WritePoint::new("m").validate().is_err());
        assert!(WritePoint::new("").field("v", 1.0).validate().is_err());
        assert!(WritePoint::new("m").field("v", f64::NAN).validate().is_err());
        assert!(WritePoint::new("m").field("v", 1.0).validate().is_ok());
    }

    #[test]
    fn validate_rejects_device_ids_that_break_the_line() {
        for device_id in ["esp\n32", "esp\r32", "esp32\\"] {
            let reading = SensorReading::new(device_id, SensorType::Temperature, 22.5);
            let err = WritePoint::from_reading(&reading)
                .validate()
                .expect_err("unencodable tag value");
            assert!(err.to_string().contains("line protocol"));
        }
        assert!(WritePoint::new("m").tag("a\nb", "x").field("v", 1.0).validate().is_err());
        assert!(WritePoint::new("m").field("v\\", 1.0).validate().is_err());
        // 中间的反斜杠不影响分隔符
        let reading = SensorReading::new("esp\\32", SensorType::Humidity, 48.0);
        assert!(WritePoint::from_reading(&reading).validate().is_ok());
    }
}
