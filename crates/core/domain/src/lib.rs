pub mod data;

pub use data::{DecodedPayload, RawMessage, now_epoch_ms};

/// 支持入库的传感器类型。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SensorType {
    Temperature,
    Humidity,
}

impl SensorType {
    pub const ALL: [SensorType; 2] = [SensorType::Temperature, SensorType::Humidity];

    /// topic 段与存储 tag 中使用的名称。
    pub fn as_str(&self) -> &'static str {
        match self {
            SensorType::Temperature => "temperature",
            SensorType::Humidity => "humidity",
        }
    }

    /// 精确匹配（区分大小写），未知类型返回 None。
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "temperature" => Some(SensorType::Temperature),
            "humidity" => Some(SensorType::Humidity),
            _ => None,
        }
    }
}

impl std::fmt::Display for SensorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 分类通过、待写入时序库的传感器读数。
#[derive(Debug, Clone, PartialEq)]
pub struct SensorReading {
    pub device_id: String,
    pub sensor_type: SensorType,
    pub value: f64,
    /// 显式时间戳（毫秒）；为空时由存储端取写入时刻。
    pub timestamp_ms: Option<i64>,
}

impl SensorReading {
    pub fn new(device_id: impl Into<String>, sensor_type: SensorType, value: f64) -> Self {
        Self {
            device_id: device_id.into(),
            sensor_type,
            value,
            timestamp_ms: None,
        }
    }

    /// 指定读数时间戳（毫秒）。
    pub fn observed_at(mut self, timestamp_ms: i64) -> Self {
        self.timestamp_ms = Some(timestamp_ms);
        self
    }
}

/// 单设备最新值聚合；窗口内无读数的字段为空。
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LatestValues {
    pub temperature: Option<f64>,
    pub humidity: Option<f64>,
}

impl LatestValues {
    pub fn set(&mut self, sensor_type: SensorType, value: f64) {
        match sensor_type {
            SensorType::Temperature => self.temperature = Some(value),
            SensorType::Humidity => self.humidity = Some(value),
        }
    }

    pub fn get(&self, sensor_type: SensorType) -> Option<f64> {
        match sensor_type {
            SensorType::Temperature => self.temperature,
            SensorType::Humidity => self.humidity,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.temperature.is_none() && self.humidity.is_none()
    }
}
