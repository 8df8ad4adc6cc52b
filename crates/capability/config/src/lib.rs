//! 应用运行配置加载。

use std::env;
use std::time::Duration;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 应用运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub http_addr: String,
    pub mqtt_broker: String,
    pub mqtt_topic: String,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    pub mqtt_client_id_prefix: String,
    pub mqtt_connect_timeout_ms: u64,
    pub mqtt_reconnect_period_ms: u64,
    pub mqtt_keep_alive_seconds: u64,
    pub influx_url: String,
    pub influx_token: String,
    pub influx_org: String,
    pub influx_bucket: String,
    pub influx_flush_interval_ms: u64,
    pub influx_batch_size: usize,
    pub influx_max_buffer_points: usize,
    pub influx_max_retries: usize,
    pub influx_retry_backoff_ms: u64,
    pub log_dir: String,
    pub ingest_enabled: bool,
}

impl AppConfig {
    /// 从环境变量读取配置（全部带默认值）。
    pub fn from_env() -> Result<Self, ConfigError> {
        let http_addr = match read_optional("HTTP_ADDR") {
            Some(addr) => addr,
            None => format!("0.0.0.0:{}", read_u16_with_default("PORT", 3000)?),
        };
        let mqtt_broker = env::var("MQTT_BROKER")
            .unwrap_or_else(|_| "mqtt://mqtt-broker-local:1883".to_string());
        let mqtt_topic = env::var("MQTT_TOPIC").unwrap_or_else(|_| "#".to_string());
        let mqtt_username = read_optional("MQTT_USERNAME");
        let mqtt_password = read_optional("MQTT_PASSWORD");
        let mqtt_client_id_prefix =
            env::var("MQTT_CLIENT_ID_PREFIX").unwrap_or_else(|_| "homelab-api".to_string());
        let mqtt_connect_timeout_ms = read_u64_with_default("MQTT_CONNECT_TIMEOUT_MS", 4000)?;
        let mqtt_reconnect_period_ms = read_u64_with_default("MQTT_RECONNECT_PERIOD_MS", 1000)?;
        let mqtt_keep_alive_seconds = read_u64_with_default("MQTT_KEEP_ALIVE_SECONDS", 30)?;
        let influx_url =
            env::var("INFLUXDB_URL").unwrap_or_else(|_| "http://localhost:8086".to_string());
        let influx_token = env::var("INFLUXDB_TOKEN").unwrap_or_default();
        let influx_org = env::var("INFLUXDB_ORG").unwrap_or_else(|_| "homelab".to_string());
        let influx_bucket = env::var("INFLUXDB_BUCKET").unwrap_or_else(|_| "iot_data".to_string());
        let influx_flush_interval_ms = read_u64_with_default("INFLUXDB_FLUSH_INTERVAL_MS", 5000)?;
        let influx_batch_size = read_usize_with_default("INFLUXDB_BATCH_SIZE", 1000)?;
        let influx_max_buffer_points =
            read_usize_with_default("INFLUXDB_MAX_BUFFER_POINTS", 10_000)?;
        let influx_max_retries = read_usize_with_default("INFLUXDB_MAX_RETRIES", 3)?;
        let influx_retry_backoff_ms = read_u64_with_default("INFLUXDB_RETRY_BACKOFF_MS", 200)?;
        let log_dir = env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string());
        let ingest_enabled = read_bool_with_default("IOT_INGEST", true);

        Ok(Self {
            http_addr,
            mqtt_broker,
            mqtt_topic,
            mqtt_username,
            mqtt_password,
            mqtt_client_id_prefix,
            mqtt_connect_timeout_ms,
            mqtt_reconnect_period_ms,
            mqtt_keep_alive_seconds,
            influx_url,
            influx_token,
            influx_org,
            influx_bucket,
            influx_flush_interval_ms,
            influx_batch_size,
            influx_max_buffer_points,
            influx_max_retries,
            influx_retry_backoff_ms,
            log_dir,
            ingest_enabled,
        })
    }

    pub fn mqtt_connect_timeout(&self) -> Duration {
        Duration::from_millis(self.mqtt_connect_timeout_ms)
    }

    pub fn mqtt_reconnect_period(&self) -> Duration {
        Duration::from_millis(self.mqtt_reconnect_period_ms)
    }

    pub fn influx_flush_interval(&self) -> Duration {
        Duration::from_millis(self.influx_flush_interval_ms)
    }

    pub fn influx_retry_backoff(&self) -> Duration {
        Duration::from_millis(self.influx_retry_backoff_ms)
    }
}

fn read_u16_with_default(key: &str, default: u16) -> Result<u16, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u16>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u64_with_default(key: &str, default: u64) -> Result<u64, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u64>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_usize_with_default(key: &str, default: usize) -> Result<usize, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<usize>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

fn read_bool_with_default(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "on"),
        Err(_) => default,
    }
}
