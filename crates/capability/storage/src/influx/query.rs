//! Flux 最新值查询与 CSV 结果解析

use super::InfluxConfig;
use crate::error::StorageError;
use crate::models::{FIELD_VALUE, LATEST_LOOKBACK_HOURS, SENSOR_MEASUREMENT, TAG_DEVICE_ID, TAG_SENSOR_TYPE};
use chrono::{DateTime, FixedOffset};
use domain::{LatestValues, SensorType};
use reqwest::header::{ACCEPT, AUTHORIZATION};
use std::collections::HashMap;

/// Flux 字符串字面量（转义 `\` 与 `"`）。
fn flux_string(value: &str) -> String {
    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for ch in value.chars() {
        if ch == '"' || ch == '\\' {
            quoted.push('\\');
        }
        quoted.push(ch);
    }
    quoted.push('"');
    quoted
}

/// 单设备最新值的 Flux 查询。
pub fn latest_values_flux(bucket: &str, device_id: &str) -> String {
    format!(
        "from(bucket: {bucket})\n  \
         |> range(start: -{hours}h)\n  \
         |> filter(fn: (r) => r._measurement == {measurement})\n  \
         |> filter(fn: (r) => r.{device_tag} == {device})\n  \
         |> filter(fn: (r) => r._field == {field})\n  \
         |> last()",
        bucket = flux_string(bucket),
        hours = LATEST_LOOKBACK_HOURS,
        measurement = flux_string(SENSOR_MEASUREMENT),
        device_tag = TAG_DEVICE_ID,
        device = flux_string(device_id),
        field = flux_string(FIELD_VALUE),
    )
}

pub(crate) async fn query_latest(
    client: &reqwest::Client,
    config: &InfluxConfig,
    device_id: &str,
) -> Result<LatestValues, StorageError> {
    let body = serde_json::json!({
        "query": latest_values_flux(&config.bucket, device_id),
        "type": "flux",
        "dialect": {
            "header": true,
            "annotations": [],
            "delimiter": ",",
        },
    });
    let response = client
        .post(config.endpoint("/api/v2/query"))
        .query(&[("org", config.org.as_str())])
        .header(AUTHORIZATION, config.authorization())
        .header(ACCEPT, "application/csv")
        .json(&body)
        .send()
        .await?;
    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(StorageError::new(format!(
            "influxdb query failed ({status}): {text}"
        )));
    }
    parse_latest_csv(&text)
}

enum Columns {
    Data {
        value: usize,
        sensor_type: usize,
        time: Option<usize>,
    },
    Error {
        message: usize,
    },
}

impl Columns {
    fn from_header(header: &csv::StringRecord) -> Option<Self> {
        let position = |name: &str| header.iter().position(|cell| cell == name);
        if let (Some(value), Some(sensor_type)) = (position("_value"), position(TAG_SENSOR_TYPE)) {
            return Some(Columns::Data {
                value,
                sensor_type,
                time: position("_time"),
            });
        }
        position("error").map(|message| Columns::Error { message })
    }
}

fn is_header(record: &csv::StringRecord) -> bool {
    record.iter().any(|cell| cell == "_value") || record.get(0) == Some("error")
}

/// 解析 Flux CSV 结果，按 `sensor_type` 取 `_time` 最新的一行。
///
/// 多张表之间可能以空行分隔并重复表头；内嵌的 `error` 表转换为错误。
pub fn parse_latest_csv(body: &str) -> Result<LatestValues, StorageError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(body.as_bytes());
    let mut columns: Option<Columns> = None;
    let mut newest: HashMap<SensorType, (Option<DateTime<FixedOffset>>, f64)> = HashMap::new();

    for record in reader.records() {
        let record = record?;
        if record.iter().all(|cell| cell.is_empty()) {
            continue;
        }
        if record.get(0).is_some_and(|cell| cell.starts_with('#')) {
            continue;
        }
        if is_header(&record) {
            columns = Columns::from_header(&record);
            continue;
        }
        match &columns {
            None => continue,
            Some(Columns::Error { message }) => {
                let message = record.get(*message).unwrap_or("unknown error");
                return Err(StorageError::new(format!("influxdb query error: {message}")));
            }
            Some(Columns::Data {
                value,
                sensor_type,
                time,
            }) => {
                let Some(sensor_type) = record.get(*sensor_type).and_then(SensorType::parse) else {
                    continue;
                };
                let Some(value) = record.get(*value).and_then(|cell| cell.parse::<f64>().ok())
                else {
                    continue;
                };
                let time = time
                    .and_then(|index| record.get(index))
                    .and_then(|cell| DateTime::parse_from_rfc3339(cell).ok());
                match newest.get(&sensor_type) {
                    Some((existing, _)) if time < *existing => {}
                    _ => {
                        newest.insert(sensor_type, (time, value));
                    }
                }
            }
        }
    }

    let mut latest = LatestValues::default();
    for (sensor_type, (_, value)) in newest {
        latest.set(sensor_type, value);
    }
    Ok(latest)
}
