//! 工具模块

pub mod response;

use chrono::{SecondsFormat, Utc};

/// 当前 UTC 时间（ISO 8601，毫秒精度）。
pub fn now_iso() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}
