//! MQTT 报文日志文件
//!
//! 每个进程一个追加写文件 `<dir>/mqtt-YYYY-MM-DD.log`（打开时的 UTC 日期），
//! 行格式 `[timestamp] [LEVEL] message`；JSON 变体为
//! `[timestamp] [JSON] label: <pretty JSON>`。
//!
//! 写入经 `BufWriter` 缓冲，调用方（MQTT 事件循环）不会逐行等待磁盘；
//! 缓冲满、`close` 或 drop 时落盘。

use chrono::{SecondsFormat, Utc};
use serde::Serialize;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::warn;

/// 日志级别标签。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Info,
    Error,
    Debug,
    Json,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Info => "INFO",
            LogLevel::Error => "ERROR",
            LogLevel::Debug => "DEBUG",
            LogLevel::Json => "JSON",
        }
    }
}

const BUFFER_CAPACITY: usize = 64 * 1024;

/// 追加写日志文件；`close` 之后的写入被忽略。
pub struct MessageLog {
    path: PathBuf,
    file: Mutex<Option<BufWriter<File>>>,
}

impl MessageLog {
    /// 在 `dir` 下打开（必要时创建）当天的日志文件。
    pub fn open(dir: impl AsRef<Path>) -> io::Result<Self> {
        let dir = dir.as_ref();
        std::fs::create_dir_all(dir)?;
        let date = Utc::now().format("%Y-%m-%d");
        let path = dir.join(format!("mqtt-{date}.log"));
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(Some(BufWriter::with_capacity(BUFFER_CAPACITY, file))),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.write(LogLevel::Info, message.as_ref());
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        self.write(LogLevel::Debug, message.as_ref());
    }

    /// 错误日志；`cause` 存在时追加 ` - <cause>`。
    pub fn error(&self, message: impl AsRef<str>, cause: Option<&dyn std::fmt::Display>) {
        let line = match cause {
            Some(cause) => format!("{} - {}", message.as_ref(), cause),
            None => message.as_ref().to_string(),
        };
        self.write(LogLevel::Error, &line);
    }

    /// 以缩进 JSON 记录结构化数据。
    pub fn json<T: Serialize + ?Sized>(&self, label: &str, data: &T) {
        match serde_json::to_string_pretty(data) {
            Ok(json) => self.write(LogLevel::Json, &format!("{label}: {json}")),
            Err(err) => self.error(format!("Failed to stringify JSON for {label}"), Some(&err)),
        }
    }

    /// 刷出缓冲、同步落盘并关闭文件，可重复调用。
    pub fn close(&self) {
        let Ok(mut guard) = self.file.lock() else {
            return;
        };
        let Some(mut file) = guard.take() else {
            return;
        };
        if let Err(err) = file.flush() {
            warn!(target: "iot.telemetry", path = %self.path.display(), error = %err, "message_log_flush_failed");
            return;
        }
        if let Err(err) = file.get_ref().sync_all() {
            warn!(target: "iot.telemetry", path = %self.path.display(), error = %err, "message_log_sync_failed");
        }
    }

    fn write(&self, level: LogLevel, message: &str) {
        let Ok(mut guard) = self.file.lock() else {
            return;
        };
        let Some(file) = guard.as_mut() else {
            return;
        };
        let timestamp = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let line = format_line(&timestamp, level, message);
        if let Err(err) = file.write_all(line.as_bytes()) {
            warn!(target: "iot.telemetry", path = %self.path.display(), error = %err, "message_log_write_failed");
        }
    }
}

/// 单行日志格式（含换行）。
pub fn format_line(timestamp: &str, level: LogLevel, message: &str) -> String {
    format!("[{}] [{}] {}\n", timestamp, level.as_str(), message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_line_matches_layout() {
        let line = format_line("2026-01-01T00:00:00.000Z", LogLevel::Error, "boom");
        assert_eq!(line, "[2026-01-01T00:00:00.000Z] [ERROR] boom\n");
    }

    #[test]
    fn file_name_is_date_stamped() {
        let dir = tempfile::tempdir().expect("tempdir");
        let log = MessageLog::open(dir.path().join("logs")).expect("open");
        let name = log
            .path()
            .file_name()
            .and_then(|name| name.to_str())
            .expect("file name");
        assert!(name.starts_with("mqtt-"));
        assert!(name.ends_with(".log"));
        assert_eq!(name.len(), "mqtt-2026-01-01.log".len());
    }
}
