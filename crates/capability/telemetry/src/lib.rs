//! 追踪、请求 ID、采集指标与 MQTT 报文日志文件。

pub mod message_log;

pub use message_log::{LogLevel, MessageLog};

use std::sync::OnceLock;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing_subscriber::{EnvFilter, fmt};

/// 请求级追踪标识。
#[derive(Debug, Clone)]
pub struct RequestIds {
    pub request_id: String,
    pub trace_id: String,
}

/// 采集指标快照。
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsSnapshot {
    pub messages_received: u64,
    pub decode_failures: u64,
    pub readings_accepted: u64,
    pub readings_dropped: u64,
    pub points_buffered: u64,
    pub write_failures: u64,
    pub points_flushed: u64,
    pub flush_failures: u64,
    pub reconnects: u64,
}

/// 采集指标（进程级计数器）。
pub struct TelemetryMetrics {
    messages_received: AtomicU64,
    decode_failures: AtomicU64,
    readings_accepted: AtomicU64,
    readings_dropped: AtomicU64,
    points_buffered: AtomicU64,
    write_failures: AtomicU64,
    points_flushed: AtomicU64,
    flush_failures: AtomicU64,
    reconnects: AtomicU64,
}

impl TelemetryMetrics {
    pub fn new() -> Self {
        Self {
            messages_received: AtomicU64::new(0),
            decode_failures: AtomicU64::new(0),
            readings_accepted: AtomicU64::new(0),
            readings_dropped: AtomicU64::new(0),
            points_buffered: AtomicU64::new(0),
            write_failures: AtomicU64::new(0),
            points_flushed: AtomicU64::new(0),
            flush_failures: AtomicU64::new(0),
            reconnects: AtomicU64::new(0),
        }
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            messages_received: self.messages_received.load(Ordering::Relaxed),
            decode_failures: self.decode_failures.load(Ordering::Relaxed),
            readings_accepted: self.readings_accepted.load(Ordering::Relaxed),
            readings_dropped: self.readings_dropped.load(Ordering::Relaxed),
            points_buffered: self.points_buffered.load(Ordering::Relaxed),
            write_failures: self.write_failures.load(Ordering::Relaxed),
            points_flushed: self.points_flushed.load(Ordering::Relaxed),
            flush_failures: self.flush_failures.load(Ordering::Relaxed),
            reconnects: self.reconnects.load(Ordering::Relaxed),
        }
    }
}

impl Default for TelemetryMetrics {
    fn default() -> Self {
        Self::new()
    }
}

static METRICS: OnceLock<TelemetryMetrics> = OnceLock::new();

/// 获取全局指标实例。
pub fn metrics() -> &'static TelemetryMetrics {
    METRICS.get_or_init(TelemetryMetrics::new)
}

/// 初始化 tracing（默认 info）。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}

/// 生成新的 request_id 与 trace_id。
pub fn new_request_ids() -> RequestIds {
    RequestIds {
        request_id: uuid::Uuid::new_v4().to_string(),
        trace_id: uuid::Uuid::new_v4().to_string(),
    }
}

/// 记录 MQTT 报文接收次数。
pub fn record_message_received() {
    metrics().messages_received.fetch_add(1, Ordering::Relaxed);
}

/// 记录 payload 解码失败次数（非 UTF-8）。
pub fn record_decode_failure() {
    metrics().decode_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录分类通过的读数。
pub fn record_reading_accepted() {
    metrics().readings_accepted.fetch_add(1, Ordering::Relaxed);
}

/// 记录分类丢弃的报文。
pub fn record_reading_dropped() {
    metrics().readings_dropped.fetch_add(1, Ordering::Relaxed);
}

/// 记录进入写缓冲的点。
pub fn record_point_buffered() {
    metrics().points_buffered.fetch_add(1, Ordering::Relaxed);
}

/// 记录写缓冲拒绝的点。
pub fn record_write_failure() {
    metrics().write_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录刷盘成功的点数。
pub fn record_points_flushed(count: u64) {
    metrics().points_flushed.fetch_add(count, Ordering::Relaxed);
}

/// 记录刷盘失败次数。
pub fn record_flush_failure() {
    metrics().flush_failures.fetch_add(1, Ordering::Relaxed);
}

/// 记录 broker 重连次数。
pub fn record_reconnect() {
    metrics().reconnects.fetch_add(1, Ordering::Relaxed);
}
