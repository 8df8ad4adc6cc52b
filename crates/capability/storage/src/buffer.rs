//! 写缓冲
//!
//! 采集路径只向缓冲追加点；刷盘由定时任务（或达到批量阈值时提前唤醒）
//! 以及显式的 `flush` / `close` 触发。刷盘失败按 `max_retries` 重试
//! （两次尝试间按 `retry_backoff` 线性退避），仍失败则把整批放回缓冲头部
//! （超出容量的最旧点被丢弃）。被服务端拒绝的批次（不可重试）直接丢弃。

use crate::error::StorageError;
use crate::models::WritePoint;
use crate::traits::BatchWriter;
use iot_telemetry::{record_flush_failure, record_points_flushed};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify, watch};
use tracing::{debug, warn};

/// 写缓冲参数。
#[derive(Debug, Clone)]
pub struct WriteBufferConfig {
    pub batch_size: usize,
    pub max_buffer_size: usize,
    pub max_retries: usize,
    pub flush_interval: Duration,
    /// 第 n 次重试前等待 `retry_backoff * n`。
    pub retry_backoff: Duration,
}

impl Default for WriteBufferConfig {
    fn default() -> Self {
        Self {
            batch_size: 1000,
            max_buffer_size: 10_000,
            max_retries: 3,
            flush_interval: Duration::from_secs(5),
            retry_backoff: Duration::from_millis(200),
        }
    }
}

impl WriteBufferConfig {
    fn sanitized(mut self) -> Self {
        if self.batch_size == 0 {
            self.batch_size = 1;
        }
        if self.max_buffer_size < self.batch_size {
            self.max_buffer_size = self.batch_size;
        }
        if self.flush_interval.is_zero() {
            self.flush_interval = Duration::from_millis(100);
        }
        self
    }
}

struct BufferState {
    points: Vec<WritePoint>,
    closed: bool,
}

struct FlushTask {
    shutdown: watch::Sender<bool>,
    handle: tokio::task::JoinHandle<()>,
}

struct BufferInner {
    writer: Arc<dyn BatchWriter>,
    config: WriteBufferConfig,
    state: Mutex<BufferState>,
    batch_ready: Notify,
    flusher: std::sync::Mutex<Option<FlushTask>>,
}

/// 多生产者追加、定时任务排空的写缓冲。
#[derive(Clone)]
pub struct WriteBuffer {
    inner: Arc<BufferInner>,
}

impl WriteBuffer {
    pub fn new(writer: Arc<dyn BatchWriter>, config: WriteBufferConfig) -> Self {
        let inner = BufferInner {
            writer,
            config: config.sanitized(),
            state: Mutex::new(BufferState {
                points: Vec::new(),
                closed: false,
            }),
            batch_ready: Notify::new(),
            flusher: std::sync::Mutex::new(None),
        };
        Self {
            inner: Arc::new(inner),
        }
    }

    pub fn config(&self) -> &WriteBufferConfig {
        &self.inner.config
    }

    /// 追加一个点；缓冲已满或已关闭时拒绝。
    pub async fn push(&self, point: WritePoint) -> Result<(), StorageError> {
        let mut state = self.inner.state.lock().await;
        if state.closed {
            return Err(StorageError::new("write buffer closed"));
        }
        if state.points.len() >= self.inner.config.max_buffer_size {
            return Err(StorageError::new("write buffer full"));
        }
        state.points.push(point);
        let batch_ready = state.points.len() >= self.inner.config.batch_size;
        drop(state);
        if batch_ready {
            self.inner.batch_ready.notify_one();
        }
        Ok(())
    }

    /// 当前缓冲中的点数。
    pub async fn len(&self) -> usize {
        self.inner.state.lock().await.points.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// 排空缓冲并写出，返回写出的点数。
    pub async fn flush(&self) -> Result<usize, StorageError> {
        let batch = {
            let mut state = self.inner.state.lock().await;
            std::mem::take(&mut state.points)
        };
        if batch.is_empty() {
            return Ok(0);
        }
        match self.write_batch_with_retry(&batch).await {
            Ok(()) => {
                record_points_flushed(batch.len() as u64);
                Ok(batch.len())
            }
            Err(err) if !err.is_retryable() => {
                record_flush_failure();
                warn!(
                    target: "iot.storage",
                    dropped = batch.len(),
                    error = %err,
                    "write_batch_rejected"
                );
                Err(err)
            }
            Err(err) => {
                record_flush_failure();
                self.requeue(batch).await;
                Err(err)
            }
        }
    }

    /// 启动定时刷盘任务（重复调用无效）。需在 tokio 运行时内调用。
    pub fn spawn_flusher(&self) {
        let Ok(mut flusher) = self.inner.flusher.lock() else {
            return;
        };
        if flusher.is_some() {
            return;
        }
        let (shutdown, mut shutdown_rx) = watch::channel(false);
        let buffer = self.clone();
        let interval = self.inner.config.flush_interval;
        let handle = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(interval) => {}
                    _ = buffer.inner.batch_ready.notified() => {}
                    _ = shutdown_rx.changed() => break,
                }
                match buffer.flush().await {
                    Ok(0) => {}
                    Ok(count) => {
                        debug!(target: "iot.storage", flushed = count, "write_buffer_flushed");
                    }
                    Err(err) => {
                        warn!(target: "iot.storage", error = %err, "write_buffer_flush_failed");
                    }
                }
            }
        });
        *flusher = Some(FlushTask { shutdown, handle });
    }

    /// 停止定时任务、拒绝后续写入并刷出剩余点。可重复调用。
    pub async fn close(&self) -> Result<usize, StorageError> {
        {
            let mut state = self.inner.state.lock().await;
            state.closed = true;
        }
        let task = self
            .inner
            .flusher
            .lock()
            .ok()
            .and_then(|mut flusher| flusher.take());
        if let Some(task) = task {
            let _ = task.shutdown.send(true);
            if let Err(err) = task.handle.await {
                warn!(target: "iot.storage", error = %err, "write_buffer_flusher_join_failed");
            }
        }
        self.flush().await
    }

    async fn write_batch_with_retry(&self, points: &[WritePoint]) -> Result<(), StorageError> {
        let mut attempt = 0;
        loop {
            match self.inner.writer.write_batch(points).await {
                Ok(()) => return Ok(()),
                Err(err) => {
                    attempt += 1;
                    if !err.is_retryable() || attempt > self.inner.config.max_retries {
                        return Err(err);
                    }
                    debug!(target: "iot.storage", attempt, error = %err, "write_batch_retry");
                    let backoff = self.inner.config.retry_backoff * attempt as u32;
                    if !backoff.is_zero() {
                        tokio::time::sleep(backoff).await;
                    }
                }
            }
        }
    }

    async fn requeue(&self, mut batch: Vec<WritePoint>) {
        let mut state = self.inner.state.lock().await;
        batch.append(&mut state.points);
        let overflow = batch.len().saturating_sub(self.inner.config.max_buffer_size);
        if overflow > 0 {
            batch.drain(..overflow);
            warn!(target: "iot.storage", dropped = overflow, "write_buffer_overflow_after_retry");
        }
        state.points = batch;
    }
}
