//! Homelab IoT 后端：MQTT 采集 + InfluxDB 写入 + 只读查询 API。
//!
//! 退出顺序：停止 HTTP → 断开 MQTT（不再接收报文）→ 刷盘并关闭存储 → 关闭报文日志。

mod handlers;
mod ingest;
mod middleware;
mod routes;
mod utils;

use iot_config::AppConfig;
use iot_storage::{
    InMemoryTimeSeriesStore, InfluxConfig, InfluxStore, QueryService, TimeSeriesStore,
    WriteBufferConfig,
};
use iot_telemetry::{MessageLog, init_tracing};
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub query: QueryService,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 从环境变量加载运行配置
    let config = AppConfig::from_env()?;
    // 初始化结构化日志
    init_tracing();

    // MQTT 报文日志文件（按启动日期命名）
    let message_log = Arc::new(MessageLog::open(&config.log_dir)?);
    info!(target: "iot.api", path = %message_log.path().display(), "message_log_opened");

    let store = build_store(&config)?;
    let ingest = ingest::start_ingest(&config, store.clone(), message_log.clone()).await?;

    let state = AppState {
        query: QueryService::new(store.clone()),
    };
    let app = routes::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.http_addr).await?;
    info!(target: "iot.api", addr = %config.http_addr, "http_listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!(target: "iot.api", "shutdown_started");
    if let Some(ingest) = ingest {
        ingest.disconnect().await;
    }
    if let Err(err) = store.close().await {
        warn!(target: "iot.api", error = %err, "store_close_failed");
    }
    message_log.close();
    info!(target: "iot.api", "shutdown_completed");
    Ok(())
}

/// 根据配置选择时序存储；未配置 InfluxDB token 时使用内存存储。
fn build_store(config: &AppConfig) -> Result<Arc<dyn TimeSeriesStore>, iot_storage::StorageError> {
    let buffer = WriteBufferConfig {
        batch_size: config.influx_batch_size,
        max_buffer_size: config.influx_max_buffer_points,
        max_retries: config.influx_max_retries,
        flush_interval: config.influx_flush_interval(),
        retry_backoff: config.influx_retry_backoff(),
    };
    if config.influx_token.is_empty() {
        warn!(target: "iot.api", "influxdb token not set, using in-memory store");
        let store = InMemoryTimeSeriesStore::with_config(buffer);
        store.spawn_flusher();
        return Ok(Arc::new(store));
    }
    let influx = InfluxConfig::new(
        config.influx_url.clone(),
        config.influx_token.clone(),
        config.influx_org.clone(),
        config.influx_bucket.clone(),
    );
    info!(
        target: "iot.api",
        url = %influx.url,
        org = %influx.org,
        bucket = %influx.bucket,
        "influxdb_store_ready"
    );
    Ok(Arc::new(InfluxStore::connect(influx, buffer)?))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            warn!(target: "iot.api", error = %err, "ctrl_c_listener_failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(err) => {
                warn!(target: "iot.api", error = %err, "sigterm_listener_failed");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}
