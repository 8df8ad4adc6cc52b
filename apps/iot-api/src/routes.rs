//! 路由定义
//!
//! 只读 API：
//! - 服务说明：/
//! - 健康检查：/health
//! - 采集指标：/metrics
//! - 最新传感器值：/sensors/{deviceId}/latest

use super::AppState;
use super::handlers::*;
use crate::middleware::request_context;
use axum::{Router, middleware, routing::get};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// 创建 API 路由（含请求上下文、CORS 与追踪中间件）
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/", get(service_info))
        .route("/health", get(health))
        .route("/metrics", get(get_metrics))
        .route("/sensors/:device_id/latest", get(get_latest_sensor_values))
        .with_state(state)
        .layer(middleware::from_fn(request_context))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}
