//! 采集指标快照
//!
//! - GET /metrics

use api_contract::MetricsSnapshotDto;
use axum::Json;
use iot_telemetry::metrics;

pub async fn get_metrics() -> Json<MetricsSnapshotDto> {
    let snapshot = metrics().snapshot();
    Json(MetricsSnapshotDto {
        messages_received: snapshot.messages_received,
        decode_failures: snapshot.decode_failures,
        readings_accepted: snapshot.readings_accepted,
        readings_dropped: snapshot.readings_dropped,
        points_buffered: snapshot.points_buffered,
        write_failures: snapshot.write_failures,
        points_flushed: snapshot.points_flushed,
        flush_failures: snapshot.flush_failures,
        reconnects: snapshot.reconnects,
    })
}
