use iot_telemetry::{metrics, new_request_ids, record_message_received, record_points_flushed};

#[test]
fn request_ids_non_empty() {
    let ids = new_request_ids();
    assert!(!ids.request_id.is_empty());
    assert!(!ids.trace_id.is_empty());
    assert_ne!(ids.request_id, ids.trace_id);
}

#[test]
fn counters_accumulate() {
    let before = metrics().snapshot();
    record_message_received();
    record_points_flushed(3);
    let after = metrics().snapshot();
    assert!(after.messages_received >= before.messages_received + 1);
    assert!(after.points_flushed >= before.points_flushed + 3);
}
