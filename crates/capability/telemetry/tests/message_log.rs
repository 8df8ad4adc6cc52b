use iot_telemetry::MessageLog;

fn read_log(log: &MessageLog) -> String {
    std::fs::read_to_string(log.path()).expect("read log")
}

#[test]
fn writes_levels_in_order() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log = MessageLog::open(dir.path()).expect("open");
    log.info("message received");
    log.debug("payload: 22.5");
    let cause = std::io::Error::other("broker gone");
    log.error("mqtt error", Some(&cause));
    log.close();

    let content = read_log(&log);
    let lines: Vec<&str> = content.lines().collect();
    assert_eq!(lines.len(), 3);
    assert!(lines[0].starts_with('['));
    assert!(lines[0].ends_with("] [INFO] message received"));
    assert!(lines[1].ends_with("] [DEBUG] payload: 22.5"));
    assert!(lines[2].ends_with("] [ERROR] mqtt error - broker gone"));
}

#[test]
fn json_entry_is_pretty_printed() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log = MessageLog::open(dir.path()).expect("open");
    log.json("payload", &serde_json::json!({ "temperature": 21.5 }));
    log.close();

    let content = read_log(&log);
    assert!(content.contains("] [JSON] payload: {\n  \"temperature\": 21.5\n}"));
}

#[test]
fn writes_after_close_are_ignored() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log = MessageLog::open(dir.path()).expect("open");
    log.info("before");
    log.close();
    log.info("after");
    log.close();

    let content = read_log(&log);
    assert!(content.contains("before"));
    assert!(!content.contains("after"));
}

#[test]
fn reopening_appends() {
    let dir = tempfile::tempdir().expect("tempdir");
    let first = MessageLog::open(dir.path()).expect("open");
    first.info("first run");
    first.close();
    let second = MessageLog::open(dir.path()).expect("reopen");
    second.info("second run");
    second.close();

    assert_eq!(first.path(), second.path());
    let content = read_log(&second);
    assert_eq!(content.lines().count(), 2);
}

#[test]
fn lines_are_buffered_until_close() {
    let dir = tempfile::tempdir().expect("tempdir");
    let log = MessageLog::open(dir.path()).expect("open");
    log.info("buffered line");
    assert_eq!(read_log(&log), "");

    log.close();
    assert!(read_log(&log).ends_with("] [INFO] buffered line\n"));
}
