use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use std::time::{SystemTime, UNIX_EPOCH};

fn unique_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("time went backwards")
        .as_nanos();
    let dir = std::env::temp_dir().join(format!(
        "mmu-sim-{prefix}-{}-{nanos}",
        std::process::id()
    ));
    fs::create_dir_all(&dir).expect("create temp dir");
    dir
}

fn done_line(stdout: &str) -> &str {
    stdout
        .lines()
        .find(|line| line.starts_with("done @ "))
        .expect("summary line")
}

fn counter(line: &str, name: &str) -> u64 {
    let prefix = format!("{name}=");
    line.split(", ")
        .find_map(|kv| kv.strip_prefix(prefix.as_str()))
        .and_then(|v| v.parse().ok())
        .unwrap_or_else(|| panic!("missing counter {name} in {line}"))
}

#[test]
fn writes_telemetry_json_with_meta_first() {
    let dir = unique_temp_dir("telemetry");
    let out_json = dir.join("telemetry.json");

    let output = Command::new(env!("CARGO_BIN_EXE_shared_buffer_sim"))
        .args([
            "--ports",
            "2",
            "--senders",
            "2",
            "--pkts",
            "20",
            "--max-buffer-bytes",
            "12000",
            "--until-ms",
            "1",
            "--telemetry-json",
            out_json.to_str().unwrap(),
        ])
        .output()
        .expect("run shared_buffer_sim");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = done_line(&stdout);
    let arrived = counter(line, "arrived");
    assert_eq!(arrived, 40);
    assert_eq!(
        arrived,
        counter(line, "admitted") + counter(line, "dropped")
    );

    let raw = fs::read_to_string(&out_json).expect("read telemetry json");
    let events: Vec<Value> = serde_json::from_str(&raw).expect("parse telemetry json");
    assert_eq!(events[0]["kind"], "meta");
    assert_eq!(events[0]["ports"].as_array().map(|p| p.len()), Some(2));
    assert!(events.iter().any(|e| e["kind"] == "enqueue"));
    assert!(events.iter().any(|e| e["kind"] == "dequeue"));
    assert!(events.iter().any(|e| e["kind"] == "throughput"));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn reads_config_file_and_applies_overrides() {
    let dir = unique_temp_dir("config");
    let cfg = dir.join("mmu.json");
    fs::write(
        &cfg,
        r#"{ "enqueue_method": "push_out", "max_buffer_bytes": 6000 }"#,
    )
    .expect("write config");

    let output = Command::new(env!("CARGO_BIN_EXE_shared_buffer_sim"))
        .args([
            "--config",
            cfg.to_str().unwrap(),
            "--scheduler",
            "deficit_round_robin",
            "--ports",
            "1",
            "--pkts",
            "30",
            "--until-ms",
            "1",
        ])
        .output()
        .expect("run shared_buffer_sim");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let line = done_line(&stdout);
    assert_eq!(counter(line, "arrived"), 120);
    assert!(counter(line, "pushed_out") + counter(line, "dropped") > 0);

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn rejects_unimplemented_scheduler() {
    let output = Command::new(env!("CARGO_BIN_EXE_shared_buffer_sim"))
        .args(["--scheduler", "weighted_round_robin", "--until-ms", "0"])
        .output()
        .expect("run shared_buffer_sim");
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("weighted round robin"), "stderr: {stderr}");
}

#[test]
fn rejects_unknown_enqueue_method() {
    let output = Command::new(env!("CARGO_BIN_EXE_shared_buffer_sim"))
        .args(["--enqueue-method", "red", "--until-ms", "0"])
        .output()
        .expect("run shared_buffer_sim");
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("invalid value 'red'"), "stderr: {stderr}");
    assert!(stderr.contains("push_out"), "stderr: {stderr}");
    assert!(output.stdout.is_empty());
}

#[test]
fn accepts_drop_type_by_config_name() {
    let output = Command::new(env!("CARGO_BIN_EXE_shared_buffer_sim"))
        .args([
            "--drop-type",
            "long_token",
            "--enqueue-method",
            "multi_layer_dynamic_threshold",
            "--ports",
            "1",
            "--pkts",
            "10",
            "--until-ms",
            "1",
        ])
        .output()
        .expect("run shared_buffer_sim");
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(counter(done_line(&stdout), "arrived"), 40);
}
