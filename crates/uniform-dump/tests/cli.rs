use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

const UPDATES: &str = r#"[
    {"type": "vec4", "stage": "vertex", "location": 0, "count": 1, "values": [1, 2, 3, 4]},
    {"type": "mat3", "stage": "vertex", "location": 16, "count": 3,
     "values": [1, 2, 3, 4, 5, 6, 7, 8, 9,
                0, 0, 0, 0, 0, 0, 0, 0, 0,
                0, 0, 0, 0, 0, 0, 0, 0, 0]},
    {"type": "sampler", "stage": "fragment", "location": 0, "count": 1, "values": [3]},
    {"type": "vec4", "stage": "fragment", "location": 32, "count": 1, "handle": 1}
]"#;

const SLOTS: &str = r#"[
    {"handle": 1, "type": "vec4", "count": 1, "values": [0.5, 0.25, 0, 1]}
]"#;

fn uniform_dump(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_uniform-dump"))
        .env("RUST_LOG", "warn")
        .args(args)
        .output()
        .expect("failed to run uniform-dump")
}

fn encode_fixture(root: &Path) -> std::path::PathBuf {
    let input = root.join("updates.json");
    let output = root.join("frame.bin");
    fs::write(&input, UPDATES).unwrap();

    let result = uniform_dump(&[
        "encode",
        input.to_str().unwrap(),
        "-o",
        output.to_str().unwrap(),
    ]);
    assert!(result.status.success(), "{}", String::from_utf8_lossy(&result.stderr));
    output
}

#[test]
fn encode_writes_terminated_stream() {
    let root = TempDir::new().unwrap();
    let stream = encode_fixture(root.path());

    let bytes = fs::read(&stream).unwrap();
    assert_eq!(bytes.len(), (4 + 16) + (4 + 108) + (4 + 4) + (4 + 2) + 4);
    assert_eq!(&bytes[bytes.len() - 4..], &1u32.to_le_bytes());
}

#[test]
fn decode_json_lists_every_record() {
    let root = TempDir::new().unwrap();
    let stream = encode_fixture(root.path());

    let result = uniform_dump(&["decode", stream.to_str().unwrap(), "--json"]);
    assert!(result.status.success());
    let records: serde_json::Value = serde_json::from_slice(&result.stdout).unwrap();
    let records = records.as_array().unwrap();
    assert_eq!(records.len(), 4);
    assert_eq!(records[0]["type"], "vec4");
    assert_eq!(records[0]["offset"], 0);
    assert_eq!(records[1]["type"], "mat3");
    assert_eq!(records[1]["count"], 3);
    assert_eq!(records[2]["values"], serde_json::json!([3]));
    assert_eq!(records[3]["copy"], false);
    assert_eq!(records[3]["handle"], 1);
}

#[test]
fn decode_text_reports_summary() {
    let root = TempDir::new().unwrap();
    let stream = encode_fixture(root.path());

    let result = uniform_dump(&["decode", stream.to_str().unwrap()]);
    assert!(result.status.success());
    let stdout = String::from_utf8(result.stdout).unwrap();
    assert!(stdout.contains("handle 1"));
    assert!(stdout.trim_end().ends_with("4 records, 150 bytes"));
}

#[test]
fn replay_prints_written_registers() {
    let root = TempDir::new().unwrap();
    let stream = encode_fixture(root.path());
    let slots = root.path().join("slots.json");
    fs::write(&slots, SLOTS).unwrap();

    let result = uniform_dump(&[
        "replay",
        stream.to_str().unwrap(),
        "--slots",
        slots.to_str().unwrap(),
        "--no-samplers",
    ]);
    assert!(result.status.success(), "{}", String::from_utf8_lossy(&result.stderr));
    let stdout = String::from_utf8(result.stdout).unwrap();

    assert!(stdout.contains("vertex c0: [1.0, 2.0, 3.0, 4.0]"));
    assert!(stdout.contains("vertex c1: [1.0, 2.0, 3.0, 0.0]"));
    assert!(stdout.contains("vertex c2: [4.0, 5.0, 6.0, 0.0]"));
    assert!(stdout.contains("vertex c3: [7.0, 8.0, 9.0, 0.0]"));
    assert!(stdout.contains("fragment c2: [0.5, 0.25, 0.0, 1.0]"));
    assert!(!stdout.contains("fragment c0"));
}

#[test]
fn replay_without_slots_fails_on_handle_reference() {
    let root = TempDir::new().unwrap();
    let stream = encode_fixture(root.path());

    let result = uniform_dump(&["replay", stream.to_str().unwrap()]);
    assert!(!result.status.success());
    let stderr = String::from_utf8_lossy(&result.stderr);
    assert!(stderr.contains("uniform handle 1"), "{stderr}");
}

#[test]
fn replay_rejects_invalid_config() {
    let root = TempDir::new().unwrap();
    let stream = encode_fixture(root.path());
    let config = root.path().join("state.toml");
    fs::write(&config, "version = 1\n[views]\nmatrix_registers = 0\n").unwrap();

    let result = uniform_dump(&[
        "replay",
        stream.to_str().unwrap(),
        "--config",
        config.to_str().unwrap(),
    ]);
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("invalid config"));
}

#[test]
fn decode_rejects_unknown_opcode() {
    let root = TempDir::new().unwrap();
    let path = root.path().join("garbage.bin");
    fs::write(&path, 0xffff_ffffu32.to_le_bytes()).unwrap();

    let result = uniform_dump(&["decode", path.to_str().unwrap()]);
    assert!(!result.status.success());
}
