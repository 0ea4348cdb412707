#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, ExitStatus};
use std::time::{SystemTime, UNIX_EPOCH};

use inverter_tacho::store::SnapshotStore;

pub struct CmdResult {
    pub status: ExitStatus,
    pub stdout: String,
    pub stderr: String,
    pub log_path: PathBuf,
}

fn now_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis())
}

fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect()
}

fn resolve_bin_path() -> PathBuf {
    if let Ok(path) = std::env::var("CARGO_BIN_EXE_tacho") {
        return PathBuf::from(path);
    }

    let exe_name = if cfg!(windows) { "tacho.exe" } else { "tacho" };
    let fallback = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(PathBuf::from))
        .and_then(|deps| deps.parent().map(PathBuf::from))
        .map(|debug_dir| debug_dir.join(exe_name));

    match fallback {
        Some(path) if path.exists() => path,
        _ => panic!("unable to resolve tacho binary path for integration test"),
    }
}

pub fn run_cli_case(case_name: &str, args: &[&str]) -> CmdResult {
    run_cli_case_with_env(case_name, args, &[])
}

/// Run the binary with a scrubbed tacho environment plus `env` overrides.
pub fn run_cli_case_with_env(case_name: &str, args: &[&str], env: &[(&str, &str)]) -> CmdResult {
    let root = std::env::temp_dir().join("tacho-test-logs");
    fs::create_dir_all(&root).expect("create temp test log dir");

    let log_path = root.join(format!("{}-{}.log", sanitize(case_name), now_millis()));
    let bin_path = resolve_bin_path();

    let mut command = Command::new(&bin_path);
    command.args(args).env("RUST_BACKTRACE", "1");
    for (name, _) in std::env::vars() {
        if name.starts_with("TACHO_") || name == "RUST_LOG" {
            command.env_remove(name);
        }
    }
    for (name, value) in env {
        command.env(name, value);
    }
    let output = command.output().expect("execute tacho command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();

    let mut log_content = String::new();
    log_content.push_str(&format!("case={case_name}\n"));
    log_content.push_str(&format!("bin={}\n", bin_path.display()));
    log_content.push_str(&format!("args={args:?}\n"));
    log_content.push_str(&format!("status={}\n", output.status));
    log_content.push_str("----- stdout -----\n");
    log_content.push_str(&stdout);
    log_content.push('\n');
    log_content.push_str("----- stderr -----\n");
    log_content.push_str(&stderr);
    log_content.push('\n');
    fs::write(&log_path, log_content).expect("write test log");

    CmdResult {
        status: output.status,
        stdout,
        stderr,
        log_path,
    }
}

/// An empty config file, so runs never pick up the user's real config.
pub fn write_empty_config(dir: &Path) -> PathBuf {
    let path = dir.join("config.toml");
    fs::write(&path, "").expect("write config");
    path
}

/// Build a snapshot payload from `(field, raw value)` pairs.
pub fn payload(measurements: &[(&str, serde_json::Value)]) -> serde_json::Value {
    let entries: Vec<serde_json::Value> = measurements
        .iter()
        .map(|(fld, val)| serde_json::json!({"fld": fld, "val": val, "unit": ""}))
        .collect();
    serde_json::json!({ "inverter": [entries] })
}

/// Seed a database with `(timestamp, payload)` rows in the given order.
pub fn seed_db(path: &Path, rows: &[(&str, serde_json::Value)]) {
    let store = SnapshotStore::open(path).expect("open store");
    for (ts, payload) in rows {
        store.append(ts, payload).expect("append row");
    }
}
