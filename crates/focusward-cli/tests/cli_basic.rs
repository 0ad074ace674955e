//! Basic CLI E2E tests.
//!
//! Tests invoke the built binary against an isolated data directory and
//! verify its JSON output.

use std::path::Path;
use std::process::Command;

use serde_json::Value;

/// Run a CLI command and return (stdout, stderr, exit code).
fn run_cli(home: &Path, args: &[&str]) -> (String, String, i32) {
    let output = Command::new(env!("CARGO_BIN_EXE_focusward"))
        .args(args)
        .env("FOCUSWARD_HOME", home)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute CLI command");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    let code = output.status.code().unwrap_or(-1);

    (stdout, stderr, code)
}

fn run_json(home: &Path, args: &[&str]) -> Value {
    let (stdout, stderr, code) = run_cli(home, args);
    assert_eq!(code, 0, "{args:?} failed: {stderr}");
    serde_json::from_str(&stdout).expect("Failed to parse JSON output")
}

#[test]
fn test_timer_start_status_reset() {
    let home = tempfile::tempdir().unwrap();

    let started = run_json(home.path(), &["timer", "start", "--duration", "600"]);
    assert_eq!(started["type"], "state");
    assert_eq!(started["timer"]["status"], "running");
    assert_eq!(started["timer"]["duration"], 600);
    assert!(started["endsAt"].is_string());

    let status = run_json(home.path(), &["timer", "status"]);
    assert_eq!(status["timer"]["status"], "running");
    assert_eq!(
        status["timer"]["currentSession"]["id"],
        started["timer"]["currentSession"]["id"]
    );

    let paused = run_json(home.path(), &["timer", "pause"]);
    assert_eq!(paused["timer"]["status"], "paused");
    assert_eq!(paused["timer"]["currentSession"]["interrupted"], true);

    let reset = run_json(home.path(), &["timer", "reset"]);
    assert_eq!(reset["timer"]["status"], "idle");
    assert!(reset["timer"]["currentSession"].is_null());

    let sessions = run_json(home.path(), &["stats", "sessions"]);
    assert_eq!(sessions, Value::Array(Vec::new()));
}

#[test]
fn test_tab_signals_count_while_running() {
    let home = tempfile::tempdir().unwrap();
    run_json(home.path(), &["timer", "start"]);
    run_json(home.path(), &["tab", "activate", "3", "https://www.reddit.com/r/rust"]);
    let state = run_json(home.path(), &["tab", "navigate", "3", "https://docs.rs"]);

    let session = &state["timer"]["currentSession"];
    assert_eq!(session["tabSwitchCount"], 1);
    assert_eq!(session["distractionVisits"], 1);
    assert_eq!(session["lastDistractionDomain"], "reddit.com");
}

#[test]
fn test_sites_add_remove_list() {
    let home = tempfile::tempdir().unwrap();

    let listed = run_json(home.path(), &["sites", "list"]);
    assert!(listed["sites"]
        .as_array()
        .unwrap()
        .contains(&Value::from("youtube.com")));

    let added = run_json(home.path(), &["sites", "add", "https://www.News.ycombinator.com/"]);
    assert!(added["sites"]
        .as_array()
        .unwrap()
        .contains(&Value::from("news.ycombinator.com")));

    let rejected = run_json(home.path(), &["sites", "add", "%%%"]);
    assert_eq!(rejected["sites"], added["sites"]);

    let removed = run_json(home.path(), &["sites", "remove", "youtube.com"]);
    assert!(!removed["sites"]
        .as_array()
        .unwrap()
        .contains(&Value::from("youtube.com")));
}

#[test]
fn test_config_get_set() {
    let home = tempfile::tempdir().unwrap();

    let (stdout, _, code) = run_cli(home.path(), &["config", "get", "timer.default_duration_secs"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "1500");

    let (stdout, _, code) = run_cli(home.path(), &["config", "set", "timer.default_duration_secs", "900"]);
    assert_eq!(code, 0);
    assert_eq!(stdout.trim(), "ok");

    let started = run_json(home.path(), &["timer", "start"]);
    assert_eq!(started["timer"]["duration"], 900);

    let (_, stderr, code) = run_cli(home.path(), &["config", "set", "timer.default_duration_secs", "0"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("error"));

    let (_, _, code) = run_cli(home.path(), &["config", "get", "no.such.key"]);
    assert_ne!(code, 0);
}

#[test]
fn test_empty_stats_and_insights() {
    let home = tempfile::tempdir().unwrap();

    let today = run_json(home.path(), &["stats", "today"]);
    assert_eq!(today["sessionsCompleted"], 0);
    assert_eq!(today["streak"], 0);

    let suggestions = run_json(home.path(), &["stats", "suggestions"]);
    assert_eq!(suggestions["suggestions"], Value::Array(Vec::new()));

    let patterns = run_json(home.path(), &["stats", "patterns"]);
    assert_eq!(patterns["patterns"]["focusByHour"].as_array().unwrap().len(), 24);

    let week = run_json(home.path(), &["stats", "week"]);
    assert_eq!(week["type"], "weekly");
}

#[test]
fn test_reflect_without_pending_prompt_fails() {
    let home = tempfile::tempdir().unwrap();
    let (_, stderr, code) = run_cli(home.path(), &["reflect", "save", "nice work"]);
    assert_ne!(code, 0);
    assert!(stderr.contains("no pending reflection"));

    let listed = run_json(home.path(), &["reflect", "list"]);
    assert_eq!(listed["reflections"], Value::Object(Default::default()));
}

#[test]
fn test_watch_completes_short_session() {
    let home = tempfile::tempdir().unwrap();
    run_json(home.path(), &["timer", "start", "--duration", "1"]);

    let (stdout, stderr, code) = run_cli(
        home.path(),
        &["watch", "--interval-ms", "100", "--until-idle"],
    );
    assert_eq!(code, 0, "watch failed: {stderr}");
    let last: Value = serde_json::from_str(stdout.lines().last().unwrap()).unwrap();
    assert_eq!(last["timer"]["status"], "idle");
    assert_eq!(last["timer"]["pendingReflection"]["score"], 100);

    let sessions = run_json(home.path(), &["stats", "sessions", "--limit", "5"]);
    assert_eq!(sessions.as_array().unwrap().len(), 1);

    let saved = run_json(home.path(), &["reflect", "save", "short but sweet"]);
    assert!(saved["timer"]["pendingReflection"].is_null());
}

#[test]
fn test_plugins_lists_builtin_event_log() {
    let home = tempfile::tempdir().unwrap();
    let out = run_json(home.path(), &["plugins"]);
    assert_eq!(out["plugins"][0]["name"], "event-log");
    assert_eq!(out["handlers"]["tick"], 1);
    // Insights subscribe internally to session-end.
    assert_eq!(out["handlers"]["session-end"], 2);
}
