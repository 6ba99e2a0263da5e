use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use serde_json::{Value, json};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

struct TestEnv {
    _tmp: TempDir,
    cache_root: PathBuf,
    outbox: PathBuf,
}

impl TestEnv {
    fn new() -> Self {
        let tmp = TempDir::new().expect("create temp dir");
        let cache_root = tmp.path().join("cache");
        let outbox = tmp.path().join("outbox.jsonl");
        let fixture = tmp.path().join("fixture.json");
        fs::write(
            &fixture,
            serde_json::to_vec_pretty(&fixture_json()).expect("encode fixture"),
        )
        .expect("write fixture");

        let env = Self {
            _tmp: tmp,
            cache_root,
            outbox,
        };
        env.cmd("import")
            .arg("--fixture")
            .arg(&fixture)
            .assert()
            .success();
        env
    }

    fn cmd(&self, subcommand: &str) -> Command {
        let mut cmd = cargo_bin_cmd!("verifier-assign");
        cmd.env("RUST_LOG", "warn")
            .arg(subcommand)
            .arg("--cache-root")
            .arg(&self.cache_root)
            .arg("--outbox-path")
            .arg(&self.outbox);
        cmd
    }

    fn run_json(&self, subcommand: &str, args: &[&str]) -> Value {
        let out = self
            .cmd(subcommand)
            .arg("--json")
            .args(args)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        serde_json::from_slice(&out).expect("valid json output")
    }

    fn outbox_lines(&self) -> Vec<Value> {
        let Ok(raw) = fs::read_to_string(&self.outbox) else {
            return Vec::new();
        };
        raw.lines()
            .map(|line| serde_json::from_str(line).expect("valid outbox line"))
            .collect()
    }
}

fn fixture_json() -> Value {
    json!({
        "users": [
            {"id": "v-1", "email": "v1@example.org", "name": "Ada", "role": "volunteer"},
            {"id": "v-2", "email": "v2@example.org", "name": "Grace", "role": "volunteer"},
            {"id": "v-3", "email": "v3@example.org", "name": "Edsger", "role": "volunteer", "capacity": 1},
            {"id": "u-9", "email": "admin@example.org", "name": "Root", "role": "admin"}
        ],
        "reports": [
            {"id": "r-1"},
            {"id": "r-2"},
            {"id": "r-3"},
            {"id": "r-done", "status": "VERIFIED"}
        ]
    })
}

fn ids(value: &Value) -> Vec<String> {
    value
        .as_array()
        .expect("array")
        .iter()
        .map(|id| id.as_str().expect("string id").to_string())
        .collect()
}

#[test]
fn assign_is_idempotent_across_invocations() {
    let env = TestEnv::new();
    let resync = env.run_json("resync", &[]);
    assert_eq!(ids(&resync["registered"]), vec!["v-1", "v-2", "v-3"]);

    let first = env.run_json("assign", &["--report-id", "r-1", "--target-verifiers", "2"]);
    assert_eq!(first["outcome"], "assigned");
    assert_eq!(ids(&first["assigned_ids"]), vec!["v-1", "v-2"]);

    let second = env.run_json("assign", &["--report-id", "r-1", "--target-verifiers", "2"]);
    assert_eq!(second["outcome"], "already_assigned");

    let notified: Vec<String> = env
        .outbox_lines()
        .iter()
        .map(|line| line["volunteer_id"].as_str().expect("volunteer id").to_string())
        .collect();
    assert_eq!(notified, vec!["v-1", "v-2"]);
}

#[test]
fn ranking_survives_between_invocations() {
    let env = TestEnv::new();
    env.cmd("resync").assert().success();

    let first = env.run_json("assign", &["--report-id", "r-1"]);
    let second = env.run_json("assign", &["--report-id", "r-2"]);

    assert_eq!(ids(&first["assigned_ids"]), vec!["v-1"]);
    assert_eq!(ids(&second["assigned_ids"]), vec!["v-2"]);
}

#[test]
fn non_pending_and_unknown_reports_are_reported() {
    let env = TestEnv::new();
    env.cmd("resync").assert().success();

    let verified = env.run_json("assign", &["--report-id", "r-done"]);
    assert_eq!(verified["outcome"], "not_pending");

    let unknown = env.run_json("assign", &["--report-id", "r-missing"]);
    assert_eq!(unknown["outcome"], "report_not_found");
    assert!(env.outbox_lines().is_empty());
}

#[test]
fn empty_ranking_yields_no_volunteers() {
    let env = TestEnv::new();

    let result = env.run_json("assign", &["--report-id", "r-1"]);

    assert_eq!(result["outcome"], "no_volunteers");
}

#[test]
fn assign_pending_covers_every_pending_report() {
    let env = TestEnv::new();
    env.cmd("resync").assert().success();

    let summary = env.run_json("assign-pending", &["--workers", "3"]);

    assert_eq!(summary["pending"], 3);
    assert_eq!(summary["outcomes"]["assigned"], 3);
    assert!(summary["failed"].as_array().expect("failed").is_empty());
    assert_eq!(env.outbox_lines().len(), 3);
}

#[test]
fn register_rejects_accounts_that_are_not_volunteers() {
    let env = TestEnv::new();

    env.cmd("register")
        .args(["--volunteer-id", "u-9"])
        .assert()
        .failure();
    env.cmd("register")
        .args(["--volunteer-id", "nobody"])
        .assert()
        .failure();
    env.cmd("register")
        .args(["--volunteer-id", "v-2", "--capacity", "3"])
        .assert()
        .success();

    let drift = env.run_json("drift", &[]);
    assert!(drift["stale"].as_array().expect("stale").is_empty());
    assert_eq!(ids(&drift["unregistered"]), vec!["v-1", "v-3"]);
}

#[test]
fn deregister_then_resync_restores_clean_state() {
    let env = TestEnv::new();
    env.cmd("resync").assert().success();
    env.cmd("deregister")
        .args(["--volunteer-id", "v-1"])
        .assert()
        .success();

    let drift = env.run_json("drift", &[]);
    assert_eq!(ids(&drift["unregistered"]), vec!["v-1"]);

    env.cmd("resync").assert().success();
    let drift = env.run_json("drift", &[]);
    assert!(drift["stale"].as_array().expect("stale").is_empty());
    assert!(drift["unregistered"].as_array().expect("unregistered").is_empty());
}

#[test]
fn status_reports_without_output_on_stdout() {
    let env = TestEnv::new();

    let output = env
        .cmd("status")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    assert!(output.is_empty());
}
