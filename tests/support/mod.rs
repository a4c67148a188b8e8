#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use serde_json::Value;
use tempfile::TempDir;

/// A scratch data directory for CLI tests.
pub struct TestData {
    dir: TempDir,
}

impl TestData {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().expect("failed to create tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// `planboard` pinned to this data dir with a clean identity environment.
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("planboard").expect("planboard binary");
        cmd.env_remove("PLANBOARD_USER")
            .env_remove("PLANBOARD_DATA")
            .env_remove("RUST_LOG")
            .arg("--data-dir")
            .arg(self.path());
        cmd
    }

    /// `planboard --user <user> --json`.
    pub fn cmd_as(&self, user: &str) -> Command {
        let mut cmd = self.cmd();
        cmd.args(["--user", user, "--json"]);
        cmd
    }

    pub fn write_config(&self, contents: &str) -> PathBuf {
        let path = self.path().join("planboard.toml");
        fs::write(&path, contents).expect("write config");
        path
    }

    pub fn rows(&self) -> Vec<Value> {
        let path = self.path().join("collections").join("tasks.json");
        if !path.exists() {
            return Vec::new();
        }
        let raw = fs::read_to_string(path).expect("read tasks");
        serde_json::from_str(&raw).expect("tasks json")
    }

    /// Run a JSON command that must succeed and return its `data`.
    pub fn json_ok(&self, user: &str, args: &[&str]) -> Value {
        let output = self
            .cmd_as(user)
            .args(args)
            .assert()
            .success()
            .get_output()
            .stdout
            .clone();
        let value: Value = serde_json::from_slice(&output).expect("json envelope");
        assert_eq!(value["status"], "success");
        value["data"].clone()
    }

    /// Create a task and return its id.
    pub fn add(&self, user: &str, title: &str) -> String {
        let data = self.json_ok(user, &["add", title]);
        data["id"].as_str().expect("task id").to_string()
    }

    /// Ids of one column, top to bottom.
    pub fn column(&self, user: &str, status: &str) -> Vec<String> {
        let data = self.json_ok(user, &["board"]);
        data["groups"]
            .as_array()
            .expect("groups")
            .iter()
            .find(|group| group["status"] == status)
            .map(|group| {
                group["items"]
                    .as_array()
                    .expect("items")
                    .iter()
                    .map(|item| item["id"].as_str().expect("id").to_string())
                    .collect()
            })
            .unwrap_or_default()
    }
}
