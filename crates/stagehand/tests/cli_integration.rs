//! CLI integration tests for the Stagehand command-line interface.
//!
//! These tests verify:
//! - Help text is displayed correctly
//! - Tool listing works from a local config
//! - Config display merges files and hides secrets
//!
//! Every test points the user config directory at a temporary directory so
//! the real user config is never read.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Get a command for the stagehand binary with an isolated config directory.
fn stagehand(config_dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("stagehand").unwrap();
    cmd.env("STAGEHAND_CONFIG_DIR", config_dir.path())
        .env_remove("DIAL_ENDPOINT")
        .env_remove("DEPLOYMENT_NAME")
        .env_remove("DIAL_API_KEY");
    cmd
}

/// A project directory whose config avoids loading a local model.
fn project(extra: &str) -> TempDir {
    let dir = TempDir::new().unwrap();
    std::fs::write(
        dir.path().join("stagehand.toml"),
        format!("[embedding]\nprovider = \"mock\"\n{extra}"),
    )
    .unwrap();
    dir
}

// ─────────────────────────────────────────────────────────────────────────────
// Help and Version Tests
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_help_displays() {
    let config_dir = TempDir::new().unwrap();
    stagehand(&config_dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Stagehand"))
        .stdout(predicate::str::contains("tools"))
        .stdout(predicate::str::contains("call"))
        .stdout(predicate::str::contains("config"));
}

#[test]
fn test_version_displays() {
    let config_dir = TempDir::new().unwrap();
    stagehand(&config_dir)
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("stagehand"));
}

#[test]
fn test_call_help() {
    let config_dir = TempDir::new().unwrap();
    stagehand(&config_dir)
        .args(["call", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("--args"))
        .stdout(predicate::str::contains("--conversation"))
        .stdout(predicate::str::contains("--api-key"));
}

#[test]
fn test_call_requires_tool_name() {
    let config_dir = TempDir::new().unwrap();
    stagehand(&config_dir)
        .arg("call")
        .assert()
        .failure()
        .stderr(predicate::str::contains("required"));
}

#[test]
fn test_unknown_subcommand() {
    let config_dir = TempDir::new().unwrap();
    stagehand(&config_dir).arg("serve").assert().failure();
}

// ─────────────────────────────────────────────────────────────────────────────
// Tools
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_tools_lists_builtin_tools() {
    let config_dir = TempDir::new().unwrap();
    let project = project("");
    stagehand(&config_dir)
        .arg("--project-dir")
        .arg(project.path())
        .arg("tools")
        .assert()
        .success()
        .stdout(predicate::str::contains("rag_tool"))
        .stdout(predicate::str::contains("file_content_extractor"))
        .stdout(predicate::str::contains("image_generation_tool"));
}

#[test]
fn test_tools_json_includes_configured_deployments() {
    let config_dir = TempDir::new().unwrap();
    let project = project(
        r#"
[image]
enabled = false

[[deployments]]
name = "summarize"
description = "Summarizes long text"
deployment = "gpt-4o-mini"
"#,
    );

    stagehand(&config_dir)
        .arg("--project-dir")
        .arg(project.path())
        .args(["tools", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#""type": "function""#))
        .stdout(predicate::str::contains(r#""name": "summarize""#))
        .stdout(predicate::str::contains("image_generation_tool").not());
}

#[test]
fn test_call_unknown_tool_fails() {
    let config_dir = TempDir::new().unwrap();
    let project = project("");
    stagehand(&config_dir)
        .arg("--project-dir")
        .arg(project.path())
        .args(["call", "no_such_tool"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("unknown tool 'no_such_tool'"));
}

// ─────────────────────────────────────────────────────────────────────────────
// Config
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_config_shows_merged_values() {
    let config_dir = TempDir::new().unwrap();
    std::fs::write(
        config_dir.path().join("config.toml"),
        "[rag]\ntop_k = 7\n\n[files]\npage_size = 4000\n",
    )
    .unwrap();
    let project = project("[rag]\ntop_k = 5\n");

    stagehand(&config_dir)
        .arg("--project-dir")
        .arg(project.path())
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("loaded"))
        .stdout(predicate::str::contains("top_k = 5"))
        .stdout(predicate::str::contains("page_size = 4000"))
        .stdout(predicate::str::contains("max_documents = 100"));
}

#[test]
fn test_config_applies_environment_overrides() {
    let config_dir = TempDir::new().unwrap();
    let project = project("");

    stagehand(&config_dir)
        .env("DIAL_ENDPOINT", "http://dial.internal:9000")
        .env("DEPLOYMENT_NAME", "gpt-4o-mini")
        .arg("--project-dir")
        .arg(project.path())
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("http://dial.internal:9000"))
        .stdout(predicate::str::contains(r#"deployment = "gpt-4o-mini""#));
}

#[test]
fn test_config_redacts_and_warns_on_plaintext_keys() {
    let config_dir = TempDir::new().unwrap();
    let project = project("[dial]\napi_key = \"very-secret-key\"\n");

    stagehand(&config_dir)
        .arg("--project-dir")
        .arg(project.path())
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("very-secret-key").not())
        .stderr(predicate::str::contains("plaintext"));
}

#[test]
fn test_config_malformed_file_warns() {
    let config_dir = TempDir::new().unwrap();
    let project = TempDir::new().unwrap();
    std::fs::write(project.path().join("stagehand.toml"), "not valid {{{{").unwrap();

    stagehand(&config_dir)
        .arg("--project-dir")
        .arg(project.path())
        .arg("config")
        .assert()
        .success()
        .stderr(predicate::str::contains("Failed to load"));
}
