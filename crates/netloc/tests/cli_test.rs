//! Integration tests for the `netloc` CLI binary.
//!
//! These cover argument parsing, completions, config handling, and
//! shell rendering. Nothing here touches the host's network settings.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `netloc` binary with env isolation.
///
/// Points HOME and the XDG directories into `home` and clears every
/// `NETLOC_*` override so tests never see the user's configuration.
fn netloc_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("netloc");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env("XDG_DATA_HOME", home.join(".local/share"))
        .env("SHELL", "/bin/zsh")
        .env_remove("NETLOC_CONFIG")
        .env_remove("NETLOC_SETTINGS__DEBUG")
        .env_remove("NO_COLOR")
        .env_remove("RUST_LOG");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let home = TempDir::new().unwrap();
    let output = netloc_cmd(home.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    let home = TempDir::new().unwrap();
    netloc_cmd(home.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("location")
            .and(predicate::str::contains("run"))
            .and(predicate::str::contains("check"))
            .and(predicate::str::contains("apply"))
            .and(predicate::str::contains("shell")),
    );
}

#[test]
fn test_version_flag() {
    let home = TempDir::new().unwrap();
    netloc_cmd(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("netloc"));
}

#[test]
fn test_invalid_subcommand() {
    let home = TempDir::new().unwrap();
    let output = netloc_cmd(home.path()).arg("teleport").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(text.contains("unrecognized subcommand"), "Unexpected output:\n{text}");
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    let home = TempDir::new().unwrap();
    netloc_cmd(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    let home = TempDir::new().unwrap();
    netloc_cmd(home.path())
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn test_completions_fish() {
    let home = TempDir::new().unwrap();
    netloc_cmd(home.path())
        .args(["completions", "fish"])
        .assert()
        .success()
        .stdout(predicate::str::contains("complete"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_honors_flag() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("custom.toml");
    netloc_cmd(home.path())
        .args(["config", "path", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("custom.toml"));
}

#[test]
fn test_config_init_then_validate() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("netloc.toml");

    netloc_cmd(home.path())
        .args(["config", "init", "--config"])
        .arg(&path)
        .assert()
        .success();
    assert!(path.exists());

    // A second init leaves the file alone.
    netloc_cmd(home.path())
        .args(["config", "init", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stderr(predicate::str::contains("already exists"));

    netloc_cmd(home.path())
        .args(["config", "validate", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("1 location(s)").and(predicate::str::contains("default")));
}

#[test]
fn test_config_show_applies_env_overrides() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("netloc.toml");
    netloc_cmd(home.path())
        .args(["config", "show", "--config"])
        .arg(&path)
        .env("NETLOC_SETTINGS__DEBOUNCE_SECONDS", "9")
        .assert()
        .success()
        .stdout(predicate::str::contains("debounce_seconds = 9"));
}

#[test]
fn test_config_validation_failure_exit_code() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("netloc.toml");
    std::fs::write(
        &path,
        r#"
[settings]
debounce_seconds = 0

[[locations]]
name = "default"
"#,
    )
    .unwrap();

    let output = netloc_cmd(home.path())
        .args(["config", "validate", "--config"])
        .arg(&path)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3), "Expected exit code 3");
    let text = combined_output(&output);
    assert!(text.contains("debounce_seconds"), "Unexpected output:\n{text}");
}

#[test]
fn test_config_bad_dns_server_exit_code() {
    let home = TempDir::new().unwrap();
    let path = home.path().join("netloc.toml");
    std::fs::write(
        &path,
        r#"
[[locations]]
name = "default"

[[locations]]
name = "work"
ssids = ["CorpWiFi"]
dns_servers = ["10.0.0.300"]
"#,
    )
    .unwrap();

    let output = netloc_cmd(home.path())
        .args(["config", "validate", "--config"])
        .arg(&path)
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
    let text = combined_output(&output);
    assert!(text.contains("locations.work.dns_servers"), "Unexpected output:\n{text}");
}

// ── Shell rendering ─────────────────────────────────────────────────

#[test]
fn test_shell_render_posix() {
    let home = TempDir::new().unwrap();
    netloc_cmd(home.path())
        .args(["shell", "render", "--proxy", "proxy.corp:3128", "--bypass", "corp.example"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains(r#"export http_proxy="http://proxy.corp:3128""#)
                .and(predicate::str::contains(r#"export rsync_proxy="proxy.corp:3128""#))
                .and(predicate::str::contains("corp.example")),
        );
}

#[test]
fn test_shell_render_csh_and_fish() {
    let home = TempDir::new().unwrap();
    netloc_cmd(home.path())
        .args(["shell", "render", "--proxy", "proxy.corp:3128", "--dialect", "csh"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"setenv https_proxy "http://proxy.corp:3128""#));

    netloc_cmd(home.path())
        .args(["shell", "render", "--proxy", "socks5://gw:1080", "--dialect", "fish"])
        .assert()
        .success()
        .stdout(predicate::str::contains(r#"set -gx http_proxy "socks5://gw:1080""#));
}

#[test]
fn test_shell_render_rejects_discovery_url() {
    let home = TempDir::new().unwrap();
    let output = netloc_cmd(home.path())
        .args(["shell", "render", "--proxy", "http://wpad.corp/proxy.pac"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(text.contains("not a static proxy"), "Unexpected output:\n{text}");
}
