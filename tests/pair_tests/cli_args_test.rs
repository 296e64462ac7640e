use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::tempdir;

fn read_settings(path: &Path) -> toml::Table {
    toml::from_str(&fs::read_to_string(path).unwrap()).unwrap()
}

/// Runner config with no start delay that logs into `dir`.
fn write_runner_config(dir: &Path, extra: &str) -> PathBuf {
    let config = dir.join("runner.toml");
    fs::write(
        &config,
        format!(
            "start_delay = \"0s\"\napp_dir = {:?}\n{extra}",
            dir.to_str().unwrap()
        ),
    )
    .unwrap();
    config
}

// 测试帮助信息
#[test]
fn test_help_lists_options() {
    let mut cmd = Command::cargo_bin("pairtestor").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--src"))
        .stdout(predicate::str::contains("--dst"))
        .stdout(predicate::str::contains("--break-on-error"));
}

// 测试启用状态写入设置文件
#[test]
fn test_enable_is_persisted_and_listed() {
    let temp_dir = tempdir().unwrap();
    let settings = temp_dir.path().join("settings.toml");

    let mut cmd = Command::cargo_bin("pairtestor").unwrap();
    cmd.arg("--settings")
        .arg(&settings)
        .args(["--enable", "1", "--list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[x] 1 Transfer"))
        .stdout(predicate::str::contains("[ ] 0 Info"));

    let stored = read_settings(&settings);
    assert_eq!(stored.get("1/enable"), Some(&toml::Value::Boolean(true)));

    // a second invocation reads the flag back from the file
    let mut cmd = Command::cargo_bin("pairtestor").unwrap();
    cmd.arg("--settings")
        .arg(&settings)
        .args(["--disable", "1", "--list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[ ] 1 Transfer"));
}

// 测试运行选项写入设置文件
#[test]
fn test_run_options_are_independent_keys() {
    let temp_dir = tempdir().unwrap();
    let settings = temp_dir.path().join("settings.toml");

    let mut cmd = Command::cargo_bin("pairtestor").unwrap();
    cmd.arg("--settings")
        .arg(&settings)
        .args(["--clear-log-on-start", "true", "--break-on-error", "false"])
        .args(["--log-file", "pair.log"])
        .assert()
        .success();

    let stored = read_settings(&settings);
    assert_eq!(
        stored.get("MainDialog/clearLogOnStart"),
        Some(&toml::Value::Boolean(true))
    );
    assert_eq!(
        stored.get("MainDialog/breakOnError"),
        Some(&toml::Value::Boolean(false))
    );
    assert_eq!(
        stored.get("MainDialog/logFileName").and_then(|v| v.as_str()),
        Some("pair.log")
    );
}

// 测试相同串口不会启动运行
#[test]
fn test_same_ports_do_not_start_a_run() {
    let temp_dir = tempdir().unwrap();
    let settings = temp_dir.path().join("settings.toml");
    let config = write_runner_config(temp_dir.path(), "");

    let mut cmd = Command::cargo_bin("pairtestor").unwrap();
    cmd.arg("--settings")
        .arg(&settings)
        .arg("--config")
        .arg(&config)
        .args(["--enable", "0", "--run", "--src", "COM7", "--dst", "COM7"])
        .env("RUST_LOG", "debug")
        .assert()
        .success()
        .stderr(predicate::str::contains("same"));

    assert!(!temp_dir.path().join("pairtestor.log").exists());
}

// 测试失败的运行返回非零退出码
#[test]
fn test_failed_run_exits_with_failure() {
    let temp_dir = tempdir().unwrap();
    let settings = temp_dir.path().join("settings.toml");
    let config = write_runner_config(temp_dir.path(), "tests = [0]\n");

    let mut cmd = Command::cargo_bin("pairtestor").unwrap();
    cmd.arg("--settings")
        .arg(&settings)
        .arg("--config")
        .arg(&config)
        .args(["--enable", "0", "--run"])
        .args(["--src", "/dev/pairtestor-missing-a"])
        .args(["--dst", "/dev/pairtestor-missing-b"])
        .assert()
        .failure()
        .stdout(predicate::str::contains("Info"))
        .stdout(predicate::str::contains("FAILED"));

    let log = fs::read_to_string(temp_dir.path().join("pairtestor.log")).unwrap();
    assert_eq!(log.matches("*** S T A R T E D ***").count(), 1);
    assert_eq!(log.matches("*** S T O P P E D ***").count(), 1);
}

// 测试缺少串口参数时报错
#[test]
fn test_run_without_pair_is_rejected() {
    let mut cmd = Command::cargo_bin("pairtestor").unwrap();
    cmd.args(["--run", "--src", "COM3"]).assert().failure();
}

// 测试损坏的配置文件
#[test]
fn test_invalid_config_fails() {
    let temp_dir = tempdir().unwrap();
    let config = temp_dir.path().join("runner.toml");
    fs::write(&config, "start_delay = \"soon\"").unwrap();

    let mut cmd = Command::cargo_bin("pairtestor").unwrap();
    cmd.arg("--settings")
        .arg(temp_dir.path().join("settings.toml"))
        .arg("--config")
        .arg(&config)
        .assert()
        .failure();
}
