//! CLI integration tests for the `stagehand build` and `stagehand stages` commands.
//!
//! Each test runs the binary inside a temporary project directory with its
//! own stagehand.toml.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Get the path to the stagehand binary.
fn stagehand_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_stagehand"))
}

/// Run stagehand in `dir` and return (stdout, stderr, exit code).
fn run_in(dir: &Path, args: &[&str]) -> (String, String, Option<i32>) {
    let output = Command::new(stagehand_binary())
        .args(args)
        .current_dir(dir)
        .env_remove("STAGEHAND_WATCH")
        .env_remove("STAGEHAND_LOG")
        .output()
        .expect("Failed to execute stagehand");
    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.code())
}

fn write_config(dir: &TempDir, contents: &str) {
    fs::write(dir.path().join("stagehand.toml"), contents).unwrap();
}

const SHELL_STAGES: &str = r#"
[project]
name = "demo"

[[stage]]
name = "bundle"
command = "sh"
args = ["-c", "echo $STAGEHAND_MODE > \"$STAGEHAND_OUT_DIR/bundle.txt\""]

[[stage]]
name = "serve"
kind = "serve"
when = "development"
command = "sh"
args = ["-c", "true"]

[[stage]]
name = "minify"
when = "production"
command = "sh"
args = ["-c", "echo $STAGEHAND_OPT_LEVEL > \"$STAGEHAND_OUT_DIR/minify.txt\""]

[stage.options]
level = "3"
"#;

#[test]
fn test_stages_default_config_production() {
    let temp = TempDir::new().unwrap();
    let (stdout, _, code) = run_in(temp.path(), &["stages", "--mode", "production"]);

    assert_eq!(code, Some(0));
    assert!(stdout.contains("minify"));
    assert!(!stdout.contains("livereload"));
}

#[test]
fn test_stages_json_development() {
    let temp = TempDir::new().unwrap();
    write_config(&temp, SHELL_STAGES);
    let (stdout, _, code) = run_in(temp.path(), &["stages", "--mode", "development", "--json"]);

    assert_eq!(code, Some(0));
    let value: serde_json::Value = serde_json::from_str(stdout.trim()).unwrap();
    assert_eq!(value["mode"], "development");
    let names: Vec<&str> =
        value["stages"].as_array().unwrap().iter().map(|s| s["name"].as_str().unwrap()).collect();
    assert_eq!(names, ["bundle", "serve"]);
}

#[test]
fn test_dry_run_does_not_execute() {
    let temp = TempDir::new().unwrap();
    write_config(&temp, SHELL_STAGES);
    let (stdout, _, code) = run_in(temp.path(), &["build", "--dry-run"]);

    assert_eq!(code, Some(0));
    assert!(stdout.contains("Dry run"));
    assert!(stdout.contains("bundle"));
    assert!(!temp.path().join("public/build/bundle.txt").exists());
}

#[cfg(unix)]
#[test]
fn test_production_build_runs_stages() {
    let temp = TempDir::new().unwrap();
    write_config(&temp, SHELL_STAGES);
    let (_, stderr, code) = run_in(temp.path(), &["build"]);

    assert_eq!(code, Some(0), "stderr: {}", stderr);
    let out = temp.path().join("public/build");
    assert_eq!(fs::read_to_string(out.join("bundle.txt")).unwrap().trim(), "production");
    assert_eq!(fs::read_to_string(out.join("minify.txt")).unwrap().trim(), "3");
}

#[cfg(unix)]
#[test]
fn test_verbose_production_build_prints_summary() {
    let temp = TempDir::new().unwrap();
    write_config(&temp, SHELL_STAGES);
    let (stdout, stderr, code) = run_in(temp.path(), &["-v", "build"]);

    assert_eq!(code, Some(0), "stderr: {}", stderr);
    assert!(stdout.contains("Build succeeded (production): 2 stages ran, 0 skipped"));
}

#[cfg(unix)]
#[test]
fn test_build_with_config_in_subdirectory() {
    let temp = TempDir::new().unwrap();
    let web = temp.path().join("web");
    fs::create_dir_all(&web).unwrap();
    fs::write(web.join("stagehand.toml"), SHELL_STAGES).unwrap();
    let (_, stderr, code) = run_in(temp.path(), &["build", "--config", "web/stagehand.toml"]);

    assert_eq!(code, Some(0), "stderr: {}", stderr);
    assert!(web.join("public/build/bundle.txt").exists());
}

#[cfg(unix)]
#[test]
fn test_production_build_failure_exits_with_error() {
    let temp = TempDir::new().unwrap();
    write_config(
        &temp,
        r#"
[project]
name = "broken"

[[stage]]
name = "bundle"
command = "sh"
args = ["-c", "exit 7"]

[[stage]]
name = "minify"
command = "sh"
args = ["-c", "touch \"$STAGEHAND_OUT_DIR/minify.txt\""]
"#,
    );
    let (_, stderr, code) = run_in(temp.path(), &["build", "--out", "dist"]);

    assert_eq!(code, Some(1));
    assert!(stderr.contains("bundle"));
    assert!(temp.path().join("dist").is_dir());
    assert!(!temp.path().join("dist/minify.txt").exists());
}

#[test]
fn test_invalid_config_exits_with_error() {
    let temp = TempDir::new().unwrap();
    write_config(
        &temp,
        r#"
[project]
name = "misdeclared"

[[stage]]
name = "serve"
kind = "serve"
when = "production"
command = "npm"
"#,
    );
    let (_, stderr, code) = run_in(temp.path(), &["build"]);

    assert_eq!(code, Some(1));
    assert!(stderr.contains("serve"));
}

#[test]
fn test_missing_config_file_is_invalid_args() {
    let temp = TempDir::new().unwrap();
    let (_, stderr, code) = run_in(temp.path(), &["build", "--config", "nope.toml"]);

    assert_eq!(code, Some(2));
    assert!(stderr.contains("nope.toml"));
}

#[test]
fn test_unknown_mode_is_invalid_args() {
    let temp = TempDir::new().unwrap();
    let (_, _, code) = run_in(temp.path(), &["stages", "--mode", "staging"]);
    assert_eq!(code, Some(2));
}
