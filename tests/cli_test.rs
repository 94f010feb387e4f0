//! Integration tests for the rfdeploy binary
//!
//! Drives the compiled binary against temporary checkouts and simulator
//! folders. Radio deploys use a shell script standing in for Ethos Suite.

mod common;

use common::TestProject;
use std::path::Path;

fn stderr(output: &std::process::Output) -> String {
    String::from_utf8_lossy(&output.stderr).into_owned()
}

#[test]
fn test_missing_config_env_fails() {
    let project = TestProject::new();
    let output = project.rfdeploy(None, &[]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("[CONFIG] ERROR:"));
    assert!(stderr(&output).contains("RFSUITE_CONFIG"));
}

#[test]
fn test_config_flag_without_env_fails() {
    let project = TestProject::new();
    project.create_suite();
    let config = project.write_config(Path::new("ethos-suite"));

    let output = project.rfdeploy(None, &["--config", config.to_str().unwrap(), "-q"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("[CONFIG] ERROR:"));
    assert!(stderr(&output).contains("RFSUITE_CONFIG"));
    assert!(!project.file_exists("sims/x20/rfsuite"));
}

#[test]
fn test_unparseable_config_fails() {
    let project = TestProject::new();
    project.create_file("config.json", "{ not json");
    let output = project.rfdeploy(Some(&project.path().join("config.json")), &[]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("[CONFIG] ERROR:"));
}

#[test]
fn test_default_targets_deploy() {
    let project = TestProject::new();
    project.create_suite();
    let config = project.write_config(Path::new("ethos-suite"));

    let output = project.rfdeploy(Some(&config), &["-q"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(project.file_exists("sims/x20/rfsuite/main.lua"));
    assert!(project.file_exists("sims/x20/rfsuite/app/ui.lua"));
    assert!(project.file_exists("sims/x20/rfsuite/gfx/logo.png"));
    assert!(!project.file_exists("sims/x18"));
    assert!(!project.file_exists("sims/x20/rfsuite.old"));
}

#[test]
fn test_all_targets_deploy() {
    let project = TestProject::new();
    project.create_suite();
    let config = project.write_config(Path::new("ethos-suite"));

    let output = project.rfdeploy(Some(&config), &["--all", "-q"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(project.file_exists("sims/x20/rfsuite/main.lua"));
    assert!(project.file_exists("sims/x18/rfsuite/main.lua"));
}

#[test]
fn test_no_targets_exit_code() {
    let project = TestProject::new();
    project.create_suite();
    let config = project.write_config(Path::new("ethos-suite"));
    project.create_file("override.json", r#"{"deploy_targets": []}"#);

    let output = project.rfdeploy(Some(&config), &["--config", "override.json"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("[DEPLOY] ERROR: No targets."));
}

#[test]
fn test_src_override_missing_reports_sync_error() {
    let project = TestProject::new();
    let config = project.write_config(Path::new("ethos-suite"));

    let output = project.rfdeploy(Some(&config), &["--src", "nowhere", "-q"]);

    // A failed copy is reported but does not change the exit code
    assert_eq!(output.status.code(), Some(0));
    assert!(stderr(&output).contains("[SYNC] ERROR:"));
}

#[test]
fn test_lua_resync_keeps_other_files() {
    let project = TestProject::new();
    project.create_suite();
    project.create_file("sims/x20/rfsuite/stale.lua", "old");
    project.create_file("sims/x20/rfsuite/stale.luac", "old");
    project.create_file("sims/x20/rfsuite/settings.dat", "user data");
    let config = project.write_config(Path::new("ethos-suite"));

    let output = project.rfdeploy(Some(&config), &["--fileext", ".lua", "-q"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(!project.file_exists("sims/x20/rfsuite/stale.lua"));
    assert!(!project.file_exists("sims/x20/rfsuite/stale.luac"));
    assert!(project.file_exists("sims/x20/rfsuite/settings.dat"));
    assert!(project.file_exists("sims/x20/rfsuite/app/ui.lua"));
    assert!(!project.file_exists("sims/x20/rfsuite/gfx/logo.png"));
}

#[test]
fn test_radio_mount_failure_exit_code() {
    let project = TestProject::new();
    project.create_suite();
    let config = project.write_config(&project.path().join("missing-ethos-suite"));

    let output = project.rfdeploy(Some(&config), &["--radio", "-q"]);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr(&output).contains("[ETHOS] ERROR:"));
    assert!(!project.file_exists("sims/x20/rfsuite"));
}

#[cfg(unix)]
#[test]
fn test_radio_deploy_with_vendor_tool() {
    let project = TestProject::new();
    project.create_suite();
    let scripts = project.path().join("radio/scripts");
    std::fs::create_dir_all(&scripts).unwrap();
    let tool = common::fake_ethos_suite(&project, &scripts);
    let config = project.write_config(&tool);

    let output = project.rfdeploy(Some(&config), &["--radio", "--launch", "-q"]);

    assert!(output.status.success(), "stderr: {}", stderr(&output));
    assert!(project.file_exists("radio/scripts/rfsuite/main.lua"));
    assert!(!project.file_exists("sims/x20/rfsuite"));

    let calls: Vec<String> = project
        .read_file("ethos.log")
        .lines()
        .map(str::to_string)
        .collect();
    assert_eq!(calls, ["--serial stop", "--get-path SCRIPTS", "--serial start"]);
}

#[test]
fn test_version_flag() {
    let project = TestProject::new();
    let output = project.rfdeploy(None, &["--version"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("rfdeploy"));
}
