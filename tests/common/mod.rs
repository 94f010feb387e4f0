//! Common test utilities and helpers
//!
//! This module provides shared utilities for integration tests.

use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

/// Test workspace context
///
/// Creates a temporary directory holding a source checkout, simulator
/// folders and a config document pointing at them.
pub struct TestProject {
    /// Temporary directory for the test workspace
    pub dir: TempDir,
}

#[allow(dead_code)]
impl TestProject {
    /// Create a new test workspace in a temporary directory
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Get the path to the test workspace directory
    pub fn path(&self) -> PathBuf {
        self.dir.path().to_path_buf()
    }

    /// Create a file in the test workspace
    pub fn create_file(&self, name: &str, content: &str) {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent directories");
        }
        std::fs::write(path, content).expect("Failed to write file");
    }

    /// Check if a file exists in the test workspace
    pub fn file_exists(&self, name: &str) -> bool {
        self.dir.path().join(name).exists()
    }

    /// Read a file from the test workspace
    pub fn read_file(&self, name: &str) -> String {
        std::fs::read_to_string(self.dir.path().join(name)).expect("Failed to read file")
    }

    /// Populate `git/scripts/rfsuite` with a small suite
    pub fn create_suite(&self) {
        self.create_file("git/scripts/rfsuite/main.lua", "return { init = true }\n");
        self.create_file("git/scripts/rfsuite/app/ui.lua", "local ui = {}\nreturn ui\n");
        self.create_file("git/scripts/rfsuite/gfx/logo.png", "PNG");
    }

    /// Write `config.json` with two simulator targets (x20 default)
    pub fn write_config(&self, ethossuite_bin: &Path) -> PathBuf {
        let config = serde_json::json!({
            "git_src": self.path().join("git"),
            "tgt_name": "rfsuite",
            "ethossuite_bin": ethossuite_bin,
            "serial_retries": 1,
            "serial_retry_delay": 0,
            "mount_attempts": 2,
            "mount_retry_delay": 0,
            "deploy_targets": [
                {"name": "x20", "dest": self.path().join("sims/x20"), "default": true},
                {"name": "x18", "dest": self.path().join("sims/x18")}
            ]
        });
        let path = self.path().join("config.json");
        std::fs::write(&path, config.to_string()).expect("Failed to write config");
        path
    }

    /// Run the rfdeploy binary with `RFSUITE_CONFIG` set to `config`
    pub fn rfdeploy(&self, config: Option<&Path>, args: &[&str]) -> Output {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_rfdeploy"));
        cmd.current_dir(self.path());
        cmd.env_remove("RFSUITE_CONFIG");
        cmd.env_remove("RUST_LOG");
        if let Some(config) = config {
            cmd.env("RFSUITE_CONFIG", config);
        }
        cmd.args(args);
        cmd.output().expect("Failed to execute rfdeploy")
    }
}

impl Default for TestProject {
    fn default() -> Self {
        Self::new()
    }
}

/// Write an executable shell script standing in for Ethos Suite
///
/// `--get-path SCRIPTS` prints `scripts`; every other call succeeds silently.
#[cfg(unix)]
#[allow(dead_code)]
pub fn fake_ethos_suite(project: &TestProject, scripts: &Path) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = project.path().join("ethos-suite");
    let script = format!(
        "#!/bin/sh\n\
         echo \"$@\" >> \"{log}\"\n\
         if [ \"$1\" = \"--get-path\" ]; then\n\
           echo 'Ethos Suite CLI'\n\
           echo '{scripts}'\n\
           echo 'exit code 0'\n\
         fi\n\
         exit 0\n",
        log = project.path().join("ethos.log").display(),
        scripts = scripts.display()
    );
    std::fs::write(&path, script).expect("Failed to write fake tool");
    let mut perms = std::fs::metadata(&path).expect("stat").permissions();
    perms.set_mode(0o755);
    std::fs::set_permissions(&path, perms).expect("chmod");
    path
}
