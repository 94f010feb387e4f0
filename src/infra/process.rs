//! External process invocation
//!
//! Runs a command to completion with captured output and a hard timeout.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

/// Captured result of a finished process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, `None` when killed by a signal
    pub exit_code: Option<i32>,
    /// Captured stdout (lossy UTF-8)
    pub stdout: String,
    /// Captured stderr (lossy UTF-8)
    pub stderr: String,
}

impl ToolOutput {
    /// Whether the process exited with code 0
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Why a process run did not produce a [`ToolOutput`]
#[derive(Debug)]
pub enum RunError {
    /// The process could not be started
    Spawn(std::io::Error),
    /// The process did not exit before the deadline and was killed
    TimedOut,
}

/// Seam over process execution so vendor tool callers can be tested with stubs
pub trait ToolRunner: Send + Sync {
    /// Run `program` with `args`, waiting at most `timeout`
    fn run(&self, program: &Path, args: &[&str], timeout: Duration)
        -> Result<ToolOutput, RunError>;
}

/// Runs real processes
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl ToolRunner for SystemRunner {
    fn run(
        &self,
        program: &Path,
        args: &[&str],
        timeout: Duration,
    ) -> Result<ToolOutput, RunError> {
        run_with_timeout(program, args, timeout)
    }
}

/// Spawn a process and wait for it, killing it after `timeout`
pub fn run_with_timeout(
    program: &Path,
    args: &[&str],
    timeout: Duration,
) -> Result<ToolOutput, RunError> {
    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(RunError::Spawn)?;

    // Drain pipes on threads so a chatty child cannot block on a full pipe
    let stdout = child.stdout.take().map(drain);
    let stderr = child.stderr.take().map(drain);

    let deadline = Instant::now() + timeout;
    let status = loop {
        match child.try_wait().map_err(RunError::Spawn)? {
            Some(status) => break status,
            None if Instant::now() >= deadline => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(RunError::TimedOut);
            }
            None => thread::sleep(Duration::from_millis(20)),
        }
    };

    Ok(ToolOutput {
        exit_code: status.code(),
        stdout: stdout.map(join_output).unwrap_or_default(),
        stderr: stderr.map(join_output).unwrap_or_default(),
    })
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> thread::JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        let _ = pipe.read_to_end(&mut buf);
        buf
    })
}

fn join_output(handle: thread::JoinHandle<Vec<u8>>) -> String {
    handle
        .join()
        .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
        .unwrap_or_default()
}

/// Build the platform shell invocation for a free-form command line
pub fn shell_command(command_line: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.args(["/C", command_line]);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", command_line]);
        cmd
    }
}

/// Resolve an executable: an existing path as given, otherwise a PATH lookup
pub fn resolve_executable(program: &Path) -> Option<PathBuf> {
    if program.components().count() > 1 || program.is_absolute() {
        return program.exists().then(|| program.to_path_buf());
    }
    which::which(program).ok()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[test]
    fn test_captures_stdout_and_exit_code() {
        let out = run_with_timeout(
            Path::new("sh"),
            &["-c", "echo hello; echo oops >&2; exit 3"],
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(out.exit_code, Some(3));
        assert_eq!(out.stdout.trim(), "hello");
        assert_eq!(out.stderr.trim(), "oops");
        assert!(!out.success());
    }

    #[test]
    fn test_times_out_and_kills() {
        let started = Instant::now();
        let result = run_with_timeout(
            Path::new("sh"),
            &["-c", "sleep 10"],
            Duration::from_millis(200),
        );
        assert!(matches!(result, Err(RunError::TimedOut)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[test]
    fn test_missing_program_is_spawn_error() {
        let result = run_with_timeout(
            Path::new("/nonexistent/vendor-tool"),
            &[],
            Duration::from_secs(1),
        );
        assert!(matches!(result, Err(RunError::Spawn(_))));
    }

    #[test]
    fn test_resolve_executable() {
        assert!(resolve_executable(Path::new("sh")).is_some());
        assert!(resolve_executable(Path::new("/nonexistent/tool")).is_none());
    }
}
