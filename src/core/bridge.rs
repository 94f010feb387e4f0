//! Ethos Suite vendor tool bridge
//!
//! Wraps the vendor CLI that reports radio drive paths and switches a radio
//! between mass-storage and serial debug mode. Every call is synchronous with
//! a timeout. Query failures are typed so callers can tell "radio not
//! connected" apart from a broken installation.

use std::path::{Path, PathBuf};
use std::time::Duration;

use super::device::{parse_get_path, parse_radio_listing, DeviceInfo};
use crate::config::defaults;
use crate::error::BridgeError;
use crate::infra::process::{RunError, SystemRunner, ToolOutput, ToolRunner};
use crate::infra::retry::RetryPolicy;

/// Serial debug mode toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SerialAction {
    /// Expose the serial debug endpoint
    Start,
    /// Return to mass storage
    Stop,
}

impl SerialAction {
    /// Argument passed to `--serial`
    pub fn as_arg(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Stop => "stop",
        }
    }
}

/// Result of a mode toggle; never an error
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialModeOutcome {
    /// Tool exit code (1 when the tool could not be run)
    pub exit_code: i32,
    /// Trimmed stdout
    pub stdout: String,
    /// Trimmed stderr, or the spawn failure
    pub stderr: String,
}

impl SerialModeOutcome {
    /// Whether the tool reported success
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Operations the deploy flow needs from the radio
pub trait DeviceBridge: Send + Sync {
    /// Resolve the radio's SCRIPTS folder, retrying `retries` times
    fn get_scripts_path(&self, retries: u32, delay: Duration) -> Result<PathBuf, BridgeError>;

    /// Switch serial debug mode on or off
    fn set_serial_mode(&self, action: SerialAction, radio: Option<&str>) -> SerialModeOutcome;

    /// Read the radio's current identity, paths and mode
    fn query_device_info(&self) -> Result<DeviceInfo, BridgeError>;
}

/// Bridge backed by the Ethos Suite executable
pub struct VendorBridge {
    bin: PathBuf,
    runner: Box<dyn ToolRunner>,
}

impl std::fmt::Debug for VendorBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VendorBridge").field("bin", &self.bin).finish()
    }
}

impl VendorBridge {
    /// Bridge running the real tool at `bin`
    pub fn new(bin: &Path) -> Self {
        Self::with_runner(bin, Box::new(SystemRunner))
    }

    /// Bridge with a custom process runner
    pub fn with_runner(bin: &Path, runner: Box<dyn ToolRunner>) -> Self {
        Self {
            bin: bin.to_path_buf(),
            runner,
        }
    }

    /// Vendor tool path
    pub fn bin(&self) -> &Path {
        &self.bin
    }

    fn command_line(&self, args: &[&str]) -> String {
        format!("{} {}", self.bin.display(), args.join(" "))
    }

    /// Run a query, mapping every failure mode to a [`BridgeError`]
    fn query(&self, args: &[&str], timeout: Duration) -> Result<ToolOutput, BridgeError> {
        let command = self.command_line(args);
        tracing::debug!("Running {command}");

        let output = self
            .runner
            .run(&self.bin, args, timeout)
            .map_err(|e| match e {
                RunError::Spawn(e) if e.kind() == std::io::ErrorKind::NotFound => {
                    BridgeError::ToolUnavailable {
                        path: self.bin.clone(),
                    }
                }
                RunError::Spawn(e) => BridgeError::Io {
                    command: command.clone(),
                    error: e.to_string(),
                },
                RunError::TimedOut => BridgeError::Timeout {
                    command: command.clone(),
                    seconds: timeout.as_secs(),
                },
            })?;

        if !output.success() {
            return Err(BridgeError::NotConnected {
                command,
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            });
        }
        Ok(output)
    }

    fn scripts_path_once(&self) -> Result<PathBuf, BridgeError> {
        let args = ["--get-path", "SCRIPTS"];
        let output = self.query(&args, defaults::GET_PATH_TIMEOUT)?;
        parse_get_path(&output.stdout).ok_or_else(|| BridgeError::EmptyOutput {
            command: self.command_line(&args),
        })
    }
}

impl DeviceBridge for VendorBridge {
    fn get_scripts_path(&self, retries: u32, delay: Duration) -> Result<PathBuf, BridgeError> {
        let policy = RetryPolicy::with_retries(retries, delay);
        policy
            .run(|attempt| {
                self.scripts_path_once().map_err(|e| {
                    if attempt < policy.max_attempts() {
                        println!(
                            "[ETHOS] Could not get SCRIPTS path (attempt {attempt}/{}). Retrying in {:.1}s…",
                            policy.max_attempts(),
                            delay.as_secs_f64()
                        );
                    }
                    tracing::debug!("SCRIPTS path attempt {attempt} failed: {e}");
                    e
                })
            })
            .map(|path| {
                tracing::info!("Radio SCRIPTS path: {}", path.display());
                path
            })
            .map_err(|exhausted| BridgeError::MountTimeout {
                attempts: exhausted.attempts,
                reason: exhausted.last_error.to_string(),
            })
    }

    fn set_serial_mode(&self, action: SerialAction, radio: Option<&str>) -> SerialModeOutcome {
        let mut args = vec!["--serial", action.as_arg()];
        if let Some(radio) = radio {
            args.extend(["--radio", radio]);
        }

        match self
            .runner
            .run(&self.bin, &args, defaults::SERIAL_TOGGLE_TIMEOUT)
        {
            Ok(output) => {
                let outcome = SerialModeOutcome {
                    exit_code: output.exit_code.unwrap_or(1),
                    stdout: output.stdout.trim().to_string(),
                    stderr: output.stderr.trim().to_string(),
                };
                if !outcome.stdout.is_empty() {
                    println!("{}", outcome.stdout);
                }
                if !outcome.stderr.is_empty() {
                    eprintln!("{}", outcome.stderr);
                }
                outcome
            }
            Err(e) => {
                let error = match e {
                    RunError::Spawn(e) => e.to_string(),
                    RunError::TimedOut => format!(
                        "timed out after {}s",
                        defaults::SERIAL_TOGGLE_TIMEOUT.as_secs()
                    ),
                };
                eprintln!("[ETHOS] --serial {} failed: {error}", action.as_arg());
                SerialModeOutcome {
                    exit_code: 1,
                    stdout: String::new(),
                    stderr: error,
                }
            }
        }
    }

    fn query_device_info(&self) -> Result<DeviceInfo, BridgeError> {
        let listing = self.query(&["--list-radio"], defaults::LISTING_TIMEOUT)?;
        let radio = parse_radio_listing(&listing.stdout)?;
        let paths = self.query(&["--radio-path"], defaults::LISTING_TIMEOUT)?;
        Ok(DeviceInfo::from_radio(radio, &paths.stdout)?)
    }
}
