//! Error types for rfdeploy
//!
//! Domain-specific error types using thiserror.

use std::path::PathBuf;
use thiserror::Error;

/// Configuration document errors
///
/// Always fatal: the process cannot do anything without a valid configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Environment variable naming the config document is not set
    #[error("Environment variable {var} is not set")]
    NotSet { var: String },

    /// Config document does not exist
    #[error("Config file not found at path: {path}")]
    NotFound { path: PathBuf },

    /// Config document could not be read
    #[error("Failed to read config file '{path}': {error}")]
    Read { path: PathBuf, error: String },

    /// Config document is not valid JSON or has the wrong shape
    #[error("Failed to parse JSON config file '{path}': {error}")]
    Parse { path: PathBuf, error: String },

    /// Config document parsed but holds an unusable value
    #[error("Invalid configuration: {message}")]
    Invalid { message: String },
}

/// Vendor tool output did not match the expected line schema
#[derive(Error, Debug, PartialEq, Eq)]
pub enum DeviceParseError {
    /// Fewer lines than the schema requires
    #[error("'{query}' returned {found} lines, schema v{schema} expects at least {expected}")]
    TooFewLines {
        query: String,
        expected: usize,
        found: usize,
        schema: u32,
    },

    /// A row lacks one of its pipe-delimited fields
    #[error("'{query}' line {line} is missing field '{field}'")]
    MissingField {
        query: String,
        line: usize,
        field: String,
    },

    /// USB identifier carries no recognisable vendor/product ids
    #[error("No vendor/product id in USB identifier '{identifier}'")]
    MissingUsbIds { identifier: String },
}

/// Vendor bridge errors
#[derive(Error, Debug)]
pub enum BridgeError {
    /// Vendor binary is not installed where the config says
    #[error("Vendor tool not found: {path}")]
    ToolUnavailable { path: PathBuf },

    /// Tool ran but reported failure: the radio is absent or not queryable
    #[error("Device not connected or not queryable ('{command}' exited with {exit_code:?}): {stderr}")]
    NotConnected {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// Tool did not finish in time
    #[error("'{command}' timed out after {seconds}s")]
    Timeout { command: String, seconds: u64 },

    /// Tool succeeded but printed nothing usable
    #[error("No output from '{command}'")]
    EmptyOutput { command: String },

    /// Spawning or talking to the tool failed
    #[error("IO error running '{command}': {error}")]
    Io { command: String, error: String },

    /// Output did not match the line schema
    #[error("Unexpected output: {0}")]
    Parse(#[from] DeviceParseError),

    /// Scripts path never resolved within the attempt budget
    #[error("Radio drive did not mount after {attempts} attempts: {reason}")]
    MountTimeout { attempts: u32, reason: String },
}

/// Copy engine errors
///
/// Each variant names the path involved so the failing file can be reported.
#[derive(Error, Debug)]
pub enum SyncError {
    /// Source tree does not exist
    #[error("Source folder not found: {path}")]
    SourceMissing { path: PathBuf },

    /// Failed to remove a file or directory
    #[error("Failed to remove '{path}': {error}")]
    Remove { path: PathBuf, error: String },

    /// Failed to create a directory
    #[error("Failed to create directory '{path}': {error}")]
    CreateDir { path: PathBuf, error: String },

    /// Failed to walk a tree
    #[error("Failed to scan '{path}': {error}")]
    Walk { path: PathBuf, error: String },

    /// Failed to copy a single file; the job is incomplete
    #[error("Failed to copy '{path}' ({copied}/{total} files copied): {error}")]
    Copy {
        path: PathBuf,
        copied: u64,
        total: u64,
        error: String,
    },
}

/// Minifier errors
#[derive(Error, Debug)]
pub enum MinifyError {
    /// Minifier binary not installed
    #[error("'{tool}' not found in PATH or %APPDATA%\\npm. Please run: npm install -g luamin")]
    ToolUnavailable { tool: String },

    /// Minifier could not be started
    #[error("Failed to run minifier on '{path}': {error}")]
    Spawn { path: PathBuf, error: String },

    /// Minifier reported failure
    #[error("Failed to minify '{path}' (exit {exit_code:?}): {stderr}")]
    Failed {
        path: PathBuf,
        exit_code: Option<i32>,
        stderr: String,
    },

    /// Minified output could not be written back
    #[error("Failed to write '{path}': {error}")]
    Write { path: PathBuf, error: String },
}

/// Simulator launch errors
#[derive(Error, Debug)]
pub enum SimulatorError {
    /// Target has no simulator command configured
    #[error("No simulator command configured for target '{target}'")]
    NoCommand { target: String },

    /// Shell could not be started
    #[error("Failed to launch '{command}': {error}")]
    Spawn { command: String, error: String },

    /// Simulator exited with failure
    #[error("'{command}' exited with {exit_code:?}")]
    Failed {
        command: String,
        exit_code: Option<i32>,
    },
}

/// Target selection errors
#[derive(Error, Debug)]
pub enum TargetError {
    /// Nothing selected for deployment
    #[error("No targets.")]
    NoTargets,

    /// Interactive chooser ran out of input
    #[error("No target selected (input closed)")]
    InputClosed,

    /// Interactive chooser could not talk to the terminal
    #[error("Target selection failed: {error}")]
    Io { error: String },
}

/// Subsystem named in user-facing failure lines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Component {
    Config,
    Ethos,
    Sync,
    Serial,
    Minify,
    Deploy,
    Sim,
}

impl Component {
    /// Tag printed between brackets
    pub fn tag(self) -> &'static str {
        match self {
            Self::Config => "CONFIG",
            Self::Ethos => "ETHOS",
            Self::Sync => "SYNC",
            Self::Serial => "SERIAL",
            Self::Minify => "MINIFY",
            Self::Deploy => "DEPLOY",
            Self::Sim => "SIM",
        }
    }
}

impl std::fmt::Display for Component {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tag())
    }
}

/// Format a failure line: `[COMPONENT] ERROR: message`
pub fn failure_line(component: Component, message: impl std::fmt::Display) -> String {
    format!("[{component}] ERROR: {message}")
}

/// Print a failure line on stderr
pub fn report(component: Component, message: impl std::fmt::Display) {
    tracing::debug!("{component} failure reported");
    eprintln!("{}", failure_line(component, message));
}
