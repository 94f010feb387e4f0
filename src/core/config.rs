//! Deploy configuration document
//!
//! The configuration is a JSON document named by the `RFSUITE_CONFIG`
//! environment variable and read once at startup. A second document given with
//! `--config` is merged over it key by key.

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::config::defaults;
use crate::error::ConfigError;

/// One place a copy job can write to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentTarget {
    /// Display name
    pub name: String,
    /// Folder that receives `<tgt_name>/`
    #[serde(rename = "dest")]
    pub destination: PathBuf,
    /// Command that starts the simulator for this target
    #[serde(default, rename = "simulator")]
    pub simulator_command: Option<String>,
    /// Selected when neither `--all` nor `--choose` is given
    #[serde(default, rename = "default")]
    pub is_default: bool,
}

impl DeploymentTarget {
    /// Target for a mounted radio drive
    pub fn radio(scripts_path: PathBuf) -> Self {
        Self {
            name: "Radio".to_string(),
            destination: scripts_path,
            simulator_command: None,
            is_default: false,
        }
    }
}

/// Parsed configuration document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Checkout root holding `scripts/<tgt_name>`
    pub git_src: PathBuf,
    /// Name of the suite folder (e.g. `rfsuite`)
    pub tgt_name: String,
    /// Configured targets
    #[serde(default)]
    pub deploy_targets: Vec<DeploymentTarget>,
    /// Vendor tool (Ethos Suite) executable
    pub ethossuite_bin: PathBuf,

    /// Serial vendor id (hex)
    #[serde(default = "default_vid", deserialize_with = "hex_id")]
    pub serial_vid: String,
    /// Serial product id (hex)
    #[serde(default = "default_pid", deserialize_with = "hex_id")]
    pub serial_pid: String,
    /// Serial baud rate
    #[serde(default = "default_baud")]
    pub serial_baud: u32,
    /// Port discovery attempts
    #[serde(default = "default_serial_retries")]
    pub serial_retries: u32,
    /// Delay between serial attempts, seconds
    #[serde(default = "default_serial_delay")]
    pub serial_retry_delay: f64,
    /// Extra description hint for port matching
    #[serde(default = "default_name_hint")]
    pub serial_name_hint: String,

    /// Attempts to resolve the SCRIPTS path after disabling serial
    #[serde(default = "default_mount_attempts")]
    pub mount_attempts: u32,
    /// Delay between mount attempts, seconds
    #[serde(default = "default_mount_delay")]
    pub mount_retry_delay: f64,
    /// Lua minifier executable
    #[serde(default)]
    pub minifier_bin: Option<PathBuf>,
}

fn default_vid() -> String {
    defaults::DEFAULT_SERIAL_VID.to_string()
}
fn default_pid() -> String {
    defaults::DEFAULT_SERIAL_PID.to_string()
}
fn default_baud() -> u32 {
    defaults::DEFAULT_SERIAL_BAUD
}
fn default_serial_retries() -> u32 {
    defaults::DEFAULT_SERIAL_RETRIES
}
fn default_serial_delay() -> f64 {
    defaults::DEFAULT_SERIAL_RETRY_DELAY
}
fn default_name_hint() -> String {
    defaults::DEFAULT_SERIAL_NAME_HINT.to_string()
}
fn default_mount_attempts() -> u32 {
    defaults::DEFAULT_MOUNT_ATTEMPTS
}
fn default_mount_delay() -> f64 {
    defaults::DEFAULT_MOUNT_RETRY_DELAY
}

/// Accept ids written either as `"0483"` or as a bare number `483`
fn hex_id<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Text(String),
        Number(u64),
    }
    Ok(match Raw::deserialize(deserializer)? {
        Raw::Text(s) => s,
        Raw::Number(n) => n.to_string(),
    })
}

impl DeployConfig {
    /// Load the document named by the environment, merging `override_path` over it
    pub fn load(
        env_path: Option<&Path>,
        override_path: Option<&Path>,
    ) -> Result<Self, ConfigError> {
        let Some(base_path) = env_path else {
            return Err(ConfigError::NotSet {
                var: defaults::CONFIG_ENV.to_string(),
            });
        };

        let mut doc = read_document(base_path)?;
        if let Some(extra) = override_path.filter(|p| *p != base_path) {
            tracing::info!("Merging config overrides from {}", extra.display());
            merge_top_level(&mut doc, read_document(extra)?);
        }

        let config: Self = serde_json::from_value(doc).map_err(|e| ConfigError::Parse {
            path: base_path.to_path_buf(),
            error: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Load from the environment variable, honoring an optional override file
    pub fn from_env(override_path: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = std::env::var_os(defaults::CONFIG_ENV).map(PathBuf::from);
        Self::load(env_path.as_deref(), override_path)
    }

    /// Parse a document from a JSON string
    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(content).map_err(|e| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            error: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.tgt_name.trim().is_empty() {
            return Err(ConfigError::Invalid {
                message: "tgt_name must not be empty".to_string(),
            });
        }
        for (key, value) in [
            ("serial_retry_delay", self.serial_retry_delay),
            ("mount_retry_delay", self.mount_retry_delay),
        ] {
            let in_range = Duration::try_from_secs_f64(value)
                .is_ok_and(|_| value <= defaults::MAX_RETRY_DELAY);
            if !in_range {
                return Err(ConfigError::Invalid {
                    message: format!(
                        "{key} must be between 0 and {} seconds",
                        defaults::MAX_RETRY_DELAY
                    ),
                });
            }
        }
        Ok(())
    }

    /// Source tree to deploy: `<src>/scripts/<tgt_name>`
    pub fn source_root(&self, src_override: Option<&Path>) -> PathBuf {
        src_override
            .unwrap_or(&self.git_src)
            .join("scripts")
            .join(&self.tgt_name)
    }

    /// Folder the suite occupies inside a target
    pub fn output_dir(&self, target: &DeploymentTarget) -> PathBuf {
        target.destination.join(&self.tgt_name)
    }

    /// Delay between serial attempts
    pub fn serial_delay(&self) -> Duration {
        seconds(self.serial_retry_delay)
    }

    /// Delay between mount attempts
    pub fn mount_delay(&self) -> Duration {
        seconds(self.mount_retry_delay)
    }
}

/// Clamp to the accepted range; negative values become zero
fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.min(defaults::MAX_RETRY_DELAY)).unwrap_or_default()
}

fn read_document(path: &Path) -> Result<Value, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
        path: path.to_path_buf(),
        error: e.to_string(),
    })?;
    serde_json::from_str(&content).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        error: e.to_string(),
    })
}

fn merge_top_level(base: &mut Value, overrides: Value) {
    match (base, overrides) {
        (Value::Object(base), Value::Object(overrides)) => {
            for (key, value) in overrides {
                base.insert(key, value);
            }
        }
        (base, overrides) => *base = overrides,
    }
}
