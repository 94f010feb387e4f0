//! CLI command implementations
//!
//! Each command is implemented in its own submodule. Commands return the
//! process exit code; an `Err` is reserved for failures of the CLI itself.

pub mod deploy;
pub mod info;
pub mod ports;
pub mod tail;

use anyhow::Result;
use clap::Subcommand;
use std::path::{Path, PathBuf};
use tokio::runtime::Handle;
use tokio_util::sync::CancellationToken;

use crate::core::config::DeployConfig;
use crate::error::{report, Component};

/// Available CLI commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show the connected radio's identity, drive paths and mode
    Info,

    /// List serial ports visible to this machine
    Ports,

    /// Switch the radio to serial mode and stream its debug log
    Tail {
        /// Do not send `--serial start` first
        #[arg(long)]
        no_start: bool,
    },
}

impl Commands {
    /// Execute the command
    pub async fn run(self, config: Option<PathBuf>) -> Result<i32> {
        match self {
            Self::Info => info::execute(config).await,
            Self::Ports => ports::execute().await,
            Self::Tail { no_start } => tail::execute(config, no_start).await,
        }
    }
}

/// Load the configuration, reporting a `[CONFIG]` failure on error
pub(crate) fn load_config(override_path: Option<&Path>) -> Option<DeployConfig> {
    match DeployConfig::from_env(override_path) {
        Ok(config) => {
            tracing::debug!("Loaded config for '{}'", config.tgt_name);
            Some(config)
        }
        Err(e) => {
            report(Component::Config, e);
            None
        }
    }
}

/// Token cancelled on the first Ctrl-C
pub(crate) fn cancel_on_ctrl_c(runtime: &Handle) -> CancellationToken {
    let token = CancellationToken::new();
    let trigger = token.clone();
    runtime.spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::debug!("Ctrl-C received, stopping");
            trigger.cancel();
        }
    });
    token
}
