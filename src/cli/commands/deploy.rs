//! CLI command implementation for the default deploy action

use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::runtime::Handle;

use super::{cancel_on_ctrl_c, load_config};
use crate::cli::output::{copy_progress, status};
use crate::cli::DeployArgs;
use crate::core::bridge::VendorBridge;
use crate::core::orchestrator::{DeployOptions, DeployOrchestrator, DeployReport};
use crate::core::simulator::ShellLauncher;
use crate::core::sync::SyncMode;
use crate::core::tail::SerialTailer;
use crate::core::targets::Selection;
use crate::infra::serial::SystemSerial;

impl From<DeployArgs> for DeployOptions {
    fn from(args: DeployArgs) -> Self {
        Self {
            source_override: args.src,
            mode: SyncMode::from_fileext(args.fileext.as_deref()),
            selection: Selection::from_flags(args.all, args.choose),
            launch: args.launch,
            radio: args.radio,
            radio_debug: args.radio_debug,
            minify: args.minify,
        }
    }
}

/// Execute a deploy
pub async fn execute(config_path: Option<PathBuf>, args: DeployArgs) -> Result<i32> {
    let Some(config) = load_config(config_path.as_deref()) else {
        return Ok(1);
    };
    let options = DeployOptions::from(args);

    // Ctrl-C keeps its default effect until the log tail starts
    let runtime = Handle::current();
    let report = tokio::task::spawn_blocking(move || {
        let bridge = VendorBridge::new(&config.ethossuite_bin);
        let serial = SystemSerial;
        let tailer = SerialTailer::new(&serial, &serial);
        let cancel = Box::new(move || cancel_on_ctrl_c(&runtime));
        let mut orchestrator =
            DeployOrchestrator::new(&config, &bridge, &ShellLauncher, &tailer, cancel)
                .with_progress(Box::new(copy_progress));
        orchestrator.run(&options)
    })
    .await
    .context("Deploy task failed")?;

    print_summary(&report);
    Ok(report.exit_code)
}

fn print_summary(report: &DeployReport) {
    for outcome in &report.targets {
        match &outcome.copy {
            Ok(result) if result.skipped > 0 => println!(
                "{} {}: {} copied, {} up to date",
                status::SUCCESS,
                outcome.name,
                result.copied,
                result.skipped
            ),
            Ok(result) => println!(
                "{} {}: {}/{} files",
                status::SUCCESS,
                outcome.name,
                result.copied,
                result.total
            ),
            Err(_) => println!("{} {}: incomplete", status::ERROR, outcome.name),
        }
    }
    if let Some(stats) = report.minify {
        println!(
            "{} Minified {}/{} Lua files",
            status::INFO,
            stats.minified,
            stats.processed
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_to_options() {
        let options = DeployOptions::from(DeployArgs {
            fileext: Some("fast".to_string()),
            choose: true,
            radio: true,
            ..DeployArgs::default()
        });
        assert_eq!(options.mode, SyncMode::Fast);
        assert_eq!(options.selection, Selection::Choose);
        assert!(options.radio);
        assert!(!options.minify);
    }
}
