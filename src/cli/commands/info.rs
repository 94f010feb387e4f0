//! CLI command implementation for `rfdeploy info`

use anyhow::{Context, Result};
use std::path::PathBuf;

use super::load_config;
use crate::cli::output::{create_spinner, status};
use crate::core::bridge::{DeviceBridge, VendorBridge};
use crate::core::device::DeviceInfo;
use crate::core::locator::SerialLocator;
use crate::error::{report, Component};
use crate::infra::serial::SystemSerial;

/// Execute the info command
pub async fn execute(config_path: Option<PathBuf>) -> Result<i32> {
    let Some(config) = load_config(config_path.as_deref()) else {
        return Ok(1);
    };

    let spinner = create_spinner("Querying radio…");
    let result = tokio::task::spawn_blocking(move || {
        let bridge = VendorBridge::new(&config.ethossuite_bin);
        bridge.query_device_info().map(|info| {
            if info.in_debug_mode {
                let port = SerialLocator::new(&SystemSerial).find_port(
                    Some(config.serial_vid.as_str()),
                    Some(config.serial_pid.as_str()),
                    Some(config.serial_name_hint.as_str()),
                );
                info.with_serial_port(port)
            } else {
                info
            }
        })
    })
    .await
    .context("Device query task failed")?;
    spinner.finish_and_clear();

    match result {
        Ok(info) => {
            print_info(&info);
            Ok(0)
        }
        Err(e) => {
            report(Component::Ethos, e);
            Ok(1)
        }
    }
}

fn print_info(info: &DeviceInfo) {
    println!("{} {}", status::SUCCESS, info.product);
    println!("  USB:     {} ({}:{})", info.usb_identifier, info.vid_hex(), info.pid_hex());
    let mode = if info.in_debug_mode {
        "serial debug"
    } else {
        "mass storage"
    };
    println!("  Mode:    {mode}");
    if let Some(paths) = &info.mounted_paths {
        for (name, path) in [
            ("Bitmaps", &paths.bitmaps),
            ("Scripts", &paths.scripts),
            ("Shots", &paths.screenshots),
            ("Audio", &paths.audio),
            ("I18n", &paths.i18n),
        ] {
            println!("  {:<8} {}", format!("{name}:"), path.display());
        }
    }
    match (&info.serial_port, info.in_debug_mode) {
        (Some(port), _) => println!("  Serial:  {port}"),
        (None, true) => println!("  {} Serial port not found", status::WARNING),
        (None, false) => {}
    }
}
