//! CLI command implementation for `rfdeploy tail`

use anyhow::{Context, Result};
use std::path::PathBuf;
use tokio::runtime::Handle;

use super::{cancel_on_ctrl_c, load_config};
use crate::core::bridge::{DeviceBridge, SerialAction, VendorBridge};
use crate::core::orchestrator::tail_message;
use crate::core::tail::{SerialTailer, TailExit, TailRequest};
use crate::error::{report, Component};
use crate::infra::serial::SystemSerial;

/// Execute the tail command
pub async fn execute(config_path: Option<PathBuf>, no_start: bool) -> Result<i32> {
    let Some(config) = load_config(config_path.as_deref()) else {
        return Ok(1);
    };
    let token = cancel_on_ctrl_c(&Handle::current());

    let exit = tokio::task::spawn_blocking(move || {
        if !no_start {
            let bridge = VendorBridge::new(&config.ethossuite_bin);
            if !bridge.set_serial_mode(SerialAction::Start, None).success() {
                println!("[ETHOS] First --serial start failed; retrying once…");
                bridge.set_serial_mode(SerialAction::Start, None);
            }
        }
        let serial = SystemSerial;
        SerialTailer::new(&serial, &serial).tail(
            &TailRequest::from_config(&config),
            &token,
            |line| println!("{line}"),
        )
    })
    .await
    .context("Serial tail task failed")?;

    match &exit {
        TailExit::StoppedByUser => println!("[SERIAL] Stopped by user."),
        other => report(Component::Serial, tail_message(other)),
    }
    Ok(exit.exit_code())
}
