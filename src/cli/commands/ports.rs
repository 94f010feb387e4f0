//! CLI command implementation for `rfdeploy ports`

use anyhow::{Context, Result};

use crate::cli::output::status;
use crate::core::locator::SerialLocator;
use crate::infra::serial::{PortDescriptor, SystemSerial};

/// Execute the ports command
pub async fn execute() -> Result<i32> {
    let ports = tokio::task::spawn_blocking(|| SerialLocator::new(&SystemSerial).ports())
        .await
        .context("Port enumeration task failed")?;

    if ports.is_empty() {
        println!("{} No serial ports found", status::INFO);
        return Ok(0);
    }
    for port in &ports {
        println!("{}", format_port(port));
    }
    Ok(0)
}

fn format_port(port: &PortDescriptor) -> String {
    let ids = match (port.vid, port.pid) {
        (Some(vid), Some(pid)) => format!("{vid:04x}:{pid:04x}"),
        _ => "----:----".to_string(),
    };
    let mut line = format!("{:<16} {ids}  {}", port.name, port.description);
    if let Some(interface) = &port.interface {
        line.push_str(&format!(" [{interface}]"));
    }
    line.trim_end().to_string()
}
