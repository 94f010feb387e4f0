//! Simulator launch after a local deploy

use super::config::DeploymentTarget;
use crate::error::SimulatorError;
use crate::infra::process::shell_command;

/// Starts a target's simulator
pub trait SimulatorLauncher: Send + Sync {
    /// Run the simulator and wait for it to exit
    fn launch(&self, target: &DeploymentTarget) -> Result<(), SimulatorError>;
}

/// Runs the configured command line through the platform shell
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellLauncher;

impl SimulatorLauncher for ShellLauncher {
    fn launch(&self, target: &DeploymentTarget) -> Result<(), SimulatorError> {
        let command = target
            .simulator_command
            .as_deref()
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| SimulatorError::NoCommand {
                target: target.name.clone(),
            })?;

        println!("[SIM] Launching {}: {command}", target.name);
        let status = shell_command(command)
            .status()
            .map_err(|e| SimulatorError::Spawn {
                command: command.to_string(),
                error: e.to_string(),
            })?;

        if !status.success() {
            return Err(SimulatorError::Failed {
                command: command.to_string(),
                exit_code: status.code(),
            });
        }
        tracing::debug!("Simulator for {} exited", target.name);
        Ok(())
    }
}
