//! Command-line interface module
//!
//! This module handles argument parsing and output formatting.
//! It contains no deploy logic - that belongs in the [`crate::core`] module.

pub mod commands;
pub mod output;

use anyhow::Result;
use clap::{Args, Parser};
use std::path::PathBuf;

use commands::Commands;

/// Long version string with build metadata
const LONG_VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    "\ncommit: ",
    env!("VERGEN_GIT_SHA"),
    "\nbuilt: ",
    env!("VERGEN_BUILD_TIMESTAMP"),
);

/// rfdeploy - deploy Lua suites to Ethos radios and simulators
///
/// Copies `<src>/scripts/<tgt_name>` to the configured targets, or to a
/// connected radio with `--radio`. The configuration file is named by the
/// `RFSUITE_CONFIG` environment variable.
#[derive(Parser, Debug)]
#[command(name = "rfdeploy")]
#[command(author, version, long_version = LONG_VERSION, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    /// Enable verbose output (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress progress output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Extra config file merged over the RFSUITE_CONFIG document
    #[arg(long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(flatten)]
    pub deploy: DeployArgs,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Flags of the default deploy action
#[derive(Args, Debug, Clone, Default)]
pub struct DeployArgs {
    /// Checkout root to deploy from instead of `git_src`
    #[arg(long, value_name = "DIR")]
    pub src: Option<PathBuf>,

    /// Only resync files with this extension (e.g. `.lua`), or `fast` for
    /// an incremental copy of new and changed files
    #[arg(long, value_name = "EXT")]
    pub fileext: Option<String>,

    /// Deploy to every configured target
    #[arg(long)]
    pub all: bool,

    /// Pick one target from a menu
    #[arg(long)]
    pub choose: bool,

    /// Launch simulators after copying
    #[arg(long)]
    pub launch: bool,

    /// Deploy to the connected radio
    #[arg(long)]
    pub radio: bool,

    /// After deploying to the radio, tail its serial debug log
    #[arg(long)]
    pub radio_debug: bool,

    /// Minify deployed Lua files with luamin
    #[arg(long)]
    pub minify: bool,
}

impl Cli {
    /// Execute the CLI command, returning the process exit code
    pub async fn run(self) -> Result<i32> {
        match self.command {
            Some(cmd) => cmd.run(self.config).await,
            None => commands::deploy::execute(self.config, self.deploy).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_deploy_flags_parse() {
        let cli = Cli::try_parse_from([
            "rfdeploy",
            "--radio",
            "--radio-debug",
            "--fileext",
            ".lua",
            "-vv",
        ])
        .unwrap();
        assert!(cli.deploy.radio);
        assert!(cli.deploy.radio_debug);
        assert_eq!(cli.deploy.fileext.as_deref(), Some(".lua"));
        assert_eq!(cli.verbose, 2);
        assert!(cli.command.is_none());
    }

    #[test]
    fn test_subcommand_with_global_config() {
        let cli = Cli::try_parse_from(["rfdeploy", "tail", "--config", "extra.json"]).unwrap();
        assert!(matches!(cli.command, Some(Commands::Tail { .. })));
        assert_eq!(cli.config, Some(PathBuf::from("extra.json")));
    }

    #[test]
    fn test_deploy_flags_conflict_with_subcommand() {
        assert!(Cli::try_parse_from(["rfdeploy", "--all", "ports"]).is_err());
    }
}
