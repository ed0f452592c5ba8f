//! CLI command definitions.
//!
//! This module defines the command structure for the pplink CLI.
//! Each subcommand maps to one flow against the two control planes.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use thiserror::Error;

pub mod cleanup;
pub mod config;
pub mod link;
pub mod session;
pub mod status;
pub mod unlink;

/// pplink - Power Platform enterprise policy link and teardown
#[derive(Parser)]
#[command(name = "pplink")]
#[command(version, about = "pplink - Power Platform enterprise policy link and teardown")]
#[command(long_about = r#"
pplink links Power Platform environments to network injection enterprise
policies and tears the whole setup down again, keeping deployment state in a
KEY=VALUE configuration file between runs.

COMMANDS:
  link     → Resolve environment and policy, link them, record their ids
  unlink   → Unlink the policy from the environment
  cleanup  → Unlink, delete environment, delete policy, delete resource group
  status   → Show configuration and the environment's network policy
  config   → Show or edit the configuration file

EXIT CODES:
  0 - Success
  1 - General error
  2 - Invalid arguments
  3 - Missing prerequisites (configuration keys, az CLI)
  4 - Authentication failure
  5 - Resource not found
  6 - Teardown completed with failures
"#)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Configuration file
    #[arg(long, global = true, env = "PPLINK_ENV_FILE", default_value = ".env")]
    pub env_file: PathBuf,

    /// Skip confirmation prompts
    #[arg(short, long, global = true)]
    pub force: bool,

    /// Enable verbose output
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    pub verbose: bool,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Run `az login` when no token can be obtained
    #[arg(long, global = true)]
    pub allow_login: bool,

    /// Seconds between status checks of long-running operations
    #[arg(long, global = true, value_parser = clap::value_parser!(u64).range(1..))]
    pub poll_interval: Option<u64>,

    /// Status checks before giving up on a long-running operation
    #[arg(long, global = true, value_parser = clap::value_parser!(u32).range(1..))]
    pub max_attempts: Option<u32>,

    /// Resource Manager base URL
    #[arg(long, global = true, env = "PPLINK_ARM_ENDPOINT", hide = true)]
    pub arm_endpoint: Option<String>,

    /// Power Platform admin API base URL
    #[arg(long, global = true, env = "PPLINK_ADMIN_ENDPOINT", hide = true)]
    pub admin_endpoint: Option<String>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Link the environment to its enterprise policy
    Link(link::LinkArgs),

    /// Unlink the enterprise policy from the environment
    Unlink(unlink::UnlinkArgs),

    /// Tear down the environment, policy and resource group
    Cleanup(cleanup::CleanupArgs),

    /// Show configuration and current link state
    Status(status::StatusArgs),

    /// Show or edit the configuration file
    Config(config::ConfigArgs),
}

/// Errors raised by the CLI layer itself.
#[derive(Error, Debug)]
pub enum CliError {
    #[error("{failed} of {attempted} teardown steps failed")]
    TeardownIncomplete { failed: usize, attempted: usize },

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "pplink",
            "cleanup",
            "--force",
            "--env-file",
            "deploy/.env",
            "--skip-resource-group",
            "--poll-interval",
            "5",
        ])
        .unwrap();

        assert!(cli.global.force);
        assert_eq!(cli.global.env_file, PathBuf::from("deploy/.env"));
        assert_eq!(cli.global.poll_interval, Some(5));
        match cli.command {
            Commands::Cleanup(args) => assert!(args.skip_resource_group),
            _ => panic!("expected cleanup"),
        }
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        assert!(Cli::try_parse_from(["pplink", "link", "--poll-interval", "0"]).is_err());
    }

    #[test]
    fn test_config_set_parses() {
        let cli = Cli::try_parse_from(["pplink", "config", "set", "RESOURCE_GROUP", "rg-test"]).unwrap();
        match cli.command {
            Commands::Config(args) => match args.action {
                config::ConfigAction::Set { key, value } => {
                    assert_eq!(key, "RESOURCE_GROUP");
                    assert_eq!(value, "rg-test");
                }
                _ => panic!("expected set"),
            },
            _ => panic!("expected config"),
        }
    }
}
