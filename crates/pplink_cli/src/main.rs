//! pplink CLI - Main entry point.
//!
//! Exit codes:
//! - 0: Success
//! - 1: General error
//! - 2: Invalid arguments
//! - 3: Missing prerequisites (configuration keys, az CLI)
//! - 4: Authentication failure
//! - 5: Resource not found
//! - 6: Teardown completed with failures

use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use pplink_config::ConfigError;
use pplink_core::CoreError;
use pplink_platform::PlatformError;

mod commands;

use commands::{Cli, CliError, Commands};

/// CI-friendly exit codes
pub struct ExitCodes;

impl ExitCodes {
    pub const SUCCESS: u8 = 0;
    pub const GENERAL_ERROR: u8 = 1;
    pub const INVALID_ARGS: u8 = 2;
    pub const MISSING_PREREQUISITE: u8 = 3;
    pub const AUTH_FAILURE: u8 = 4;
    pub const NOT_FOUND: u8 = 5;
    pub const TEARDOWN_INCOMPLETE: u8 = 6;
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_filter = if cli.global.verbose {
        "pplink=debug,warn"
    } else if cli.global.quiet {
        "pplink=warn,warn"
    } else {
        "pplink=info,warn"
    };
    let log_result = tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)))
        .try_init();

    if log_result.is_err() {
        // Logging already initialized, continue
    }

    let global = cli.global;
    let result = match cli.command {
        Commands::Link(args) => commands::link::execute(args, &global).await,
        Commands::Unlink(args) => commands::unlink::execute(args, &global).await,
        Commands::Cleanup(args) => commands::cleanup::execute(args, &global).await,
        Commands::Status(args) => commands::status::execute(args, &global).await,
        Commands::Config(args) => commands::config::execute(args, &global).await,
    };

    match result {
        Ok(()) => ExitCode::from(ExitCodes::SUCCESS),
        Err(e) => {
            let exit_code = categorize_error(&e);
            eprintln!("❌ Error: {:#}", e);
            ExitCode::from(exit_code)
        }
    }
}

/// Categorize error to determine exit code
fn categorize_error(e: &anyhow::Error) -> u8 {
    for cause in e.chain() {
        if let Some(err) = cause.downcast_ref::<CliError>() {
            return match err {
                CliError::TeardownIncomplete { .. } => ExitCodes::TEARDOWN_INCOMPLETE,
                CliError::InvalidArgument(_) => ExitCodes::INVALID_ARGS,
            };
        }
        if let Some(err) = cause.downcast_ref::<PlatformError>() {
            return match err {
                PlatformError::Core(core) => categorize_core(core),
                PlatformError::Config(config) => categorize_config(config),
                PlatformError::InvalidResponse { .. } | PlatformError::LinkedElsewhere { .. } => {
                    ExitCodes::GENERAL_ERROR
                }
            };
        }
        if let Some(err) = cause.downcast_ref::<CoreError>() {
            return categorize_core(err);
        }
        if let Some(err) = cause.downcast_ref::<ConfigError>() {
            return categorize_config(err);
        }
    }
    ExitCodes::GENERAL_ERROR
}

fn categorize_core(e: &CoreError) -> u8 {
    match e {
        CoreError::Auth(_) => ExitCodes::AUTH_FAILURE,
        CoreError::NotFound(_) => ExitCodes::NOT_FOUND,
        CoreError::MissingPrerequisite(_) => ExitCodes::MISSING_PREREQUISITE,
        _ => ExitCodes::GENERAL_ERROR,
    }
}

fn categorize_config(e: &ConfigError) -> u8 {
    match e {
        ConfigError::MissingKeys(_) | ConfigError::FileNotFound(_) => ExitCodes::MISSING_PREREQUISITE,
        ConfigError::InvalidKey(_) | ConfigError::InvalidValue { .. } => ExitCodes::INVALID_ARGS,
        ConfigError::Locked(_) | ConfigError::Io(_) => ExitCodes::GENERAL_ERROR,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_mapping() {
        let auth = anyhow::Error::new(CoreError::Auth("az login required".into()));
        assert_eq!(categorize_error(&auth), ExitCodes::AUTH_FAILURE);

        let missing = anyhow::Error::new(PlatformError::Config(ConfigError::MissingKeys(vec![
            "AZURE_SUBSCRIPTION_ID".into(),
        ])));
        assert_eq!(categorize_error(&missing), ExitCodes::MISSING_PREREQUISITE);

        let not_found = anyhow::Error::new(PlatformError::Core(CoreError::NotFound("environment".into())))
            .context("resolving environment");
        assert_eq!(categorize_error(&not_found), ExitCodes::NOT_FOUND);

        let teardown = anyhow::Error::new(CliError::TeardownIncomplete { failed: 1, attempted: 4 });
        assert_eq!(categorize_error(&teardown), ExitCodes::TEARDOWN_INCOMPLETE);

        let other = anyhow::anyhow!("something else");
        assert_eq!(categorize_error(&other), ExitCodes::GENERAL_ERROR);
    }
}
