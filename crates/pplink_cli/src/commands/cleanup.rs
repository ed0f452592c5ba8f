//! Cleanup command - Tear down everything pplink set up.

use anyhow::Result;
use clap::Args;
use tracing::info;

use pplink_platform::{cleanup_plan, CleanupContext, CleanupOptions};

use super::{session, CliError, GlobalArgs};

#[derive(Args, Debug)]
pub struct CleanupArgs {
    /// Do not unlink the enterprise policy
    #[arg(long)]
    pub skip_unlink: bool,

    /// Do not delete the Power Platform environment
    #[arg(long)]
    pub skip_environment: bool,

    /// Do not delete the enterprise policy
    #[arg(long)]
    pub skip_policy: bool,

    /// Do not delete the resource group
    #[arg(long)]
    pub skip_resource_group: bool,

    /// Remove generated identifiers from the configuration file afterwards
    #[arg(long)]
    pub reset_config: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

impl From<&CleanupArgs> for CleanupOptions {
    fn from(args: &CleanupArgs) -> Self {
        Self {
            skip_unlink: args.skip_unlink,
            skip_environment: args.skip_environment,
            skip_policy: args.skip_policy,
            skip_resource_group: args.skip_resource_group,
            reset_config: args.reset_config,
        }
    }
}

pub async fn execute(args: CleanupArgs, global: &GlobalArgs) -> Result<()> {
    let options = CleanupOptions::from(&args);
    let plan = cleanup_plan(session::gate(global), &options);
    if plan.steps().is_empty() {
        return Err(CliError::InvalidArgument("every cleanup step was skipped".to_string()).into());
    }

    let store = session::load_store(global)?;
    let platform = session::platform(global, &store)?;
    let mut ctx = CleanupContext::new(platform, store);

    info!("Cleaning up using {:?}", global.env_file);
    println!("🧹 Cleanup plan:");
    for (i, step) in plan.steps().iter().enumerate() {
        println!("   {}. {}", i + 1, step.description());
    }
    if global.force {
        println!("   ⚠️  --force given, running without confirmation");
    }

    let report = plan.run_until(&mut ctx, session::interrupted()).await;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        session::print_report(&report);
    }
    session::finish(report)
}
