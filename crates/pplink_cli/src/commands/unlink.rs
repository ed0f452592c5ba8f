//! Unlink command - Detach the enterprise policy from the environment.

use anyhow::Result;
use clap::Args;

use pplink_platform::{unlink_plan, CleanupContext};

use super::{session, GlobalArgs};

#[derive(Args, Debug)]
pub struct UnlinkArgs {}

pub async fn execute(_args: UnlinkArgs, global: &GlobalArgs) -> Result<()> {
    let store = session::load_store(global)?;
    let platform = session::platform(global, &store)?;
    let mut ctx = CleanupContext::new(platform, store);

    println!("🔓 Unlinking enterprise policy...");
    let report = unlink_plan(session::gate(global))
        .run_until(&mut ctx, session::interrupted())
        .await;

    session::print_report(&report);
    session::finish(report)
}
