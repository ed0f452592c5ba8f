//! Link command - Link the environment to its enterprise policy.

use anyhow::Result;
use clap::Args;
use tracing::info;

use pplink_platform::LinkState;

use super::{session, GlobalArgs};

#[derive(Args, Debug)]
pub struct LinkArgs {}

pub async fn execute(_args: LinkArgs, global: &GlobalArgs) -> Result<()> {
    let mut store = session::load_store(global)?;
    let platform = session::platform(global, &store)?;

    info!("Linking enterprise policy using {:?}", global.env_file);
    println!("🔗 Linking enterprise policy...");

    let report = pplink_platform::link(&platform, &mut store).await?;

    println!("   Environment: {} ({})", report.environment_label, report.environment_id);
    println!("   Policy:      {}", report.policy_id);
    match report.state {
        LinkState::AlreadyLinked => println!("✅ Already linked, nothing to do"),
        LinkState::Linked(_) => println!("✅ Linked"),
    }
    Ok(())
}
