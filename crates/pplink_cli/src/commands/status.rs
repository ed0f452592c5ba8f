//! Status command - Show configuration and the current link state.

use anyhow::Result;
use clap::Args;

use pplink_config::keys;
use pplink_platform::inspect;

use super::{session, GlobalArgs};

/// Keys shown by `status`, in display order.
const SHOWN_KEYS: &[&str] = &[
    keys::TENANT_ID,
    keys::SUBSCRIPTION_ID,
    keys::RESOURCE_GROUP,
    keys::LOCATION,
    keys::ENVIRONMENT_NAME,
    keys::ENVIRONMENT_ID,
    keys::POLICY_NAME,
    keys::POLICY_ID,
];

#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Only show the configuration, do not contact any API
    #[arg(long)]
    pub offline: bool,

    /// Print remote state as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn execute(args: StatusArgs, global: &GlobalArgs) -> Result<()> {
    let store = session::load_store(global)?;
    let settings = store.settings();

    if !args.json {
        println!("⚙️  Configuration ({})", global.env_file.display());
        for key in SHOWN_KEYS {
            println!("   {:<34} {}", key, settings.get(key).unwrap_or("-"));
        }
    }

    if args.offline {
        return Ok(());
    }

    let platform = session::platform(global, &store)?;
    let status = inspect(&platform, settings).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!();
    println!("🌐 Remote state");
    match &status.environment {
        Some(env) => println!(
            "   Environment:    {} ({}, {})",
            env.display_name().unwrap_or("-"),
            env.name,
            env.provisioning_state().unwrap_or("unknown state")
        ),
        None => println!("   Environment:    not found"),
    }
    match &status.linked_policy {
        Some(linked) => println!(
            "   Linked policy:  {} ({})",
            linked.id.as_deref().or(linked.system_id.as_deref()).unwrap_or("-"),
            linked.link_status.as_deref().unwrap_or("unknown status")
        ),
        None => println!("   Linked policy:  none"),
    }
    match &status.policy {
        Some(policy) => println!("   Policy:         {}", policy.id),
        None => println!("   Policy:         not found"),
    }
    match status.resource_group_exists {
        Some(true) => println!("   Resource group: exists"),
        Some(false) => println!("   Resource group: not found"),
        None => println!("   Resource group: not configured"),
    }

    println!();
    if status.is_linked() {
        println!("✅ Environment is linked to the configured policy");
    } else {
        println!("⚠️  Environment is not linked to the configured policy");
    }
    Ok(())
}
