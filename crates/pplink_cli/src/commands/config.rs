//! Config command - Show or edit the configuration file.

use anyhow::Result;
use clap::{Args, Subcommand};

use pplink_config::is_valid_key;

use super::{session, CliError, GlobalArgs};

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print every entry
    Show,

    /// Set a key, rewriting it in place or appending it
    Set { key: String, value: String },

    /// Remove keys
    Unset {
        #[arg(required = true)]
        keys: Vec<String>,
    },
}

pub async fn execute(args: ConfigArgs, global: &GlobalArgs) -> Result<()> {
    let mut store = session::load_store(global)?;

    match args.action {
        ConfigAction::Show => {
            let entries = store.file().entries();
            if entries.is_empty() {
                println!("⚠️  No entries in {}", global.env_file.display());
            }
            for (key, value) in entries {
                println!("{}={}", key, value);
            }
        }
        ConfigAction::Set { key, value } => {
            if !is_valid_key(&key) {
                return Err(CliError::InvalidArgument(format!("{:?} is not a valid key", key)).into());
            }
            store.checkpoint(&key, &value)?;
            println!("✅ {} set in {}", key, global.env_file.display());
        }
        ConfigAction::Unset { keys } => {
            let keys: Vec<&str> = keys.iter().map(String::as_str).collect();
            let removed = store.reset(&keys)?;
            if removed.is_empty() {
                println!("⚠️  None of the keys were present");
            } else {
                println!("✅ Removed {}", removed.join(", "));
            }
        }
    }
    Ok(())
}
