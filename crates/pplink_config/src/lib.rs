//! # pplink_config
//!
//! Configuration store for pplink.
//!
//! Deployment state lives in a flat `KEY=VALUE` file (by default `.env`).
//! This crate reads it without losing comments or ordering, rewrites single
//! keys in place, guards writes with an advisory lock, and exposes a typed
//! `DeploymentSettings` view.
//!
//! ```rust,no_run
//! use pplink_config::{keys, SettingsStore};
//!
//! let mut store = SettingsStore::load(".env").unwrap();
//! store.settings().require(&[keys::SUBSCRIPTION_ID]).unwrap();
//! store.checkpoint(keys::ENVIRONMENT_ID, "00000000-0000-0000-0000-000000000000").unwrap();
//! ```

pub mod envfile;
pub mod error;
pub mod lock;
pub mod settings;

pub use envfile::{is_valid_key, EnvFile};
pub use error::{ConfigError, ConfigResult};
pub use lock::{lock_path_for, write_atomic, EnvFileLock};
pub use settings::{keys, DeploymentSettings, SettingsStore, GENERATED_KEYS};
