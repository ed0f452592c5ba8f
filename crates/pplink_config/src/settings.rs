//! Typed deployment settings on top of the `.env` file.
//!
//! `DeploymentSettings` is loaded once at startup and passed by reference to
//! whatever needs it. `SettingsStore` owns the backing file and is the only
//! place that writes it, at explicit checkpoints.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::envfile::EnvFile;
use crate::error::{ConfigError, ConfigResult};

/// Configuration keys understood by pplink.
pub mod keys {
    pub const TENANT_ID: &str = "AZURE_TENANT_ID";
    pub const SUBSCRIPTION_ID: &str = "AZURE_SUBSCRIPTION_ID";
    pub const RESOURCE_GROUP: &str = "RESOURCE_GROUP";
    pub const LOCATION: &str = "AZURE_LOCATION";
    pub const ENVIRONMENT_NAME: &str = "POWER_PLATFORM_ENVIRONMENT_NAME";
    pub const ENVIRONMENT_ID: &str = "POWER_PLATFORM_ENVIRONMENT_ID";
    pub const POLICY_NAME: &str = "ENTERPRISE_POLICY_NAME";
    pub const POLICY_ID: &str = "ENTERPRISE_POLICY_ID";
    pub const APIM_NAME: &str = "APIM_NAME";
    pub const LINK_API_VERSION: &str = "POWER_PLATFORM_LINK_API_VERSION";
    pub const POLICY_API_VERSION: &str = "ENTERPRISE_POLICY_API_VERSION";
    pub const POLL_INTERVAL_SECONDS: &str = "POLL_INTERVAL_SECONDS";
    pub const POLL_MAX_ATTEMPTS: &str = "POLL_MAX_ATTEMPTS";
}

/// Keys written by pplink itself as operations complete. `reset` clears them.
pub const GENERATED_KEYS: &[&str] = &[keys::ENVIRONMENT_ID, keys::POLICY_ID];

/// Deployment configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeploymentSettings {
    pub tenant_id: Option<String>,
    pub subscription_id: Option<String>,
    pub resource_group: Option<String>,
    pub location: Option<String>,
    pub environment_name: Option<String>,
    pub environment_id: Option<String>,
    pub policy_name: Option<String>,
    pub policy_id: Option<String>,
    pub apim_name: Option<String>,
    pub link_api_version: Option<String>,
    pub policy_api_version: Option<String>,
    pub poll_interval_secs: Option<u64>,
    pub poll_max_attempts: Option<u32>,
}

impl DeploymentSettings {
    /// Read settings from a configuration file.
    pub fn from_env_file(file: &EnvFile) -> ConfigResult<Self> {
        let text = |key: &str| {
            file.get(key)
                .map(str::trim)
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };

        Ok(Self {
            tenant_id: text(keys::TENANT_ID),
            subscription_id: text(keys::SUBSCRIPTION_ID),
            resource_group: text(keys::RESOURCE_GROUP),
            location: text(keys::LOCATION),
            environment_name: text(keys::ENVIRONMENT_NAME),
            environment_id: text(keys::ENVIRONMENT_ID),
            policy_name: text(keys::POLICY_NAME),
            policy_id: text(keys::POLICY_ID),
            apim_name: text(keys::APIM_NAME),
            link_api_version: text(keys::LINK_API_VERSION),
            policy_api_version: text(keys::POLICY_API_VERSION),
            poll_interval_secs: parse_number(keys::POLL_INTERVAL_SECONDS, text(keys::POLL_INTERVAL_SECONDS))?,
            poll_max_attempts: parse_number(keys::POLL_MAX_ATTEMPTS, text(keys::POLL_MAX_ATTEMPTS))?,
        })
    }

    /// Value of a string setting by configuration key.
    pub fn get(&self, key: &str) -> Option<&str> {
        let value = match key {
            keys::TENANT_ID => &self.tenant_id,
            keys::SUBSCRIPTION_ID => &self.subscription_id,
            keys::RESOURCE_GROUP => &self.resource_group,
            keys::LOCATION => &self.location,
            keys::ENVIRONMENT_NAME => &self.environment_name,
            keys::ENVIRONMENT_ID => &self.environment_id,
            keys::POLICY_NAME => &self.policy_name,
            keys::POLICY_ID => &self.policy_id,
            keys::APIM_NAME => &self.apim_name,
            keys::LINK_API_VERSION => &self.link_api_version,
            keys::POLICY_API_VERSION => &self.policy_api_version,
            _ => return None,
        };
        value.as_deref()
    }

    fn slot_mut(&mut self, key: &str) -> Option<&mut Option<String>> {
        Some(match key {
            keys::TENANT_ID => &mut self.tenant_id,
            keys::SUBSCRIPTION_ID => &mut self.subscription_id,
            keys::RESOURCE_GROUP => &mut self.resource_group,
            keys::LOCATION => &mut self.location,
            keys::ENVIRONMENT_NAME => &mut self.environment_name,
            keys::ENVIRONMENT_ID => &mut self.environment_id,
            keys::POLICY_NAME => &mut self.policy_name,
            keys::POLICY_ID => &mut self.policy_id,
            keys::APIM_NAME => &mut self.apim_name,
            keys::LINK_API_VERSION => &mut self.link_api_version,
            keys::POLICY_API_VERSION => &mut self.policy_api_version,
            _ => return None,
        })
    }

    /// Value of a required setting.
    pub fn value(&self, key: &str) -> ConfigResult<&str> {
        self.get(key)
            .ok_or_else(|| ConfigError::MissingKeys(vec![key.to_string()]))
    }

    /// Ensure every key in `required` has a value, reporting all missing keys at once.
    pub fn require(&self, required: &[&str]) -> ConfigResult<()> {
        let missing: Vec<String> = required
            .iter()
            .filter(|key| self.get(key).is_none())
            .map(|key| key.to_string())
            .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingKeys(missing))
        }
    }

    /// Check that the tenant and subscription ids, when set, are GUIDs.
    pub fn validate_ids(&self) -> ConfigResult<()> {
        for key in [keys::TENANT_ID, keys::SUBSCRIPTION_ID] {
            if let Some(value) = self.get(key) {
                Uuid::parse_str(value).map_err(|e| ConfigError::InvalidValue {
                    key: key.to_string(),
                    reason: format!("expected a GUID: {}", e),
                })?;
            }
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(key: &str, raw: Option<String>) -> ConfigResult<Option<T>> {
    raw.map(|value| {
        value.parse::<T>().map_err(|_| ConfigError::InvalidValue {
            key: key.to_string(),
            reason: format!("expected a non-negative integer, got {:?}", value),
        })
    })
    .transpose()
}

/// Owner of the configuration file and its typed view.
#[derive(Debug, Clone)]
pub struct SettingsStore {
    file: EnvFile,
    settings: DeploymentSettings,
}

impl SettingsStore {
    /// Load settings from `path`. A missing file yields empty settings.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let file = EnvFile::load_or_empty(path)?;
        Self::from_file(file)
    }

    /// Build a store around an already parsed file.
    pub fn from_file(file: EnvFile) -> ConfigResult<Self> {
        let settings = DeploymentSettings::from_env_file(&file)?;
        Ok(Self { file, settings })
    }

    /// Current settings.
    pub fn settings(&self) -> &DeploymentSettings {
        &self.settings
    }

    /// Backing file.
    pub fn file(&self) -> &EnvFile {
        &self.file
    }

    /// Record `key = value` and persist immediately if anything changed.
    ///
    /// Nothing changes in memory unless the file was written.
    pub fn checkpoint(&mut self, key: &str, value: &str) -> ConfigResult<()> {
        let mut file = self.file.clone();
        if file.set(key, value)? {
            file.save()?;
            info!("Saved {} to {:?}", key, file.path());
        }
        self.file = file;
        if let Some(slot) = self.settings.slot_mut(key) {
            *slot = Some(value.to_string());
        }
        Ok(())
    }

    /// Remove `keys` from the file and persist. Returns the keys that were present.
    pub fn reset(&mut self, keys: &[&str]) -> ConfigResult<Vec<String>> {
        let mut file = self.file.clone();
        let removed: Vec<String> = keys
            .iter()
            .filter(|key| file.remove(key))
            .map(|key| key.to_string())
            .collect();

        if !removed.is_empty() {
            file.save()?;
            info!("Removed {} from {:?}", removed.join(", "), file.path());
        }
        self.file = file;

        for key in keys {
            if let Some(slot) = self.settings.slot_mut(key) {
                *slot = None;
            }
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_env_file() {
        let file = EnvFile::parse(
            ".env",
            "AZURE_TENANT_ID=t\nRESOURCE_GROUP=rg\nPOLL_INTERVAL_SECONDS=5\nAPIM_NAME=\n",
        );
        let settings = DeploymentSettings::from_env_file(&file).unwrap();

        assert_eq!(settings.tenant_id.as_deref(), Some("t"));
        assert_eq!(settings.resource_group.as_deref(), Some("rg"));
        assert_eq!(settings.poll_interval_secs, Some(5));
        assert_eq!(settings.apim_name, None);
    }

    #[test]
    fn test_invalid_number() {
        let file = EnvFile::parse(".env", "POLL_MAX_ATTEMPTS=lots\n");
        let err = DeploymentSettings::from_env_file(&file).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == keys::POLL_MAX_ATTEMPTS));
    }

    #[test]
    fn test_require_reports_all_missing() {
        let settings = DeploymentSettings {
            tenant_id: Some("t".to_string()),
            ..Default::default()
        };

        let err = settings
            .require(&[keys::TENANT_ID, keys::SUBSCRIPTION_ID, keys::RESOURCE_GROUP])
            .unwrap_err();
        match err {
            ConfigError::MissingKeys(missing) => {
                assert_eq!(missing, vec![keys::SUBSCRIPTION_ID, keys::RESOURCE_GROUP]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_validate_ids() {
        let mut settings = DeploymentSettings {
            subscription_id: Some("8f2c3a51-2d4b-4f6e-9a0b-1c2d3e4f5a6b".to_string()),
            ..Default::default()
        };
        assert!(settings.validate_ids().is_ok());

        settings.tenant_id = Some("contoso.onmicrosoft.com".to_string());
        assert!(matches!(
            settings.validate_ids(),
            Err(ConfigError::InvalidValue { key, .. }) if key == keys::TENANT_ID
        ));
    }
}
