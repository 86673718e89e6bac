//! Configuration loading via `ortho-config`.

use std::time::Duration;

use ortho_config::OrthoConfig;
use serde::Deserialize;
use thiserror::Error;

use crate::pool::PoolSelector;

/// Unity array configuration derived from environment variables,
/// configuration files, and CLI flags.
#[derive(Clone, Debug, Deserialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(
    prefix = "UNITY",
    discovery(
        app_name = "unityvol",
        env_var = "UNITYVOL_CONFIG_PATH",
        config_file_name = "unityvol.toml",
        dotfile_name = ".unityvol.toml",
        project_file_name = "unityvol.toml"
    )
)]
pub struct UnityConfig {
    /// Management address of the array, for example `10.0.0.5` or
    /// `https://unity.example.com`.
    pub endpoint: String,
    /// Unisphere account used for REST calls.
    pub user_name: String,
    /// Password for [`Self::user_name`].
    pub password: String,
    /// Identifier of the pool new LUNs are carved from. Takes priority over
    /// [`Self::storage_pool_name`].
    pub storage_pool_id: Option<String>,
    /// Name of the pool new LUNs are carved from.
    pub storage_pool_name: Option<String>,
    /// Accept self-signed management certificates.
    #[ortho_config(default = false)]
    pub insecure: bool,
    /// Timeout applied to every REST call, in seconds.
    #[ortho_config(default = 30)]
    pub api_timeout_secs: u64,
    /// File holding a generated host UUID. When unset the host identity is
    /// read from `/etc/machine-id`.
    pub instance_id_file: Option<String>,
    /// Identifier of the array host object registered for this machine,
    /// for example `Host_3`. Takes priority over [`Self::host_name`].
    pub host_id: Option<String>,
    /// Name under which this machine is registered on the array. When both
    /// host options are unset the name is read from `/etc/hostname`.
    pub host_name: Option<String>,
}

/// Metadata for a configuration field, used to generate actionable error messages.
struct FieldMetadata {
    description: &'static str,
    env_var: &'static str,
    toml_key: &'static str,
}

impl FieldMetadata {
    const fn new(description: &'static str, env_var: &'static str, toml_key: &'static str) -> Self {
        Self {
            description,
            env_var,
            toml_key,
        }
    }
}

impl UnityConfig {
    fn require_field(value: &str, metadata: &FieldMetadata) -> Result<(), ConfigError> {
        if value.trim().is_empty() {
            return Err(ConfigError::MissingField(format!(
                "missing {}: set {} or add {} to unityvol.toml",
                metadata.description, metadata.env_var, metadata.toml_key
            )));
        }
        Ok(())
    }

    /// Loads configuration without attempting to parse CLI arguments. Values
    /// still merge defaults, configuration files, and environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the merge fails.
    pub fn load_without_cli_args() -> Result<Self, ConfigError> {
        Self::load_from_iter([std::ffi::OsString::from("unityvol")])
            .map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Returns the pool selection, preferring the identifier over the name.
    /// Blank values count as unset.
    #[must_use]
    pub fn pool_selector(&self) -> Option<PoolSelector> {
        PoolSelector::from_options(
            self.storage_pool_id.as_deref(),
            self.storage_pool_name.as_deref(),
        )
    }

    /// Returns the REST timeout as a [`Duration`].
    #[must_use]
    pub const fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api_timeout_secs)
    }

    /// Performs semantic validation on required fields. Error messages include
    /// guidance on how to provide missing values via environment variables or
    /// configuration files.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::MissingField`] when a credential is empty and
    /// [`ConfigError::MissingPool`] when neither pool option is set.
    pub fn validate(&self) -> Result<(), ConfigError> {
        Self::require_field(
            &self.endpoint,
            &FieldMetadata::new("array management endpoint", "UNITY_ENDPOINT", "endpoint"),
        )?;
        Self::require_field(
            &self.user_name,
            &FieldMetadata::new("Unisphere user name", "UNITY_USER_NAME", "user_name"),
        )?;
        Self::require_field(
            &self.password,
            &FieldMetadata::new("Unisphere password", "UNITY_PASSWORD", "password"),
        )?;
        if self.pool_selector().is_none() {
            return Err(ConfigError::MissingPool);
        }
        if self.api_timeout_secs == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }
}

/// Errors raised during configuration loading and validation.
#[derive(Debug, Error, Eq, PartialEq)]
pub enum ConfigError {
    /// Indicates a required configuration field is empty or missing.
    #[error("missing configuration field: {0}")]
    MissingField(String),
    /// Indicates that no storage pool was selected.
    #[error(
        "no storage pool configured: set UNITY_STORAGE_POOL_ID or UNITY_STORAGE_POOL_NAME \
         (storage_pool_id or storage_pool_name in unityvol.toml)"
    )]
    MissingPool,
    /// Indicates a zero REST timeout.
    #[error("api_timeout_secs must be greater than zero")]
    InvalidTimeout,
    /// Surfaces errors from the `ortho-config` loader.
    #[error("configuration parsing failed: {0}")]
    Parse(String),
}

impl From<ortho_config::OrthoError> for ConfigError {
    fn from(value: ortho_config::OrthoError) -> Self {
        Self::Parse(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::{fixture, rstest};

    #[fixture]
    fn valid_config() -> UnityConfig {
        UnityConfig {
            endpoint: String::from("10.0.0.5"),
            user_name: String::from("admin"),
            password: String::from("Password123!"),
            storage_pool_id: Some(String::from("pool_1")),
            storage_pool_name: None,
            insecure: false,
            api_timeout_secs: 30,
            instance_id_file: None,
            host_id: None,
            host_name: None,
        }
    }

    #[rstest]
    fn validate_accepts_complete_config(valid_config: UnityConfig) {
        assert_eq!(valid_config.validate(), Ok(()));
    }

    #[rstest]
    #[case::endpoint("UNITY_ENDPOINT", "endpoint")]
    #[case::user("UNITY_USER_NAME", "user_name")]
    #[case::password("UNITY_PASSWORD", "password")]
    fn validate_names_env_var_and_key(
        valid_config: UnityConfig,
        #[case] env_var: &str,
        #[case] toml_key: &str,
    ) {
        let mut cfg = valid_config;
        match toml_key {
            "endpoint" => cfg.endpoint = String::from("  "),
            "user_name" => cfg.user_name.clear(),
            _ => cfg.password.clear(),
        }
        let Err(ConfigError::MissingField(message)) = cfg.validate() else {
            panic!("expected MissingField for {toml_key}");
        };
        assert!(message.contains(env_var), "message: {message}");
        assert!(message.contains(toml_key), "message: {message}");
        assert!(message.contains("unityvol.toml"), "message: {message}");
    }

    #[rstest]
    fn validate_rejects_missing_pool(valid_config: UnityConfig) {
        let cfg = UnityConfig {
            storage_pool_id: Some(String::from(" ")),
            storage_pool_name: None,
            ..valid_config
        };
        assert_eq!(cfg.validate(), Err(ConfigError::MissingPool));
    }

    #[rstest]
    fn pool_selector_prefers_id(valid_config: UnityConfig) {
        let cfg = UnityConfig {
            storage_pool_name: Some(String::from("gold")),
            ..valid_config
        };
        assert_eq!(
            cfg.pool_selector(),
            Some(PoolSelector::Id(String::from("pool_1")))
        );
    }

    #[rstest]
    fn validate_rejects_zero_timeout(valid_config: UnityConfig) {
        let cfg = UnityConfig {
            api_timeout_secs: 0,
            ..valid_config
        };
        assert_eq!(cfg.validate(), Err(ConfigError::InvalidTimeout));
    }
}
