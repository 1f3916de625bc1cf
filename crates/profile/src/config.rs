use crate::error::{ProfileError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use xprofile_account::{RootSecret, StaticKeyResolver, ROOT_SECRET_LEN};

pub const ENV_PROFILE_DIR: &str = "XPROFILE_DIR";
pub const ENV_RETAIL_KEY: &str = "XPROFILE_RETAIL_KEY";
pub const ENV_DEVKIT_KEY: &str = "XPROFILE_DEVKIT_KEY";

pub const DEFAULT_PROFILE_DIR: &str = "Content/Profile";
pub const DEFAULT_ACCOUNT_FILE: &str = "Account";

/// Configuration for locating and unsealing a profile
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ProfileConfig {
    /// Directory holding the account file and every collection
    pub profile_directory: PathBuf,

    /// File name of the sealed account container inside `profile_directory`
    pub account_file: String,

    /// Root secrets for the account container, hex encoded
    pub keys: KeyConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct KeyConfig {
    pub retail: Option<String>,
    pub devkit: Option<String>,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            profile_directory: PathBuf::from(DEFAULT_PROFILE_DIR),
            account_file: DEFAULT_ACCOUNT_FILE.to_string(),
            keys: KeyConfig::default(),
        }
    }
}

impl ProfileConfig {
    /// Config rooted at a specific profile directory
    pub fn for_directory(dir: impl Into<PathBuf>) -> Self {
        Self {
            profile_directory: dir.into(),
            ..Default::default()
        }
    }

    /// Parse a config file. Keys are checked by [`ProfileConfig::validate`] once
    /// every override has been applied.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw)
            .map_err(|e| ProfileError::invalid_config(format!("invalid TOML: {e}")))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_toml_str(&raw)
    }

    /// Apply `XPROFILE_*` environment overrides.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary lookup; blank values are ignored.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        if let Some(dir) = get(ENV_PROFILE_DIR) {
            self.profile_directory = PathBuf::from(dir);
        }
        if let Some(key) = get(ENV_RETAIL_KEY) {
            self.keys.retail = Some(key);
        }
        if let Some(key) = get(ENV_DEVKIT_KEY) {
            self.keys.devkit = Some(key);
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.account_file.trim().is_empty() {
            return Err(ProfileError::invalid_config("account_file must not be empty"));
        }
        if self.account_file.contains(['/', '\\']) {
            return Err(ProfileError::invalid_config(
                "account_file must be a bare file name",
            ));
        }
        self.key_resolver().map(|_| ())
    }

    /// Build the root-secret resolver from the configured keys.
    pub fn key_resolver(&self) -> Result<StaticKeyResolver> {
        let retail = self.keys.retail.as_deref().map(parse_root_secret).transpose()?;
        let devkit = self.keys.devkit.as_deref().map(parse_root_secret).transpose()?;
        Ok(StaticKeyResolver::new(retail, devkit))
    }
}

fn parse_root_secret(raw: &str) -> Result<RootSecret> {
    let bytes = hex::decode(raw.trim())
        .map_err(|e| ProfileError::invalid_config(format!("root secret is not hex: {e}")))?;
    RootSecret::try_from(bytes.as_slice()).map_err(|_| {
        ProfileError::invalid_config(format!(
            "root secret must be {ROOT_SECRET_LEN} bytes, got {}",
            bytes.len()
        ))
    })
}
