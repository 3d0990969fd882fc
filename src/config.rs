//! Runtime configuration: provider selection, database location, API keys.

use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context};
use keyring::Entry;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::llm::{LlmClient, Provider};

const APP_DIR: &str = "buildmyskincare";
const KEYCHAIN_USER: &str = "buildmyskincare";
const DB_FILE: &str = "community_builds.db";

pub const PROVIDER_ENV: &str = "BMS_PROVIDER";
pub const MODEL_ENV: &str = "BMS_MODEL";
pub const DB_PATH_ENV: &str = "BMS_DB_PATH";

/// Settings read from `config.toml`, then overridden from the environment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub provider: Provider,
    /// Falls back to the provider's default model when unset.
    pub model: Option<String>,
    pub database_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            provider: Provider::Gemini,
            model: None,
            database_path: None,
        }
    }
}

impl AppConfig {
    /// `<config_dir>/buildmyskincare/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join("config.toml"))
    }

    /// Load the default config file (if any) and apply environment overrides.
    pub fn load() -> anyhow::Result<Self> {
        let mut config = match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        info!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Apply `BMS_PROVIDER`, `BMS_MODEL` and `BMS_DB_PATH` from `lookup`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> anyhow::Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(provider) = lookup(PROVIDER_ENV).filter(|v| !v.trim().is_empty()) {
            self.provider = provider.parse().map_err(|e: String| anyhow!(e))?;
        }
        if let Some(model) = lookup(MODEL_ENV).filter(|v| !v.trim().is_empty()) {
            self.model = Some(model);
        }
        if let Some(path) = lookup(DB_PATH_ENV).filter(|v| !v.trim().is_empty()) {
            self.database_path = Some(PathBuf::from(path));
        }
        Ok(())
    }

    pub fn model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.provider.default_model())
    }

    /// Configured database path, or `<data_dir>/buildmyskincare/community_builds.db`.
    pub fn database_path(&self) -> anyhow::Result<PathBuf> {
        if let Some(path) = &self.database_path {
            return Ok(path.clone());
        }
        dirs::data_dir()
            .map(|dir| dir.join(APP_DIR).join(DB_FILE))
            .ok_or_else(|| anyhow!("Could not determine data directory for the routine database"))
    }

    /// Build a client for the configured provider and model.
    pub fn build_client(&self) -> anyhow::Result<LlmClient> {
        let api_key = resolve_api_key(self.provider)?;
        Ok(LlmClient::new(self.provider, self.model(), api_key)?)
    }
}

/// Look up a provider's API key: OS keychain first, then its env variable.
pub fn resolve_api_key(provider: Provider) -> anyhow::Result<String> {
    if let Some(key) = keychain_api_key(provider) {
        return Ok(key);
    }

    let env_var = provider.api_key_env();
    match std::env::var(env_var) {
        Ok(key) if !key.trim().is_empty() => {
            info!("Using {} API key from {}", provider, env_var);
            Ok(key)
        }
        _ => Err(anyhow!(
            "No API key found for {}. Store one in the keychain under '{}' or set {}",
            provider,
            provider.keychain_service(),
            env_var
        )),
    }
}

fn keychain_api_key(provider: Provider) -> Option<String> {
    let service = provider.keychain_service();
    let entry = match Entry::new(&service, KEYCHAIN_USER) {
        Ok(entry) => entry,
        Err(e) => {
            warn!("Failed to create keyring entry for {}: {}", service, e);
            return None;
        }
    };
    match entry.get_password() {
        Ok(password) => Some(password),
        Err(keyring::Error::NoEntry) => {
            info!("No API key in keychain for service: {}", service);
            None
        }
        Err(e) => {
            warn!("Failed to get password for {}: {}", service, e);
            None
        }
    }
}

/// Store a provider's API key in the OS keychain.
pub fn store_api_key(provider: Provider, key: &str) -> anyhow::Result<()> {
    let service = provider.keychain_service();
    info!("Setting API key for service: {}", service);
    let entry = Entry::new(&service, KEYCHAIN_USER)
        .with_context(|| format!("Failed to create keyring entry for {}", service))?;
    entry
        .set_password(key)
        .with_context(|| format!("Failed to set password for {}", service))
}
