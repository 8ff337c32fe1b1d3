use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

use crate::github_client::DEFAULT_API_URL;

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_page_size() -> u32 {
    36
}

fn default_settings_path() -> String {
    "daily-helper-settings.json".to_string()
}

fn default_progress_settle_ms() -> u64 {
    500
}

#[derive(Debug, Deserialize, Serialize)]
pub struct AppConfig {
    pub organization: String,
    pub team_names: Vec<String>,
    #[serde(default)]
    pub github_token: Option<String>,
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_settings_path")]
    pub settings_path: String,
    #[serde(default = "default_progress_settle_ms")]
    pub progress_settle_ms: u64,
}

/// Resolves `${NAME}` to the value of environment variable `NAME`.
fn expand_env(value: &str) -> Result<String> {
    match value.strip_prefix("${").and_then(|rest| rest.strip_suffix('}')) {
        Some(env_var_name) => env::var(env_var_name)
            .with_context(|| format!("Environment variable {} not set", env_var_name)),
        None => Ok(value.to_string()),
    }
}

impl AppConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

        Self::from_toml(&config_str)
            .with_context(|| format!("Failed to load config file: {:?}", path.as_ref()))
    }

    pub fn from_toml(config_str: &str) -> Result<Self> {
        let mut config: AppConfig = toml::from_str(config_str).context("Failed to parse config")?;

        if let Some(token) = &config.github_token {
            config.github_token = Some(expand_env(token)?);
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.organization.is_empty() {
            return Err(anyhow::anyhow!("Organization name cannot be empty"));
        }

        if self.team_names.is_empty() {
            return Err(anyhow::anyhow!("Team names list cannot be empty"));
        }

        if self.team_names.iter().any(|name| name.trim().is_empty()) {
            return Err(anyhow::anyhow!("Team names cannot be blank"));
        }

        if self.page_size == 0 {
            return Err(anyhow::anyhow!("Page size must be greater than zero"));
        }

        Ok(())
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let config_str = toml::to_string(self)
            .context("Failed to serialize config")?;

        fs::write(&path, config_str)
            .with_context(|| format!("Failed to write config file: {:?}", path.as_ref()))?;

        Ok(())
    }
}
