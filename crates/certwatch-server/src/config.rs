use certwatch_notify::channels::slack::{DEFAULT_CHANNEL, DEFAULT_USERNAME};
use certwatch_registry::uptimerobot::DEFAULT_ENDPOINT;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Process-wide settings, loaded once at startup and passed by reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CertwatchConfig {
    /// Directory holding `certwatch.db`.
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    pub registry: RegistryConfig,
    pub alerts: AlertsConfig,
    #[serde(default)]
    pub probe: ProbeConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    pub api_key: String,
    #[serde(default = "default_registry_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_registry_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertsConfig {
    pub webhook_url: String,
    /// A blank value is treated as unset by the Slack channel.
    #[serde(default = "default_alert_channel")]
    pub channel: String,
    #[serde(default = "default_alert_username")]
    pub username: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProbeConfig {
    #[serde(default = "default_probe_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_probe_max_concurrent")]
    pub max_concurrent: usize,
    /// Accept any peer certificate so expired or self-signed endpoints still
    /// report their expiry. Applies to the probe connector only.
    #[serde(default = "default_skip_chain_validation")]
    pub skip_chain_validation: bool,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_probe_timeout_secs(),
            max_concurrent: default_probe_max_concurrent(),
            skip_chain_validation: default_skip_chain_validation(),
        }
    }
}

fn default_data_dir() -> String {
    "var".to_string()
}

fn default_registry_endpoint() -> String {
    DEFAULT_ENDPOINT.to_string()
}

fn default_registry_timeout_secs() -> u64 {
    30
}

fn default_alert_channel() -> String {
    DEFAULT_CHANNEL.to_string()
}

fn default_alert_username() -> String {
    DEFAULT_USERNAME.to_string()
}

fn default_probe_timeout_secs() -> u64 {
    10
}

fn default_probe_max_concurrent() -> usize {
    20
}

fn default_skip_chain_validation() -> bool {
    true
}

impl CertwatchConfig {
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }
}
