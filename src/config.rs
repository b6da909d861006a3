use serde::Deserialize;
use std::path::Path;

/// Top-level config loaded from the agent's TOML config file
/// (`spec.md` §6: "reads device list and adapter connection info from a
/// config file").
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AgentConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub devices: Vec<DeviceConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: default_port() }
    }
}

fn default_port() -> u16 {
    7000
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    #[serde(default = "default_asset_capacity")]
    pub asset_capacity: usize,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            history_capacity: default_history_capacity(),
            asset_capacity: default_asset_capacity(),
        }
    }
}

fn default_history_capacity() -> usize {
    10_000
}

fn default_asset_capacity() -> usize {
    1024
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceConfig {
    pub uuid: String,
    pub name: String,
    pub schema_path: String,
    pub adapter: AdapterConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AdapterConfig {
    pub host: String,
    pub port: u16,
}

impl AgentConfig {
    /// Load config from a TOML file. Returns defaults (no devices) if the
    /// file doesn't exist.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::info!("config file not found at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        let config: AgentConfig = toml::from_str(&contents)?;
        tracing::info!("loaded config from {}", path.display());
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let config = AgentConfig::load("/nonexistent/agent.toml").unwrap();
        assert_eq!(config.server.port, 7000);
        assert!(config.devices.is_empty());
    }

    #[test]
    fn parses_device_table() {
        let toml = r#"
            [server]
            port = 8000

            [[devices]]
            uuid = "000"
            name = "VMC-3Axis"
            schema_path = "devices/vmc.json"

            [devices.adapter]
            host = "127.0.0.1"
            port = 7878
        "#;
        let config: AgentConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 8000);
        assert_eq!(config.devices.len(), 1);
        assert_eq!(config.devices[0].adapter.port, 7878);
    }
}
