use crate::error::BusError;
use crate::mqtt::BrokerAddress;
use anyhow::{Context, Result};
use rumqttc::MqttOptions;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const CONFIG_FILE_NAME: &str = "eventbus.toml";
pub const CONFIG_DIR_ENV: &str = "EVENTBUS_CONFIG_DIR";

/// Keep-alive intervals below this are rejected by the MQTT client.
const MIN_KEEP_ALIVE_SECONDS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventBusConfig {
    pub broker: BrokerConfig,
    #[serde(default)]
    pub connection: ConnectionConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BrokerConfig {
    pub address: String,
    pub client_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    pub keep_alive_seconds: u64,
    pub clean_session: bool,
    pub request_channel_capacity: usize,
    pub max_packet_size: usize,
    pub reconnect_delay_seconds: u64,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            keep_alive_seconds: 30,
            clean_session: true,
            request_channel_capacity: 100,
            max_packet_size: 1024 * 1024, // 1MB
            reconnect_delay_seconds: 5,
        }
    }
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self::for_address("mqtt://localhost:1883")
    }
}

impl EventBusConfig {
    pub fn for_address(address: impl Into<String>) -> Self {
        Self {
            broker: BrokerConfig {
                address: address.into(),
                client_id: None,
            },
            connection: ConnectionConfig::default(),
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::info!(
                "Config file not found at {:?}, creating default config",
                path
            );
            let default_config = Self::default();
            default_config.save_to_file(path)?;
            return Ok(default_config);
        }

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        let config: EventBusConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {:?}", path))?;

        config.validate()?;
        Ok(config)
    }

    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;

        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        self.broker_address()
            .context("Broker address is not usable")?;

        if let Some(client_id) = &self.broker.client_id {
            if client_id.trim().is_empty() {
                anyhow::bail!("Client ID cannot be empty when set");
            }
        }

        if self.connection.keep_alive_seconds < MIN_KEEP_ALIVE_SECONDS {
            anyhow::bail!(
                "Keep-alive must be at least {} seconds",
                MIN_KEEP_ALIVE_SECONDS
            );
        }

        if self.connection.request_channel_capacity == 0 {
            anyhow::bail!("Request channel capacity must be greater than zero");
        }

        if self.connection.max_packet_size == 0 {
            anyhow::bail!("Max packet size must be greater than zero");
        }

        Ok(())
    }

    pub fn broker_address(&self) -> Result<BrokerAddress, BusError> {
        BrokerAddress::parse(&self.broker.address)
    }

    /// Configured client ID, or a fresh `eventbus-xxxxxxxx` one.
    pub fn client_id(&self) -> String {
        match &self.broker.client_id {
            Some(client_id) => client_id.clone(),
            None => {
                let id = uuid::Uuid::new_v4().simple().to_string();
                format!("eventbus-{}", &id[..8])
            }
        }
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_secs(self.connection.reconnect_delay_seconds)
    }

    pub fn mqtt_options(&self) -> Result<MqttOptions, BusError> {
        let address = self.broker_address()?;
        let mut mqtt_options = address.mqtt_options(&self.client_id());
        mqtt_options.set_keep_alive(Duration::from_secs(self.connection.keep_alive_seconds));
        mqtt_options.set_clean_session(self.connection.clean_session);
        mqtt_options.set_max_packet_size(
            self.connection.max_packet_size,
            self.connection.max_packet_size,
        );
        Ok(mqtt_options)
    }

    pub fn get_config_path() -> PathBuf {
        if let Ok(config_dir) = std::env::var(CONFIG_DIR_ENV) {
            PathBuf::from(config_dir).join(CONFIG_FILE_NAME)
        } else if let Some(config_dir) = dirs::config_dir() {
            config_dir.join("mqtt-event-bus").join(CONFIG_FILE_NAME)
        } else {
            PathBuf::from(CONFIG_FILE_NAME)
        }
    }
}
