use std::collections::HashMap;
use std::net::SocketAddr;

use config::{Config as ConfigLib, ConfigError, Environment, File};
use intercom_core::constants::{DEFAULT_DEVICE_BIND_ADDR, DEFAULT_MAX_IMAGE_SIZE};
use intercom_gateway::GatewayConfig;
use intercom_network::DeviceServerConfig;
use intercom_storage::DatabaseConfig;
use intercom_telegram::TelegramConfig;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub device: DeviceSection,
    pub gateway: GatewaySection,
    pub database: DatabaseSection,
    pub telegram: TelegramConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeviceSection {
    pub bind_addr: String,
    pub max_image_size: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GatewaySection {
    pub confirm_on_token: bool,
    pub reset_on_disconnect: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseSection {
    pub path: String,
    pub max_connections: u32,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_with_sources(None)
    }

    /// Build the configuration from defaults, the optional `config/intercom`
    /// file and either `env_vars` or the process environment.
    ///
    /// Keys in `env_vars` use the dotted form (`telegram.token`); process
    /// variables use `INTERCOM_TELEGRAM__TOKEN`.
    pub fn load_with_sources(
        env_vars: Option<HashMap<String, String>>,
    ) -> Result<Self, ConfigError> {
        let gateway = GatewayConfig::default();
        let database = DatabaseConfig::default();
        let telegram = TelegramConfig::default();

        let mut builder = ConfigLib::builder()
            .set_default("device.bind_addr", DEFAULT_DEVICE_BIND_ADDR)?
            .set_default("device.max_image_size", DEFAULT_MAX_IMAGE_SIZE as u64)?
            .set_default("gateway.confirm_on_token", gateway.confirm_on_token)?
            .set_default("gateway.reset_on_disconnect", gateway.reset_on_disconnect)?
            .set_default("database.path", database.path.to_string_lossy().into_owned())?
            .set_default("database.max_connections", database.max_connections)?
            .set_default("telegram.token", telegram.token)?
            .set_default("telegram.api_base", telegram.api_base)?
            .set_default("telegram.poll_timeout_secs", telegram.poll_timeout_secs)?
            .set_default("telegram.retry_delay_ms", telegram.retry_delay_ms)?
            .set_default("telegram.request_timeout_ms", telegram.request_timeout_ms)?
            .add_source(File::with_name("config/intercom").required(false));

        // Explicit overrides keep tests independent of the process environment
        if let Some(vars) = env_vars {
            for (key, value) in vars {
                builder = builder.set_override(&key, value)?;
            }
        } else {
            builder = builder.add_source(
                Environment::with_prefix("INTERCOM")
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            );
        }

        let config: Self = builder.build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.device_bind_addr()?;
        if self.device.max_image_size == 0 {
            return Err(ConfigError::Message(
                "device.max_image_size must be positive".to_string(),
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::Message(
                "database.max_connections must be positive".to_string(),
            ));
        }
        Ok(())
    }

    fn device_bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.device.bind_addr.parse().map_err(|e| {
            ConfigError::Message(format!(
                "invalid device.bind_addr {:?}: {}",
                self.device.bind_addr, e
            ))
        })
    }

    pub fn device_server(&self) -> Result<DeviceServerConfig, ConfigError> {
        Ok(DeviceServerConfig {
            bind_addr: self.device_bind_addr()?,
        })
    }

    pub fn gateway(&self) -> GatewayConfig {
        GatewayConfig {
            max_image_size: self.device.max_image_size,
            confirm_on_token: self.gateway.confirm_on_token,
            reset_on_disconnect: self.gateway.reset_on_disconnect,
        }
    }

    pub fn database(&self) -> DatabaseConfig {
        DatabaseConfig::new(&self.database.path)
            .max_connections(self.database.max_connections)
    }
}
