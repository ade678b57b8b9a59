//! Console configuration
//!
//! Settings come from an optional TOML file; the binaries override single
//! keys from the command line.

use std::fs;
use std::path::Path;
use std::time::Duration;

use derive_more::Display;
use serde_derive::Deserialize;

use crate::ddns;
use crate::store::ServiceType;

#[derive(Debug, Display)]
pub enum ConfigError {
    #[display(fmt = "unable to read configuration: {}", _0)]
    Io(std::io::Error),
    #[display(fmt = "invalid configuration file: {}", _0)]
    Parse(toml::de::Error),
    #[display(fmt = "invalid configuration: {}", _0)]
    Invalid(String),
}

impl From<std::io::Error> for ConfigError {
    fn from(err: std::io::Error) -> Self {
        ConfigError::Io(err)
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::Parse(err)
    }
}

impl std::error::Error for ConfigError {}

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ConsoleConfig {
    pub listen_addr: String,
    pub port: u16,
    /// Base URL of the appliance, e.g. `http://192.168.1.1:3000`.
    pub backend_url: String,
    pub request_timeout_secs: u64,
    /// Pins the service tier instead of reading it from the backend status.
    pub service_type: Option<String>,
    pub ddns_default_domain: String,
    /// Serve a built-in in-memory backend instead of `backend_url`.
    pub demo: bool,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        ConsoleConfig {
            listen_addr: "0.0.0.0".to_string(),
            port: 5380,
            backend_url: "http://127.0.0.1:3000".to_string(),
            request_timeout_secs: 10,
            service_type: None,
            ddns_default_domain: ddns::DEFAULT_DOMAIN.to_string(),
            demo: false,
        }
    }
}

impl ConsoleConfig {
    pub fn load(path: &Path) -> Result<ConsoleConfig> {
        let raw = fs::read_to_string(path)?;
        let config = ConsoleConfig::parse(&raw)?;
        log::info!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn parse(raw: &str) -> Result<ConsoleConfig> {
        let config: ConsoleConfig = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.port == 0 {
            return Err(ConfigError::Invalid("port must be non-zero".to_string()));
        }
        if !self.demo
            && !(self.backend_url.starts_with("http://") || self.backend_url.starts_with("https://"))
        {
            return Err(ConfigError::Invalid(format!(
                "backend_url '{}' must be an http(s) URL",
                self.backend_url
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "request_timeout_secs must be non-zero".to_string(),
            ));
        }
        self.service_type()?;
        Ok(())
    }

    pub fn service_type(&self) -> Result<Option<ServiceType>> {
        match &self.service_type {
            Some(raw) => raw.parse().map(Some).map_err(ConfigError::Invalid),
            None => Ok(None),
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.listen_addr, self.port)
    }
}
