//! registrar.toml configuration parser.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use tracing::{info, warn};

use crate::types::ServiceDescription;

/// Environment variable toggling registry client debug logging.
pub const ENV_CLIENT_DEBUG: &str = "EUREKA_CLIENT_DEBUG";

/// Environment variable naming the reserved (never registered) service.
pub const ENV_RESERVED_SERVICE: &str = "REGISTRAR_RESERVED_SERVICE";

pub const DEFAULT_RESERVED_SERVICE_NAME: &str = "yoda-httpd";
pub const DEFAULT_RESERVED_PORT: u16 = 51234;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegistrarConfig {
    #[serde(default)]
    pub registry: RegistryConfig,
    #[serde(default)]
    pub adapter: AdapterConfig,
    #[serde(default, rename = "service")]
    pub services: Vec<ServiceDescription>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryConfig {
    /// Base URL of the registry REST API, e.g. `http://eureka:8761/eureka`.
    #[serde(default = "default_registry_url")]
    pub url: String,
    /// RPC timeout in seconds.
    #[serde(default = "default_registry_timeout")]
    pub timeout: u64,
    #[serde(default)]
    pub debug: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterConfig {
    #[serde(default = "default_reserved_service_name")]
    pub reserved_service_name: String,
    #[serde(default = "default_reserved_port")]
    pub reserved_port: u16,
    /// Heartbeat interval of the daemon loop, in seconds.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval: u64,
}

fn default_registry_url() -> String {
    "http://127.0.0.1:8761/eureka".to_string()
}

fn default_registry_timeout() -> u64 {
    10
}

fn default_reserved_service_name() -> String {
    DEFAULT_RESERVED_SERVICE_NAME.to_string()
}

fn default_reserved_port() -> u16 {
    DEFAULT_RESERVED_PORT
}

fn default_refresh_interval() -> u64 {
    30
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            url: default_registry_url(),
            timeout: default_registry_timeout(),
            debug: false,
        }
    }
}

impl Default for AdapterConfig {
    fn default() -> Self {
        Self {
            reserved_service_name: default_reserved_service_name(),
            reserved_port: default_reserved_port(),
            refresh_interval: default_refresh_interval(),
        }
    }
}

impl RegistryConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }
}

impl AdapterConfig {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval.max(1))
    }
}

impl RegistrarConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> anyhow::Result<Self> {
        let config: RegistrarConfig = toml::from_str(content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Apply overrides from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides using the given variable lookup.
    ///
    /// A missing reserved-service variable keeps the configured name; an
    /// unparseable debug flag disables debug logging.
    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        match lookup(ENV_RESERVED_SERVICE) {
            Some(name) => self.adapter.reserved_service_name = name,
            None => info!(
                variable = ENV_RESERVED_SERVICE,
                default = %self.adapter.reserved_service_name,
                "environment variable not set, using configured value"
            ),
        }

        if let Some(raw) = lookup(ENV_CLIENT_DEBUG) {
            self.registry.debug = match parse_bool(&raw) {
                Some(b) => b,
                None => {
                    warn!(variable = ENV_CLIENT_DEBUG, value = %raw, "invalid boolean, debug disabled");
                    false
                }
            };
        }
    }
}

fn parse_bool(s: &str) -> Option<bool> {
    match s.trim() {
        "1" | "t" | "T" | "true" | "TRUE" | "True" => Some(true),
        "0" | "f" | "F" | "false" | "FALSE" | "False" => Some(false),
        _ => None,
    }
}
