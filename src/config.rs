//! Application configuration
//!
//! Loaded from a TOML file, by default `~/.config/kyradi/config.toml`
//! (overridable with `KYRADI_CONFIG` or `--config`). Every section and key
//! is optional.
//!
//! ```toml
//! [server]
//! host = "0.0.0.0"
//! port = 8080
//!
//! [database]
//! url = "sqlite://./kyradi.db?mode=rwc"   # or "memory"
//!
//! [payments]
//! provider_timeout_ms = 10000
//!
//! [[api_keys]]
//! name = "front-desk"
//! key_hash = "<sha-256 hex of the key>"
//! tenant_id = "6f1c..."                   # omit for a platform key
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use crate::application::{AccessScope, GatewayConfig};
use crate::infrastructure::DatabaseConfig;
use crate::interfaces::http::{ApiKeyEntry, ApiKeyRegistry};
use crate::shared::utills::RetryConfig;

pub const CONFIG_ENV_VAR: &str = "KYRADI_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub logging: LoggingConfig,
    pub payments: PaymentsConfig,
    pub settlement: SettlementConfig,
    pub metrics: MetricsConfig,
    pub api_keys: Vec<ApiKeyConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Seconds to wait for in-flight work on shutdown
    pub shutdown_timeout: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            shutdown_timeout: 30,
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive; `RUST_LOG` wins when set
    pub level: String,
    /// `pretty` or `json`
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: "pretty".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentsConfig {
    /// Per-attempt deadline for a checkout provider call
    pub provider_timeout_ms: u64,
    /// Attempts per provider call, first one included
    pub retry_attempts: u32,
    pub retry_initial_delay_ms: u64,
    pub retry_max_delay_ms: u64,
    /// Base URL of demo checkout pages
    pub demo_checkout_url: String,
    /// Serve GATEWAY_LIVE tenants with the demo provider
    pub allow_demo_for_live: bool,
}

impl Default for PaymentsConfig {
    fn default() -> Self {
        Self {
            provider_timeout_ms: 10_000,
            retry_attempts: 3,
            retry_initial_delay_ms: 200,
            retry_max_delay_ms: 5_000,
            demo_checkout_url: "https://checkout.demo.invalid/session".to_string(),
            allow_demo_for_live: false,
        }
    }
}

impl PaymentsConfig {
    pub fn gateway_config(&self) -> GatewayConfig {
        GatewayConfig {
            provider_timeout: Duration::from_millis(self.provider_timeout_ms),
            retry: RetryConfig {
                max_attempts: self.retry_attempts.max(1),
                initial_delay: Duration::from_millis(self.retry_initial_delay_ms),
                backoff_multiplier: 2,
                max_delay: Duration::from_millis(self.retry_max_delay_ms),
            },
            allow_demo_for_live: self.allow_demo_for_live,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SettlementConfig {
    /// How often paid payments without a settlement are swept; 0 disables
    pub sweep_interval_secs: u64,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Serve `/metrics` in Prometheus format
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiKeyConfig {
    pub name: String,
    /// SHA-256 hex digest of the key
    pub key_hash: String,
    /// Tenant the key is bound to; platform key when absent
    #[serde(default)]
    pub tenant_id: Option<Uuid>,
}

impl AppConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml(&raw).map_err(|e| match e {
            ConfigError::Parse { source, .. } => ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            },
            other => other,
        })?;
        Ok(config)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults
    pub fn load_or_default(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            warn!(path = %path.display(), "Config file not found, using defaults");
            return Ok(Self::default());
        }
        Self::load(path)
    }

    pub fn from_toml(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw).map_err(|source| ConfigError::Parse {
            path: PathBuf::from("<inline>"),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::Invalid("server.port must not be 0".into()));
        }
        if self.payments.provider_timeout_ms == 0 {
            return Err(ConfigError::Invalid(
                "payments.provider_timeout_ms must be positive".into(),
            ));
        }
        for key in &self.api_keys {
            let digest = key.key_hash.trim();
            if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
                return Err(ConfigError::Invalid(format!(
                    "api key '{}': key_hash must be a 64-character SHA-256 hex digest",
                    key.name
                )));
            }
        }
        Ok(())
    }

    pub fn api_key_registry(&self) -> ApiKeyRegistry {
        ApiKeyRegistry::new(self.api_keys.iter().map(|k| ApiKeyEntry {
            name: k.name.clone(),
            key_hash: k.key_hash.clone(),
            scope: match k.tenant_id {
                Some(tenant_id) => AccessScope::Tenant(tenant_id),
                None => AccessScope::Platform,
            },
        }))
    }
}

/// `KYRADI_CONFIG`, else `<config dir>/kyradi/config.toml`
pub fn default_config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_ENV_VAR) {
        return PathBuf::from(path);
    }
    dirs_next::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("kyradi")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::crypto::hash_api_key;

    #[test]
    fn empty_file_gives_defaults() {
        let config = AppConfig::from_toml("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.settlement.sweep_interval_secs, 60);
        assert!(config.api_keys.is_empty());
        assert!(!config.database.is_in_memory());
    }

    #[test]
    fn full_file_parses() {
        let tenant = Uuid::new_v4();
        let raw = format!(
            r#"
            [server]
            port = 9100

            [database]
            url = "memory"

            [payments]
            provider_timeout_ms = 2500
            retry_attempts = 5

            [[api_keys]]
            name = "ops"
            key_hash = "{ops}"

            [[api_keys]]
            name = "front-desk"
            key_hash = "{desk}"
            tenant_id = "{tenant}"
            "#,
            ops = hash_api_key("kyr_ops"),
            desk = hash_api_key("kyr_desk"),
        );
        let config = AppConfig::from_toml(&raw).unwrap();
        assert_eq!(config.server.address(), "0.0.0.0:9100");
        assert!(config.database.is_in_memory());

        let gateway = config.payments.gateway_config();
        assert_eq!(gateway.provider_timeout, Duration::from_millis(2500));
        assert_eq!(gateway.retry.max_attempts, 5);

        let registry = config.api_key_registry();
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.authenticate("kyr_ops").unwrap().scope, AccessScope::Platform);
        assert_eq!(
            registry.authenticate("kyr_desk").unwrap().scope,
            AccessScope::Tenant(tenant)
        );
    }

    #[test]
    fn rejects_plaintext_key() {
        let raw = r#"
            [[api_keys]]
            name = "oops"
            key_hash = "kyr_plaintext"
        "#;
        assert!(matches!(
            AppConfig::from_toml(raw),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn missing_file_falls_back() {
        let path = std::env::temp_dir().join(format!("kyradi-{}.toml", Uuid::new_v4()));
        let config = AppConfig::load_or_default(&path).unwrap();
        assert_eq!(config.server.port, 8080);
        assert!(matches!(AppConfig::load(&path), Err(ConfigError::Io { .. })));
    }
}
