use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use std::{fs, path::PathBuf};
use tracing::debug;

use crate::core::CurrencyCode;
use crate::core::resolver::ResolverConfig;

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct UpstreamConfig {
    pub base_url: Option<String>,
    pub timeout_ms: u64,
    /// Skips the public-address and port checks. Only for trusted networks.
    pub allow_private_hosts: bool,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        UpstreamConfig {
            base_url: None,
            timeout_ms: 2000,
            allow_private_hosts: false,
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct RatesConfig {
    pub ttl_seconds: u64,
    pub stale_ceiling_seconds: u64,
    pub cross_ttl_seconds: u64,
    pub default_from: CurrencyCode,
    pub default_to: CurrencyCode,
}

impl Default for RatesConfig {
    fn default() -> Self {
        let resolver = ResolverConfig::default();
        RatesConfig {
            ttl_seconds: resolver.ttl.as_secs(),
            stale_ceiling_seconds: resolver.stale_ceiling.as_secs(),
            cross_ttl_seconds: 60,
            default_from: resolver.default_from,
            default_to: resolver.default_to,
        }
    }
}

impl RatesConfig {
    pub fn resolver_config(&self) -> ResolverConfig {
        ResolverConfig {
            ttl: Duration::from_secs(self.ttl_seconds),
            stale_ceiling: Duration::from_secs(self.stale_ceiling_seconds),
            default_from: self.default_from.clone(),
            default_to: self.default_to.clone(),
        }
    }

    pub fn cross_ttl(&self) -> Duration {
        Duration::from_secs(self.cross_ttl_seconds)
    }
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CurrencyDefinition {
    pub rate: f64,
    #[serde(default)]
    pub symbol: String,
    #[serde(default = "default_position")]
    pub position: String,
    #[serde(default)]
    pub name: String,
    pub description: Option<String>,
    pub decimals: Option<u8>,
}

fn default_position() -> String {
    "left".to_string()
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RegistryConfig {
    pub base: CurrencyCode,
    pub currencies: BTreeMap<CurrencyCode, CurrencyDefinition>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct AppConfig {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    pub data_path: Option<String>,
    #[serde(default)]
    pub upstream: UpstreamConfig,
    #[serde(default)]
    pub rates: RatesConfig,
    /// Absent means the currency registry is not loaded.
    pub registry: Option<RegistryConfig>,
}

fn default_listen_addr() -> String {
    "127.0.0.1:8080".to_string()
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            listen_addr: default_listen_addr(),
            data_path: None,
            upstream: UpstreamConfig::default(),
            rates: RatesConfig::default(),
            registry: None,
        }
    }
}

impl AppConfig {
    pub fn load() -> Result<Self> {
        debug!("Loading default config");
        let config_path = Self::default_config_path()?;
        Self::load_from_path(&config_path)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("org", "foxrate", "foxrate")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("org", "foxrate", "foxrate")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        debug!("Successfully loaded config");
        Ok(config)
    }
}

pub const DEFAULT_CONFIG: &str = r#"---
listen_addr: "127.0.0.1:8080"

upstream:
  # base_url: "https://rates.example.com/v1/rate"
  timeout_ms: 2000

rates:
  ttl_seconds: 300
  stale_ceiling_seconds: 86400
  cross_ttl_seconds: 60
  default_from: "USD"
  default_to: "VES"

registry:
  base: "USD"
  currencies:
    USD:
      rate: 1.0
      symbol: "$"
      position: "left"
      name: "US Dollar"
      decimals: 2
    EUR:
      rate: 0.85
      symbol: "€"
      position: "right"
      name: "Euro"
      decimals: 2
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config: AppConfig = serde_yaml::from_str("{}").expect("Failed to deserialize");

        assert_eq!(config.listen_addr, "127.0.0.1:8080");
        assert!(config.upstream.base_url.is_none());
        assert_eq!(config.upstream.timeout(), Duration::from_secs(2));
        assert!(!config.upstream.allow_private_hosts);
        assert_eq!(config.rates.ttl_seconds, 300);
        assert_eq!(config.rates.stale_ceiling_seconds, 86_400);
        assert_eq!(config.rates.cross_ttl_seconds, 60);
        assert_eq!(config.rates.default_from.as_str(), "USD");
        assert_eq!(config.rates.default_to.as_str(), "VES");
        assert!(config.registry.is_none());
    }

    #[test]
    fn test_config_deserialization() {
        let yaml_str = r#"
listen_addr: "0.0.0.0:9000"
data_path: "/var/lib/foxrate"
upstream:
  base_url: "https://rates.example.com/rate"
  timeout_ms: 1500
rates:
  ttl_seconds: 120
  default_to: "eur"
registry:
  base: "USD"
  currencies:
    USD:
      rate: 1.0
      symbol: "$"
      name: "US Dollar"
    VEF:
      rate: 36.5
      symbol: "Bs"
      position: "right"
"#;

        let config: AppConfig = serde_yaml::from_str(yaml_str).expect("Failed to deserialize");
        assert_eq!(config.listen_addr, "0.0.0.0:9000");
        assert_eq!(
            config.default_data_path().unwrap(),
            PathBuf::from("/var/lib/foxrate")
        );
        assert_eq!(
            config.upstream.base_url.as_deref(),
            Some("https://rates.example.com/rate")
        );
        assert_eq!(config.upstream.timeout_ms, 1500);
        assert_eq!(config.rates.ttl_seconds, 120);
        assert_eq!(config.rates.stale_ceiling_seconds, 86_400);
        assert_eq!(config.rates.default_to.as_str(), "EUR");

        let registry = config.registry.expect("registry section");
        assert_eq!(registry.base.as_str(), "USD");
        let vef = &registry.currencies[&CurrencyCode::parse("VEF").unwrap()];
        assert_eq!(vef.rate, 36.5);
        assert_eq!(vef.position, "right");
        let usd = &registry.currencies[&CurrencyCode::parse("USD").unwrap()];
        assert_eq!(usd.position, "left");
    }

    #[test]
    fn test_invalid_currency_code_is_rejected() {
        let result = serde_yaml::from_str::<AppConfig>("rates:\n  default_from: \"US1\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn test_default_config_parses() {
        let config: AppConfig = serde_yaml::from_str(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.registry.unwrap().currencies.len(), 2);
    }

    #[test]
    fn test_resolver_config_from_rates() {
        let rates = RatesConfig {
            ttl_seconds: 10,
            stale_ceiling_seconds: 20,
            ..RatesConfig::default()
        };
        let resolver = rates.resolver_config();
        assert_eq!(resolver.ttl, Duration::from_secs(10));
        assert_eq!(resolver.stale_ceiling, Duration::from_secs(20));
        assert_eq!(rates.cross_ttl(), Duration::from_secs(60));
    }
}
