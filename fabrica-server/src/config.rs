//! Server configuration

use anyhow::{Context, Result};
use fabrica_runner::RunnerConfig;
use std::net::SocketAddr;

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP API listens on
    pub bind_addr: String,

    /// SQLite database URL
    pub database_url: String,

    /// Settings shared by every build run
    pub runner: RunnerConfig,
}

impl ServerConfig {
    /// Creates configuration from environment variables
    ///
    /// Recognised environment variables:
    /// - FABRICA_BIND_ADDR (optional, default: 0.0.0.0:8000)
    /// - DATABASE_URL (optional, default: sqlite://fabrica.db?mode=rwc)
    /// - plus everything `RunnerConfig::from_env` reads
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Creates configuration from an arbitrary variable source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let bind_addr = lookup("FABRICA_BIND_ADDR").unwrap_or_else(|| "0.0.0.0:8000".to_string());
        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| "sqlite://fabrica.db?mode=rwc".to_string());
        let runner = RunnerConfig::from_lookup(&lookup).context("Invalid runner configuration")?;

        Ok(Self {
            bind_addr,
            database_url,
            runner,
        })
    }

    /// Validates the configuration
    pub fn validate(&self) -> Result<()> {
        self.bind_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid FABRICA_BIND_ADDR '{}'", self.bind_addr))?;

        if !self.database_url.starts_with("sqlite:") {
            anyhow::bail!("DATABASE_URL must be a sqlite URL");
        }

        self.runner.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<ServerConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:8000");
        assert_eq!(config.database_url, "sqlite://fabrica.db?mode=rwc");
        assert_eq!(config.runner.image_prefix, "fabrica");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("FABRICA_BIND_ADDR", "127.0.0.1:9000"),
            ("DATABASE_URL", "sqlite::memory:"),
            ("FABRICA_DEBUG", "1"),
        ])
        .unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:9000");
        assert!(config.runner.debug);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation() {
        let config = config_from(&[("FABRICA_BIND_ADDR", "localhost")]).unwrap();
        assert!(config.validate().is_err());

        let config = config_from(&[("DATABASE_URL", "postgres://localhost/fabrica")]).unwrap();
        assert!(config.validate().is_err());
    }
}
