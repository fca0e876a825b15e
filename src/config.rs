//! Service configuration.
//!
//! Read from an optional TOML file; every key has a default, so an empty file
//! (or no file at all) yields a working configuration.
//!
//! ```toml
//! listen = "127.0.0.1:8080"
//! log-filter = "info"
//!
//! [cache]
//! strategy = "keyed"
//!
//! [store]
//! latency-ms = 100
//!
//! [resolver]
//! deadline-ms = 2500
//! ```

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Which [`ReadThrough`](crate::cache::ReadThrough) implementation backs the service.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CacheStrategy {
    /// [`Cache`](crate::cache::Cache): one lock for the whole table.
    #[default]
    Locked,
    /// [`KeyedCache`](crate::cache::KeyedCache): one slot per key.
    Keyed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct CacheConfig {
    pub strategy: CacheStrategy,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct StoreConfig {
    /// Artificial latency of every store lookup, in milliseconds.
    pub latency_ms: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self { latency_ms: 100 }
    }
}

impl StoreConfig {
    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct ResolverConfig {
    /// Upper bound on one fan-out, in milliseconds. Unset waits indefinitely.
    pub deadline_ms: Option<u64>,
}

impl ResolverConfig {
    pub fn deadline(&self) -> Option<Duration> {
        self.deadline_ms.map(Duration::from_millis)
    }
}

/// Top-level configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", default)]
pub struct Config {
    /// Address the HTTP server binds to.
    pub listen: String,
    /// `tracing` filter used when `READTHROUGH_LOG` is not set.
    pub log_filter: String,
    pub cache: CacheConfig,
    pub store: StoreConfig,
    pub resolver: ResolverConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: "127.0.0.1:8080".to_owned(),
            log_filter: "info".to_owned(),
            cache: CacheConfig::default(),
            store: StoreConfig::default(),
            resolver: ResolverConfig::default(),
        }
    }
}

impl Config {
    /// Loads the file at `path`, or the defaults when `path` is `None`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let Some(path) = path else {
            return Ok(Self::default());
        };

        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_owned(),
            source,
        })?;
        let config = Self::from_toml(&content).map_err(|source| ConfigError::Parse {
            path: path.to_owned(),
            source,
        })?;
        debug!(path = %path.display(), "loaded configuration");
        Ok(config)
    }

    /// Parses a configuration document.
    ///
    /// # Errors
    ///
    /// Returns the TOML error for malformed input or unknown enum values.
    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Checks the values serde cannot, returning every problem found.
    ///
    /// # Errors
    ///
    /// Returns one message per invalid setting.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();
        if self.listen.trim().is_empty() {
            errors.push("listen address must not be empty".to_owned());
        }
        if self.resolver.deadline_ms == Some(0) {
            errors.push("resolver.deadline-ms must be greater than zero".to_owned());
        }
        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.store.latency(), Duration::from_millis(100));
        assert_eq!(config.resolver.deadline(), None);
        assert_eq!(config.cache.strategy, CacheStrategy::Locked);
    }

    #[test]
    fn kebab_case_keys() {
        let config = Config::from_toml(
            r#"
            listen = "0.0.0.0:9000"
            log-filter = "debug"

            [cache]
            strategy = "keyed"

            [store]
            latency-ms = 5

            [resolver]
            deadline-ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.listen, "0.0.0.0:9000");
        assert_eq!(config.log_filter, "debug");
        assert_eq!(config.cache.strategy, CacheStrategy::Keyed);
        assert_eq!(config.store.latency(), Duration::from_millis(5));
        assert_eq!(config.resolver.deadline(), Some(Duration::from_millis(250)));
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        assert!(Config::from_toml("[cache]\nstrategy = \"sharded\"").is_err());
    }

    #[test]
    fn validate_collects_every_problem() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.listen = " ".to_owned();
        config.resolver.deadline_ms = Some(0);
        assert_eq!(config.validate().unwrap_err().len(), 2);
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let err = Config::load(Some(Path::new("/nonexistent/readthrough.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Read { .. }));
    }

    #[test]
    fn no_path_is_default() {
        assert_eq!(Config::load(None).unwrap(), Config::default());
    }
}
