//! Layered server configuration.
//!
//! Values are resolved from built-in defaults, then an optional TOML file,
//! then environment variables, then command-line overrides.

use std::path::Path;
use std::time::Duration;

use derive_getters::Getters;
use derive_more::{Display, Error};
use derive_new::new;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument};

/// Resolved server settings.
#[derive(Debug, Clone, PartialEq, Eq, Getters, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Interface to bind.
    host: String,
    /// TCP port to bind.
    port: u16,
    /// SQLite database path.
    database_url: String,
    /// How long a request waits for a busy match before giving up.
    lock_timeout_ms: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 4000,
            database_url: "drones.db".to_string(),
            lock_timeout_ms: 5_000,
        }
    }
}

/// Explicit values that beat every other layer.
#[derive(Debug, Clone, Default, new)]
pub struct ConfigOverrides {
    /// Interface to bind.
    pub host: Option<String>,
    /// TCP port to bind.
    pub port: Option<u16>,
    /// SQLite database path.
    pub database_url: Option<String>,
    /// Busy-match wait in milliseconds.
    pub lock_timeout_ms: Option<u64>,
}

impl ServerConfig {
    /// Resolves the full layer stack against the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or if
    /// any layer supplies an invalid value.
    #[instrument(skip(overrides))]
    pub fn resolve(file: Option<&Path>, overrides: &ConfigOverrides) -> Result<Self, ConfigError> {
        let base = match file {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        let config = base
            .with_env(|key| std::env::var(key).ok())?
            .with_overrides(overrides);
        config.validate()?;
        info!(
            host = %config.host,
            port = config.port,
            database_url = %config.database_url,
            lock_timeout_ms = config.lock_timeout_ms,
            "Configuration resolved"
        );
        Ok(config)
    }

    /// Loads configuration from a TOML file. Missing keys keep their defaults.
    #[instrument(skip(path), fields(path = %path.as_ref().display()))]
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        debug!("Loading config from file");
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::new(format!("Failed to read config file: {}", e)))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| ConfigError::new(format!("Failed to parse config: {}", e)))?;

        debug!(?config, "Config file parsed");
        Ok(config)
    }

    /// Applies `HOST`, `PORT`, `DATABASE_URL` and `LOCK_TIMEOUT_MS` from `lookup`.
    pub fn with_env<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("HOST") {
            self.host = host;
        }
        if let Some(port) = lookup("PORT") {
            self.port = port
                .trim()
                .parse()
                .map_err(|_| ConfigError::new(format!("PORT must be a port number, got '{}'", port)))?;
        }
        if let Some(url) = lookup("DATABASE_URL") {
            self.database_url = url;
        }
        if let Some(ms) = lookup("LOCK_TIMEOUT_MS") {
            self.lock_timeout_ms = ms.trim().parse().map_err(|_| {
                ConfigError::new(format!("LOCK_TIMEOUT_MS must be milliseconds, got '{}'", ms))
            })?;
        }
        Ok(self)
    }

    /// Replaces every field the overrides set.
    pub fn with_overrides(mut self, overrides: &ConfigOverrides) -> Self {
        if let Some(host) = &overrides.host {
            self.host = host.clone();
        }
        if let Some(port) = overrides.port {
            self.port = port;
        }
        if let Some(url) = &overrides.database_url {
            self.database_url = url.clone();
        }
        if let Some(ms) = overrides.lock_timeout_ms {
            self.lock_timeout_ms = ms;
        }
        self
    }

    /// Rejects values the server cannot start with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.host.trim().is_empty() {
            return Err(ConfigError::new("host must not be empty".to_string()));
        }
        if self.database_url.trim().is_empty() {
            return Err(ConfigError::new("database_url must not be empty".to_string()));
        }
        if self.lock_timeout_ms == 0 {
            return Err(ConfigError::new("lock_timeout_ms must be positive".to_string()));
        }
        Ok(())
    }

    /// Lock wait as a [`Duration`].
    pub fn lock_timeout(&self) -> Duration {
        Duration::from_millis(self.lock_timeout_ms)
    }

    /// `host:port` for binding.
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Configuration error.
#[derive(Debug, Clone, Display, Error)]
#[display("Config error: {} at {}:{}", message, file, line)]
pub struct ConfigError {
    /// Error message.
    pub message: String,
    /// Line number where error occurred.
    pub line: u32,
    /// Source file where error occurred.
    pub file: &'static str,
}

impl ConfigError {
    /// Creates a new configuration error.
    #[track_caller]
    #[instrument(skip(message))]
    pub fn new(message: String) -> Self {
        let loc = std::panic::Location::caller();
        Self {
            message,
            line: loc.line(),
            file: loc.file(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ServerConfig::default();
        assert_eq!(config.bind_address(), "127.0.0.1:4000");
        assert_eq!(config.database_url(), "drones.db");
        assert_eq!(config.lock_timeout(), Duration::from_millis(5_000));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = 8080\ndatabase_url = \"arena.db\"").unwrap();

        let config = ServerConfig::from_file(file.path()).unwrap();
        assert_eq!(*config.port(), 8080);
        assert_eq!(config.database_url(), "arena.db");
        assert_eq!(config.host(), "127.0.0.1");
    }

    #[test]
    fn test_malformed_file_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "port = \"many\"").unwrap();
        assert!(ServerConfig::from_file(file.path()).is_err());
    }

    #[test]
    fn test_env_beats_file_and_flags_beat_env() {
        let config = ServerConfig::default()
            .with_env(vars(&[("PORT", "5000"), ("DATABASE_URL", "env.db")]))
            .unwrap()
            .with_overrides(&ConfigOverrides::new(None, Some(6000), None, None));

        assert_eq!(*config.port(), 6000);
        assert_eq!(config.database_url(), "env.db");
    }

    #[test]
    fn test_bad_env_port_is_rejected() {
        let err = ServerConfig::default()
            .with_env(vars(&[("PORT", "eighty")]))
            .unwrap_err();
        assert!(err.message.contains("PORT"));
    }

    #[test]
    fn test_zero_lock_timeout_is_invalid() {
        let config = ServerConfig::default()
            .with_overrides(&ConfigOverrides::new(None, None, None, Some(0)));
        assert!(config.validate().is_err());
    }
}
