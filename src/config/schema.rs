//! Configuration schema definitions.
//!
//! All types derive Serde traits for deserialization from config files.
//! Every section has defaults, so an empty file (or no file) is valid.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Root configuration for the service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Database connection settings.
    pub database: DatabaseConfig,

    /// Page rendering and static files.
    pub http: HttpConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:3000").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:3000".to_string(),
        }
    }
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Connection string handed to the driver unexamined.
    /// Usually supplied through `DATABASE_URL`.
    pub url: Option<String>,

    /// Fixed period between reconnect attempts in milliseconds.
    pub retry_interval_ms: u64,

    /// Upper bound on a single connect attempt in seconds.
    pub connect_timeout_secs: u64,

    /// Create the counter table after the first successful connect.
    pub bootstrap_schema: bool,
}

impl DatabaseConfig {
    pub fn retry_interval(&self) -> Duration {
        Duration::from_millis(self.retry_interval_ms)
    }

    pub fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            retry_interval_ms: 1000,
            connect_timeout_secs: 5,
            bootstrap_schema: true,
        }
    }
}

/// Page rendering and static file configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct HttpConfig {
    /// Template rendered for `GET /`.
    pub template_path: String,

    /// Directory served for everything the router does not match.
    pub static_dir: String,

    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            template_path: "views/index.tmpl".to_string(),
            static_dir: "public".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Human readable or JSON lines.
    pub log_format: LogFormat,

    /// Enable the Prometheus metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AppConfig::default();
        assert_eq!(config.listener.bind_address, "0.0.0.0:3000");
        assert!(config.database.url.is_none());
        assert_eq!(config.database.retry_interval(), Duration::from_secs(1));
        assert_eq!(config.http.template_path, "views/index.tmpl");
        assert_eq!(config.observability.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_partial_toml() {
        let config: AppConfig = toml::from_str(
            r#"
            [database]
            retry_interval_ms = 250

            [observability]
            log_format = "json"
            "#,
        )
        .unwrap();

        assert_eq!(config.database.retry_interval_ms, 250);
        assert_eq!(config.database.connect_timeout_secs, 5);
        assert_eq!(config.observability.log_format, LogFormat::Json);
        assert_eq!(config.listener.bind_address, "0.0.0.0:3000");
    }
}
