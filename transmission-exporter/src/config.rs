//! Exporter configuration.
//!
//! Configuration is loaded from an optional YAML file with environment variable overrides. The
//! file path defaults to `config.yaml` but can be set with `-f` or `TRANSMISSION_EXPORTER_CONFIG`.
//!
//! ## Loading Priority
//!
//! Later sources override earlier ones:
//!
//! 1. **YAML config file** - Base configuration (a missing file is not an error)
//! 2. **Environment variables** - Variables prefixed with `TRANSMISSION_EXPORTER_`, using `__` for
//!    nesting, e.g. `TRANSMISSION_EXPORTER_TRANSMISSION__URL`
//! 3. **Legacy variables** - `TRANSMISSION_ADDR`, `TRANSMISSION_USERNAME`, `TRANSMISSION_PASSWORD`,
//!    `WEB_ADDR` and `WEB_PATH`, as understood by earlier releases of the exporter
//!
//! ## Example
//!
//! ```yaml
//! port: 19091
//! metrics_path: /metrics
//! port_check_interval: 15m
//! transmission:
//!   url: http://localhost:9091
//!   username: admin
//!   request_timeout: 5s
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use url::Url;

use crate::errors::Error;
use crate::transmission::Credentials;

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "TRANSMISSION_EXPORTER_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main exporter configuration. All fields have defaults.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Combined `host:port` (or `:port`) listen address; overrides `host` and `port` when set
    #[serde(skip_serializing_if = "Option::is_none")]
    pub web_addr: Option<String>,
    /// Path the metrics are served on
    pub metrics_path: String,
    /// How to reach the daemon
    pub transmission: TransmissionConfig,
    /// Minimum time between two port reachability tests
    #[serde(with = "humantime_serde")]
    pub port_check_interval: Duration,
    /// Deadline for each collector's remote calls within one scrape
    #[serde(with = "humantime_serde")]
    pub scrape_timeout: Duration,
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
}

#[derive(Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct TransmissionConfig {
    /// Base URL of the daemon; `/transmission/rpc` is appended
    pub url: Url,
    pub username: Option<String>,
    #[serde(skip_serializing)]
    pub password: Option<String>,
    /// Timeout of a single HTTP request to the daemon
    #[serde(with = "humantime_serde")]
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 19091,
            web_addr: None,
            metrics_path: "/metrics".to_string(),
            transmission: TransmissionConfig::default(),
            port_check_interval: Duration::from_secs(15 * 60),
            scrape_timeout: Duration::from_secs(5),
            log_level: "info".to_string(),
        }
    }
}

impl Default for TransmissionConfig {
    fn default() -> Self {
        Self {
            url: Url::parse("http://localhost:9091").expect("static URL is valid"),
            username: None,
            password: None,
            request_timeout: Duration::from_secs(5),
        }
    }
}

// The configuration is logged at startup
impl fmt::Debug for TransmissionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransmissionConfig")
            .field("url", &self.url.as_str())
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl TransmissionConfig {
    pub fn credentials(&self) -> Option<Credentials> {
        self.username.as_ref().map(|username| Credentials {
            username: username.clone(),
            password: self.password.clone(),
        })
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    /// Validate the configuration for consistency
    pub fn validate(&self) -> Result<(), Error> {
        let invalid = |message: String| Err(Error::InvalidConfig { message });

        if !matches!(self.transmission.url.scheme(), "http" | "https") {
            return invalid(format!(
                "transmission.url must use http or https, got '{}'",
                self.transmission.url.scheme()
            ));
        }
        if self.transmission.password.is_some() && self.transmission.username.is_none() {
            return invalid("transmission.password is set but transmission.username is not".to_string());
        }
        if self.transmission.request_timeout.is_zero() || self.scrape_timeout.is_zero() {
            return invalid("transmission.request_timeout and scrape_timeout must be greater than zero".to_string());
        }
        if !self.metrics_path.starts_with('/') {
            return invalid(format!("metrics_path must start with '/', got '{}'", self.metrics_path));
        }
        if self.metrics_path == "/healthz" || self.metrics_path == "/" {
            return invalid(format!("metrics_path '{}' collides with a built-in route", self.metrics_path));
        }

        Ok(())
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // The config path itself is a CLI concern, not a config key
            .merge(Env::prefixed("TRANSMISSION_EXPORTER_").split("__").ignore(&["config"]))
            .merge(Env::raw().only(&["TRANSMISSION_ADDR"]).map(|_| "transmission.url".into()))
            .merge(Env::raw().only(&["TRANSMISSION_USERNAME"]).map(|_| "transmission.username".into()))
            .merge(Env::raw().only(&["TRANSMISSION_PASSWORD"]).map(|_| "transmission.password".into()))
            .merge(Env::raw().only(&["WEB_ADDR"]).map(|_| "web_addr".into()))
            .merge(Env::raw().only(&["WEB_PATH"]).map(|_| "metrics_path".into()))
    }

    pub fn bind_address(&self) -> String {
        match &self.web_addr {
            // Go-style ":19091" means every interface
            Some(addr) if addr.starts_with(':') => format!("0.0.0.0{addr}"),
            Some(addr) => addr.clone(),
            None => format!("{}:{}", self.host, self.port),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn args(config: &str) -> Args {
        Args {
            config: config.to_string(),
            validate: false,
        }
    }

    #[test]
    fn test_defaults_without_file() {
        Jail::expect_with(|_jail| {
            let config = Config::load(&args("missing.yaml"))?;

            assert_eq!(config.bind_address(), "0.0.0.0:19091");
            assert_eq!(config.metrics_path, "/metrics");
            assert_eq!(config.transmission.url.as_str(), "http://localhost:9091/");
            assert_eq!(config.port_check_interval, Duration::from_secs(900));
            assert_eq!(config.scrape_timeout, Duration::from_secs(5));
            assert!(config.transmission.credentials().is_none());
            Ok(())
        });
    }

    #[test]
    fn test_yaml_file() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
port: 9190
port_check_interval: 1h
transmission:
  url: https://nas.local/torrents
  username: admin
  password: secret
  request_timeout: 2s
"#,
            )?;

            let config = Config::load(&args("test.yaml"))?;

            assert_eq!(config.port, 9190);
            assert_eq!(config.port_check_interval, Duration::from_secs(3600));
            assert_eq!(config.transmission.request_timeout, Duration::from_secs(2));
            let credentials = config.transmission.credentials().unwrap();
            assert_eq!(credentials.username, "admin");
            assert_eq!(credentials.password.as_deref(), Some("secret"));
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "port: 9190\n")?;
            jail.set_env("TRANSMISSION_EXPORTER_PORT", "9300");
            jail.set_env("TRANSMISSION_EXPORTER_TRANSMISSION__URL", "http://seedbox:9091");
            jail.set_env("TRANSMISSION_EXPORTER_CONFIG", "test.yaml");

            let config = Config::load(&args("test.yaml"))?;

            assert_eq!(config.port, 9300);
            assert_eq!(config.transmission.url.host_str(), Some("seedbox"));
            Ok(())
        });
    }

    #[test]
    fn test_legacy_variables() {
        Jail::expect_with(|jail| {
            jail.set_env("TRANSMISSION_ADDR", "http://legacy:9091");
            jail.set_env("TRANSMISSION_USERNAME", "old");
            jail.set_env("TRANSMISSION_PASSWORD", "hunter2");
            jail.set_env("WEB_ADDR", ":9999");
            jail.set_env("WEB_PATH", "/prom");

            let config = Config::load(&args("missing.yaml"))?;

            assert_eq!(config.transmission.url.host_str(), Some("legacy"));
            assert_eq!(config.transmission.username.as_deref(), Some("old"));
            assert_eq!(config.transmission.password.as_deref(), Some("hunter2"));
            assert_eq!(config.bind_address(), "0.0.0.0:9999");
            assert_eq!(config.metrics_path, "/prom");
            Ok(())
        });
    }

    #[test]
    fn test_unknown_field_is_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "prot: 9190\n")?;
            assert!(Config::load(&args("test.yaml")).is_err());
            Ok(())
        });
    }

    #[test]
    fn test_debug_output_redacts_password() {
        let mut config = Config::default();
        config.transmission.username = Some("admin".to_string());
        config.transmission.password = Some("hunter2".to_string());

        let debug = format!("{config:#?}");
        assert!(debug.contains("admin"));
        assert!(debug.contains("<redacted>"));
        assert!(!debug.contains("hunter2"));
    }

    #[test]
    fn test_validation() {
        let mut config = Config::default();
        assert!(config.validate().is_ok());

        config.transmission.password = Some("secret".to_string());
        assert!(config.validate().is_err());
        config.transmission.password = None;

        config.metrics_path = "metrics".to_string();
        assert!(config.validate().is_err());
        config.metrics_path = "/healthz".to_string();
        assert!(config.validate().is_err());
        config.metrics_path = "/metrics".to_string();

        config.scrape_timeout = Duration::ZERO;
        assert!(config.validate().is_err());
        config.scrape_timeout = Duration::from_secs(5);

        config.transmission.url = Url::parse("ftp://localhost").unwrap();
        assert!(config.validate().is_err());
    }
}
