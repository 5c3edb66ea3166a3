use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Runtime configuration, read once at startup.
///
/// Every flag can also be supplied through the environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "checkip-service", version, about = "Client IP, location and timezone lookup page")]
pub struct Config {
    /// Address to listen on; `:3000` binds every interface
    #[arg(long, env = "LISTEN_ADDR", default_value = ":3000")]
    pub listen_addr: String,

    /// Base URL of the IP geolocation API
    #[arg(long, env = "GEO_API_URL", default_value = "http://api.ipstack.com")]
    pub geo_api_url: String,

    /// Access key for the IP geolocation API
    #[arg(long, env = "GEO_ACCESS_KEY", hide_env_values = true)]
    pub geo_access_key: String,

    /// Endpoint of the timezone lookup API
    #[arg(
        long,
        env = "TIMEZONE_API_URL",
        default_value = "http://api.geonames.org/timezoneJSON"
    )]
    pub timezone_api_url: String,

    /// Account name for the timezone lookup API
    #[arg(long, env = "TIMEZONE_USERNAME", hide_env_values = true)]
    pub timezone_username: String,

    /// Timeout for each outbound provider call, in seconds
    #[arg(long, env = "UPSTREAM_TIMEOUT_SECS", default_value_t = 4)]
    pub upstream_timeout_secs: u64,

    /// Replace the built-in index page template
    #[arg(long, env = "INDEX_TEMPLATE")]
    pub index_template: Option<PathBuf>,

    #[arg(long, env = "LOG_FORMAT", value_enum, default_value_t = LogFormat::Pretty)]
    pub log_format: LogFormat,

    /// Serve the OpenAPI document at /api-docs/openapi.json
    #[arg(long = "openapi", env = "ENABLE_OPENAPI")]
    pub openapi: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Pretty,
    Json,
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid listen address `{0}`: expected host:port or :port")]
pub struct ListenAddrError(pub String);

impl Config {
    pub fn upstream_timeout(&self) -> Duration {
        Duration::from_secs(self.upstream_timeout_secs)
    }

    pub fn bind_addr(&self) -> Result<String, ListenAddrError> {
        bind_addr(&self.listen_addr)
    }
}

/// Normalise a listen address into something `TcpListener::bind` accepts.
///
/// An empty host (`:3000`) means every IPv4 interface.
pub fn bind_addr(listen_addr: &str) -> Result<String, ListenAddrError> {
    let invalid = || ListenAddrError(listen_addr.to_string());

    let (host, port) = listen_addr.rsplit_once(':').ok_or_else(invalid)?;
    port.parse::<u16>().map_err(|_| invalid())?;

    if host.is_empty() {
        Ok(format!("0.0.0.0:{}", port))
    } else {
        Ok(listen_addr.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_port_binds_every_interface() {
        assert_eq!(bind_addr(":3000").unwrap(), "0.0.0.0:3000");
    }

    #[test]
    fn explicit_host_is_kept() {
        assert_eq!(bind_addr("127.0.0.1:8080").unwrap(), "127.0.0.1:8080");
        assert_eq!(bind_addr("localhost:8080").unwrap(), "localhost:8080");
        assert_eq!(bind_addr("[::1]:8080").unwrap(), "[::1]:8080");
    }

    #[test]
    fn missing_or_bad_port_is_rejected() {
        assert!(bind_addr("3000").is_err());
        assert!(bind_addr("localhost:http").is_err());
        assert!(bind_addr(":70000").is_err());
    }

    #[test]
    fn defaults_apply_when_only_credentials_are_given() {
        let config = Config::try_parse_from([
            "checkip-service",
            "--geo-access-key",
            "key",
            "--timezone-username",
            "demo",
        ])
        .unwrap();

        assert_eq!(config.listen_addr, ":3000");
        assert_eq!(config.geo_api_url, "http://api.ipstack.com");
        assert_eq!(config.timezone_api_url, "http://api.geonames.org/timezoneJSON");
        assert_eq!(config.upstream_timeout(), Duration::from_secs(4));
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.index_template.is_none());
        assert!(!config.openapi);
    }
}
