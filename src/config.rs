use clap::Parser;
use humantime_serde::re::humantime;
use std::net::SocketAddr;
use std::time::Duration;
use validator::Validate;

use crate::error::{GatewayError, Result};
use crate::rate_limiter::RateLimitRule;
use crate::tmdb::DEFAULT_BASE_URL;

fn parse_duration(raw: &str) -> std::result::Result<Duration, humantime::DurationError> {
    humantime::parse_duration(raw)
}

#[derive(Debug, Clone, Parser, Validate)]
#[command(name = "moviegate", version, about = "Rate-limited movie metadata gateway")]
pub struct Config {
    /// Server bind address
    #[arg(long, env = "BIND_ADDR", default_value = "127.0.0.1:8080")]
    pub bind_addr: SocketAddr,

    /// Requests admitted per route within one window
    #[arg(long, env = "REQUEST_RATE", default_value_t = 40)]
    #[validate(range(min = 1, message = "request rate must be at least 1"))]
    pub request_rate: u32,

    /// Length of a rate limiting window
    #[arg(long, env = "RATE_WINDOW", default_value = "60s", value_parser = parse_duration)]
    pub rate_window: Duration,

    /// Interval between sweeps of expired rate limit windows, in seconds
    #[arg(long = "cleanup-interval-secs", env = "CLEANUP_INTERVAL", default_value_t = 300)]
    #[validate(range(min = 1, message = "cleanup interval must be at least 1 second"))]
    pub cleanup_interval_secs: u64,

    /// TMDB API key. Without one the built-in catalog serves requests.
    #[arg(long, env = "TMDB_API_KEY")]
    pub tmdb_api_key: Option<String>,

    /// TMDB API base URL
    #[arg(long, env = "TMDB_BASE_URL", default_value = DEFAULT_BASE_URL)]
    #[validate(url(message = "TMDB base URL must be a valid URL"))]
    pub tmdb_base_url: String,

    /// Timeout for a single upstream HTTP request
    #[arg(long, env = "UPSTREAM_TIMEOUT", default_value = "10s", value_parser = parse_duration)]
    pub upstream_timeout: Duration,

    /// Simulated rating computation time of the built-in catalog
    #[arg(long, env = "CATALOG_RATING_DELAY", default_value = "90s", value_parser = parse_duration)]
    pub catalog_rating_delay: Duration,

    /// Default log level when RUST_LOG is unset
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Config {
    /// Parse command line and environment, then validate
    pub fn load() -> Result<Self> {
        let config = Config::parse();
        config.check()?;
        Ok(config)
    }

    pub fn check(&self) -> Result<()> {
        self.validate()
            .map_err(|e| GatewayError::ValidationError(e.to_string()))?;
        self.rate_limit_rule().validate()
    }

    pub fn rate_limit_rule(&self) -> RateLimitRule {
        RateLimitRule::new(self.request_rate, self.rate_window)
    }

    pub fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }

    pub fn uses_tmdb(&self) -> bool {
        self.tmdb_api_key
            .as_deref()
            .is_some_and(|key| !key.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_override_defaults() {
        let config = Config::try_parse_from([
            "moviegate",
            "--request-rate",
            "3",
            "--rate-window",
            "2m",
            "--bind-addr",
            "0.0.0.0:9000",
        ])
        .unwrap();

        assert_eq!(config.request_rate, 3);
        assert_eq!(config.rate_window, Duration::from_secs(120));
        assert_eq!(config.bind_addr.port(), 9000);
        assert_eq!(config.rate_limit_rule(), RateLimitRule::new(3, Duration::from_secs(120)));
        assert!(config.check().is_ok());
    }

    #[test]
    fn test_zero_request_rate_rejected() {
        let config = Config::try_parse_from(["moviegate", "--request-rate", "0"]).unwrap();
        assert!(matches!(config.check(), Err(GatewayError::ValidationError(_))));
    }

    #[test]
    fn test_zero_window_rejected() {
        let config = Config::try_parse_from(["moviegate", "--rate-window", "0s"]).unwrap();
        assert!(config.check().is_err());
    }

    #[test]
    fn test_invalid_base_url_rejected() {
        let config =
            Config::try_parse_from(["moviegate", "--tmdb-base-url", "not a url"]).unwrap();
        assert!(config.check().is_err());
    }

    #[test]
    fn test_blank_api_key_means_catalog() {
        let config = Config::try_parse_from(["moviegate", "--tmdb-api-key", "  "]).unwrap();
        assert!(!config.uses_tmdb());

        let config = Config::try_parse_from(["moviegate", "--tmdb-api-key", "abc"]).unwrap();
        assert!(config.uses_tmdb());
    }
}
