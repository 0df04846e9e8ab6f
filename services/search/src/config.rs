use serde::Deserialize;
use std::time::Duration;

/// Main configuration for the search service
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// Database configuration
    pub database: DatabaseConfig,
    /// Search engine configuration
    #[serde(default)]
    pub search: SearchConfig,
    /// API configuration
    #[serde(default)]
    pub api: ApiConfig,
    /// Media link configuration
    #[serde(default)]
    pub links: LinksConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging/metrics
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Metrics port
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL
    pub url: String,
    /// Maximum number of connections in the pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Connection timeout in seconds
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Idle connection timeout in seconds
    #[serde(default = "default_idle_timeout_secs")]
    pub idle_timeout_secs: u64,
}

/// Search engine configuration
#[derive(Debug, Clone, Deserialize)]
pub struct SearchConfig {
    /// Upper bound for `per_page`
    #[serde(default = "default_max_per_page")]
    pub max_per_page: u32,
    /// `per_page` used when the request does not set one
    #[serde(default = "default_per_page")]
    pub default_per_page: u32,
    /// Representative seconds kept per acquisition
    #[serde(default = "default_samples_per_acquisition")]
    pub samples_per_acquisition: usize,
    /// Media extensions returned when the request sets none
    #[serde(default = "default_extensions")]
    pub default_extensions: Vec<String>,
    /// Sample straight from the media store when no modality filter is active
    #[serde(default = "default_true")]
    pub fast_path_enabled: bool,
}

/// API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// API listen address
    #[serde(default = "default_api_host")]
    pub host: String,
    /// API listen port
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// Enable CORS
    #[serde(default = "default_true")]
    pub cors_enabled: bool,
    /// Allowed CORS origins
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Request timeout in seconds; in-flight store queries are dropped on expiry
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

/// Media link configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LinksConfig {
    #[serde(default)]
    pub presign: PresignConfig,
}

/// Presigning of `s3://bucket/key` links
#[derive(Debug, Clone, Deserialize)]
pub struct PresignConfig {
    #[serde(default)]
    pub enabled: bool,
    /// AWS region
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint URL (for MinIO, LocalStack, etc.)
    pub endpoint_url: Option<String>,
    /// Force path-style access (required for MinIO)
    #[serde(default)]
    pub force_path_style: bool,
    /// Presigned URL expiration in seconds
    #[serde(default = "default_presigned_url_expiry_secs")]
    pub expiry_secs: u64,
}

// Default value functions
fn default_service_name() -> String {
    "search-service".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_max_connections() -> u32 {
    10
}

fn default_min_connections() -> u32 {
    2
}

fn default_connect_timeout_secs() -> u64 {
    30
}

fn default_idle_timeout_secs() -> u64 {
    600
}

fn default_max_per_page() -> u32 {
    1000
}

fn default_per_page() -> u32 {
    50
}

fn default_samples_per_acquisition() -> usize {
    5
}

fn default_extensions() -> Vec<String> {
    vec!["jpg".to_string(), "jpeg".to_string(), "png".to_string()]
}

fn default_true() -> bool {
    true
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_presigned_url_expiry_secs() -> u64 {
    3600
}

impl Config {
    /// Load configuration from environment and config files
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            // Add config file if present
            .add_source(config::File::with_name("config/search").required(false))
            .add_source(config::File::with_name("/etc/vehicle-search/search").required(false))
            // Override with environment variables
            // SEARCH__DATABASE__URL -> database.url
            .add_source(
                config::Environment::with_prefix("SEARCH")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("search.default_extensions")
                    .with_list_parse_key("api.cors_origins")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    /// Reject settings the engine cannot honour
    pub fn validate(&self) -> anyhow::Result<()> {
        anyhow::ensure!(
            self.search.max_per_page >= 1,
            "search.max_per_page must be at least 1"
        );
        anyhow::ensure!(
            self.search.samples_per_acquisition >= 1,
            "search.samples_per_acquisition must be at least 1"
        );
        anyhow::ensure!(
            !self.search.default_extensions.is_empty(),
            "search.default_extensions must not be empty"
        );

        Ok(())
    }
}

impl ApiConfig {
    /// Get HTTP request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

impl PresignConfig {
    /// Get presigned URL expiry as Duration
    pub fn expiry(&self) -> Duration {
        Duration::from_secs(self.expiry_secs)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            max_per_page: default_max_per_page(),
            default_per_page: default_per_page(),
            samples_per_acquisition: default_samples_per_acquisition(),
            default_extensions: default_extensions(),
            fast_path_enabled: true,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
            cors_enabled: true,
            cors_origins: Vec::new(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for PresignConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            region: default_region(),
            endpoint_url: None,
            force_path_style: false,
            expiry_secs: default_presigned_url_expiry_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml: &str) -> Config {
        config::Config::builder()
            .add_source(config::File::from_str(toml, config::FileFormat::Toml))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap()
    }

    #[test]
    fn test_default_values() {
        assert_eq!(default_samples_per_acquisition(), 5);
        assert_eq!(default_max_per_page(), 1000);
        assert_eq!(default_extensions(), vec!["jpg", "jpeg", "png"]);
    }

    #[test]
    fn test_minimal_config_fills_defaults() {
        let config = parse(
            r#"
            [database]
            url = "postgres://localhost/vehicles"
            "#,
        );

        assert_eq!(config.search.default_per_page, 50);
        assert!(config.search.fast_path_enabled);
        assert!(!config.links.presign.enabled);
        assert_eq!(config.api.request_timeout(), Duration::from_secs(30));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_samples_rejected() {
        let config = parse(
            r#"
            [database]
            url = "postgres://localhost/vehicles"

            [search]
            samples_per_acquisition = 0
            "#,
        );

        assert!(config.validate().is_err());
    }
}
