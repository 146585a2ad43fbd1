use serde::{Deserialize, Serialize};
use std::net::IpAddr;
use std::path::PathBuf;

/// Root configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub remote: RemoteConfig,
    #[serde(default)]
    pub ingest: IngestConfig,
    #[serde(default)]
    pub search: SearchConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: IpAddr,
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> IpAddr {
    "0.0.0.0".parse().unwrap()
}

fn default_port() -> u16 {
    8080
}

/// Local card store configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

fn default_store_path() -> PathBuf {
    PathBuf::from("carddex.db")
}

/// Remote catalog API configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RemoteConfig {
    /// Base URL of the remote card catalog API.
    #[serde(default = "default_remote_base_url")]
    pub base_url: String,
    /// Optional API key sent as the `X-Api-Key` header.
    #[serde(default)]
    pub api_key: Option<String>,
    /// Per-request timeout in seconds.
    #[serde(default = "default_remote_timeout")]
    pub timeout_secs: u32,
    /// Records requested per catalog page.
    #[serde(default = "default_remote_page_size")]
    pub page_size: u32,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: default_remote_base_url(),
            api_key: None,
            timeout_secs: default_remote_timeout(),
            page_size: default_remote_page_size(),
        }
    }
}

fn default_remote_base_url() -> String {
    "https://api.pokemontcg.io/v2".to_string()
}

fn default_remote_timeout() -> u32 {
    45
}

fn default_remote_page_size() -> u32 {
    250
}

/// Ingestion pipeline tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestConfig {
    /// Records written per sub-batch within a page.
    #[serde(default = "default_batch_size")]
    pub batch_size: u32,
    /// Delay between sub-batches (milliseconds).
    #[serde(default = "default_batch_delay_ms")]
    pub batch_delay_ms: u64,
    /// Delay between catalog pages (milliseconds).
    #[serde(default = "default_page_delay_ms")]
    pub page_delay_ms: u64,
    /// Fetch attempts per page before the page counts as failed.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Initial retry backoff (milliseconds), doubled per attempt.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,
    /// Backoff ceiling (milliseconds).
    #[serde(default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,
    /// Consecutive failed pages before the run stops.
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: u32,
    /// First page to ingest when no checkpoint exists.
    #[serde(default = "default_start_page")]
    pub start_page: u32,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_delay_ms: default_batch_delay_ms(),
            page_delay_ms: default_page_delay_ms(),
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_cap_ms: default_backoff_cap_ms(),
            max_consecutive_failures: default_max_consecutive_failures(),
            start_page: default_start_page(),
        }
    }
}

fn default_batch_size() -> u32 {
    25
}

fn default_batch_delay_ms() -> u64 {
    100
}

fn default_page_delay_ms() -> u64 {
    1000
}

fn default_max_retries() -> u32 {
    5
}

fn default_backoff_base_ms() -> u64 {
    1000
}

fn default_backoff_cap_ms() -> u64 {
    16_000
}

fn default_max_consecutive_failures() -> u32 {
    3
}

fn default_start_page() -> u32 {
    1
}

/// Query engine tuning
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchConfig {
    /// Result cache time-to-live in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Maximum cached result pages; oldest evicted first.
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Page size applied when the caller supplies none.
    #[serde(default = "default_search_page_size")]
    pub default_page_size: u32,
    /// Upper bound on requested page size.
    #[serde(default = "default_max_page_size")]
    pub max_page_size: u32,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: default_cache_ttl_secs(),
            cache_capacity: default_cache_capacity(),
            default_page_size: default_search_page_size(),
            max_page_size: default_max_page_size(),
        }
    }
}

fn default_cache_ttl_secs() -> u64 {
    300
}

fn default_cache_capacity() -> usize {
    100
}

fn default_search_page_size() -> u32 {
    20
}

fn default_max_page_size() -> u32 {
    250
}

/// Sanitized config for API responses (secrets redacted)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedConfig {
    pub server: ServerConfig,
    pub store: StoreConfig,
    pub remote: SanitizedRemoteConfig,
    pub ingest: IngestConfig,
    pub search: SearchConfig,
}

/// Sanitized remote config (API key hidden)
#[derive(Debug, Clone, Serialize)]
pub struct SanitizedRemoteConfig {
    pub base_url: String,
    pub api_key_configured: bool,
    pub timeout_secs: u32,
    pub page_size: u32,
}

impl From<&Config> for SanitizedConfig {
    fn from(config: &Config) -> Self {
        Self {
            server: config.server.clone(),
            store: config.store.clone(),
            remote: SanitizedRemoteConfig {
                base_url: config.remote.base_url.clone(),
                api_key_configured: config
                    .remote
                    .api_key
                    .as_ref()
                    .is_some_and(|k| !k.is_empty()),
                timeout_secs: config.remote.timeout_secs,
                page_size: config.remote.page_size,
            },
            ingest: config.ingest.clone(),
            search: config.search.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.store.path.to_str().unwrap(), "carddex.db");
        assert_eq!(config.remote.base_url, "https://api.pokemontcg.io/v2");
        assert_eq!(config.remote.page_size, 250);
        assert_eq!(config.search.cache_ttl_secs, 300);
        assert_eq!(config.search.cache_capacity, 100);
    }

    #[test]
    fn test_deserialize_custom_sections() {
        let toml = r#"
[server]
host = "127.0.0.1"
port = 9000

[store]
path = "/data/cards.sqlite"

[remote]
base_url = "http://localhost:9999/v2"
api_key = "secret"
page_size = 50

[ingest]
batch_size = 10
max_consecutive_failures = 5
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.store.path.to_str().unwrap(), "/data/cards.sqlite");
        assert_eq!(config.remote.api_key.as_deref(), Some("secret"));
        assert_eq!(config.remote.page_size, 50);
        assert_eq!(config.ingest.batch_size, 10);
        assert_eq!(config.ingest.max_consecutive_failures, 5);
        // untouched sections keep defaults
        assert_eq!(config.ingest.max_retries, 5);
        assert_eq!(config.search.default_page_size, 20);
    }

    #[test]
    fn test_sanitized_config_redacts_api_key() {
        let mut config = Config::default();
        config.remote.api_key = Some("very-secret".to_string());

        let sanitized = SanitizedConfig::from(&config);
        assert!(sanitized.remote.api_key_configured);

        let json = serde_json::to_string(&sanitized).unwrap();
        assert!(!json.contains("very-secret"));
    }

    #[test]
    fn test_sanitized_config_without_api_key() {
        let config = Config::default();
        let sanitized = SanitizedConfig::from(&config);
        assert!(!sanitized.remote.api_key_configured);
    }
}
