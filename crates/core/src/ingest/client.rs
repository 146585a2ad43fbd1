//! Remote catalog client.
//!
//! The remote source sits behind the [`RemoteCatalog`] trait so the
//! pipeline can be driven by a mock in tests. The production
//! implementation talks to the card API over HTTP with a per-request
//! timeout on the client.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use thiserror::Error;
use tracing::debug;

use crate::config::RemoteConfig;

use super::types::{RemoteCard, RemotePage, RemoteSet};

#[derive(Debug, Error)]
pub enum RemoteCatalogError {
    #[error("Remote catalog not configured: {0}")]
    NotConfigured(String),

    #[error("Remote catalog rate limit exceeded")]
    RateLimitExceeded,

    #[error("Remote resource not found: {0}")]
    NotFound(String),

    #[error("Remote catalog error ({status}): {message}")]
    ApiError { status: u16, message: String },

    #[error("Failed to parse remote response: {0}")]
    ParseError(String),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),
}

impl RemoteCatalogError {
    /// Whether a retry with backoff can reasonably succeed.
    pub fn is_transient(&self) -> bool {
        match self {
            RemoteCatalogError::RateLimitExceeded | RemoteCatalogError::HttpError(_) => true,
            RemoteCatalogError::ApiError { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

/// Paginated remote card catalog.
#[async_trait]
pub trait RemoteCatalog: Send + Sync {
    async fn fetch_sets(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<RemotePage<RemoteSet>, RemoteCatalogError>;

    async fn fetch_cards(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<RemotePage<RemoteCard>, RemoteCatalogError>;
}

/// HTTP client for the card API.
pub struct HttpRemoteCatalog {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl HttpRemoteCatalog {
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteCatalogError> {
        if config.base_url.is_empty() {
            return Err(RemoteCatalogError::NotConfigured(
                "remote base URL is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(u64::from(config.timeout_secs)))
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    async fn fetch_page<T: serde::de::DeserializeOwned>(
        &self,
        resource: &str,
        page: u32,
        page_size: u32,
    ) -> Result<RemotePage<T>, RemoteCatalogError> {
        let url = format!("{}/{}", self.base_url, resource);
        debug!(resource, page, page_size, "Fetching remote catalog page");

        let mut request = self
            .client
            .get(&url)
            .query(&[("page", page.to_string()), ("pageSize", page_size.to_string())]);

        if let Some(key) = &self.api_key {
            request = request.header("X-Api-Key", key);
        }

        let response = request.send().await?;

        let status = response.status();
        if status == 401 || status == 403 {
            return Err(RemoteCatalogError::NotConfigured(
                "Invalid or missing API key".to_string(),
            ));
        }
        if status == 429 {
            return Err(RemoteCatalogError::RateLimitExceeded);
        }
        if status == 404 {
            return Err(RemoteCatalogError::NotFound(resource.to_string()));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteCatalogError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }

        response.json().await.map_err(|e| {
            RemoteCatalogError::ParseError(format!(
                "Failed to parse {} page {}: {}",
                resource, page, e
            ))
        })
    }
}

#[async_trait]
impl RemoteCatalog for HttpRemoteCatalog {
    async fn fetch_sets(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<RemotePage<RemoteSet>, RemoteCatalogError> {
        self.fetch_page("sets", page, page_size).await
    }

    async fn fetch_cards(
        &self,
        page: u32,
        page_size: u32,
    ) -> Result<RemotePage<RemoteCard>, RemoteCatalogError> {
        self.fetch_page("cards", page, page_size).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_requires_base_url() {
        let config = RemoteConfig {
            base_url: String::new(),
            ..Default::default()
        };
        assert!(matches!(
            HttpRemoteCatalog::new(&config),
            Err(RemoteCatalogError::NotConfigured(_))
        ));
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let config = RemoteConfig {
            base_url: "https://api.pokemontcg.io/v2/".to_string(),
            ..Default::default()
        };
        let catalog = HttpRemoteCatalog::new(&config).unwrap();
        assert_eq!(catalog.base_url, "https://api.pokemontcg.io/v2");
    }

    #[test]
    fn test_transient_classification() {
        assert!(RemoteCatalogError::RateLimitExceeded.is_transient());
        assert!(RemoteCatalogError::ApiError {
            status: 503,
            message: String::new()
        }
        .is_transient());
        assert!(!RemoteCatalogError::ApiError {
            status: 400,
            message: String::new()
        }
        .is_transient());
        assert!(!RemoteCatalogError::NotFound("cards".to_string()).is_transient());
    }
}
