//! HTTP client for catalog page retrieval
//!
//! One GET per call with a browser identity and a hard per-request timeout.
//! Retries are left to the caller; a failed page is simply reported.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{
    Client,
    header::{HeaderMap, HeaderValue, USER_AGENT},
};
use url::Url;

use crate::domain::services::{FetchError, PageFetcher};
use crate::infrastructure::config::CrawlingConfig;

/// HTTP client configuration for catalog fetching
#[derive(Debug, Clone, serde::Serialize)]
pub struct HttpClientConfig {
    pub user_agent: String,
    pub timeout_seconds: u64,
    pub follow_redirects: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self::from(&CrawlingConfig::default())
    }
}

impl From<&CrawlingConfig> for HttpClientConfig {
    fn from(config: &CrawlingConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            timeout_seconds: config.request_timeout_seconds,
            follow_redirects: config.follow_redirects,
        }
    }
}

pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl HttpClient {
    /// Create a new HTTP client with the given configuration
    pub fn new(config: HttpClientConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent).context("Invalid user agent")?,
        );

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .default_headers(headers)
            .redirect(if config.follow_redirects {
                reqwest::redirect::Policy::limited(10)
            } else {
                reqwest::redirect::Policy::none()
            })
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { client, config })
    }

    /// Fetch URL and return text content
    pub async fn get_text(&self, url: &str) -> Result<String, FetchError> {
        let parsed = Url::parse(url).map_err(|e| FetchError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;

        tracing::debug!("Fetching URL: {}", url);

        let response = self
            .client
            .get(parsed)
            .send()
            .await
            .map_err(|e| classify_request_error(url, &e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let text = response.text().await.map_err(|e| {
            if e.is_timeout() {
                FetchError::Timeout { url: url.to_string() }
            } else {
                FetchError::Body {
                    url: url.to_string(),
                    message: e.to_string(),
                }
            }
        })?;

        tracing::debug!("Fetched {} ({}, {} bytes)", url, status, text.len());
        Ok(text)
    }

    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }
}

fn classify_request_error(url: &str, error: &reqwest::Error) -> FetchError {
    if error.is_timeout() {
        FetchError::Timeout { url: url.to_string() }
    } else if error.is_builder() {
        FetchError::InvalidUrl {
            url: url.to_string(),
            reason: error.to_string(),
        }
    } else {
        FetchError::Network {
            url: url.to_string(),
            message: error.to_string(),
        }
    }
}

#[async_trait]
impl PageFetcher for HttpClient {
    async fn fetch(&self, url: &str) -> Result<String, FetchError> {
        self.get_text(url).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;

    fn client_with_timeout(seconds: u64) -> HttpClient {
        HttpClient::new(HttpClientConfig {
            timeout_seconds: seconds,
            ..HttpClientConfig::default()
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_http_client_creation() {
        let client = HttpClient::new(HttpClientConfig::default());
        assert!(client.is_ok());
        assert!(client.unwrap().config().user_agent.contains("Chrome"));
    }

    #[tokio::test]
    async fn test_fetch_sends_browser_user_agent() {
        let server = MockServer::start_async().await;
        let mock = server
            .mock_async(|when, then| {
                when.method(GET).path("/catalog.html").header_exists("user-agent");
                then.status(200).body("<html>catalog</html>");
            })
            .await;

        let client = client_with_timeout(5);
        let body = client.fetch(&server.url("/catalog.html")).await.unwrap();

        assert_eq!(body, "<html>catalog</html>");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_success_status_is_reported() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/missing.html");
                then.status(503);
            })
            .await;

        let client = client_with_timeout(5);
        let err = client.fetch(&server.url("/missing.html")).await.unwrap_err();

        assert!(matches!(err, FetchError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_slow_response_times_out() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/slow.html");
                then.status(200).delay(Duration::from_secs(3)).body("late");
            })
            .await;

        let client = client_with_timeout(1);
        let err = client.fetch(&server.url("/slow.html")).await.unwrap_err();

        assert!(matches!(err, FetchError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_invalid_url_is_rejected_before_sending() {
        let client = client_with_timeout(5);
        let err = client.fetch("not a url").await.unwrap_err();

        assert!(matches!(err, FetchError::InvalidUrl { .. }));
        assert_eq!(err.url(), "not a url");
    }
}
