//! Collaborator interfaces used by the monitoring pipeline
//!
//! The orchestrator receives these as explicitly constructed handles
//! (`Arc<dyn ...>`), so tests can substitute in-process stubs.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::product::ProductListing;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    #[error("Request to {url} timed out")]
    Timeout { url: String },

    #[error("HTTP error {status}: {url}")]
    Status { status: u16, url: String },

    #[error("HTTP request failed for {url}: {message}")]
    Network { url: String, message: String },

    #[error("Failed to read response body from {url}: {message}")]
    Body { url: String, message: String },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            Self::InvalidUrl { url, .. }
            | Self::Timeout { url }
            | Self::Status { url, .. }
            | Self::Network { url, .. }
            | Self::Body { url, .. } => url,
        }
    }
}

#[derive(Error, Debug)]
pub enum NotificationError {
    #[error("Notification transport failed: {0}")]
    Transport(String),

    #[error("Notification rejected by API ({status}): {description}")]
    Rejected { status: u16, description: String },
}

/// Retrieves raw markup for one URL. No retries at this layer.
#[async_trait]
pub trait PageFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<String, FetchError>;
}

/// Delivers one message per catalog event
#[async_trait]
pub trait ProductNotifier: Send + Sync {
    async fn notify_new(&self, product: &ProductListing) -> Result<(), NotificationError>;

    async fn notify_returned(&self, product: &ProductListing) -> Result<(), NotificationError>;
}
