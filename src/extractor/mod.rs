//! Video link extraction.
//!
//! Scraping third-party markup has no contract with the upstream site, so the
//! rest of the crate only talks to [`LinkExtractor`]. Swapping the scraping
//! strategy means adding another implementation, not touching the endpoint.

use async_trait::async_trait;

use crate::model::VideoMetadata;

pub mod facebook;
mod markup;

pub use facebook::FacebookExtractor;

#[derive(Debug, thiserror::Error)]
pub enum ExtractError {
    #[error("unsupported domain in {0:?}")]
    InvalidDomain(String),
    #[error("no video links found in the page")]
    NoVideoFound,
    #[error("failed to fetch the page: {0}")]
    Fetch(#[from] reqwest::Error),
    #[error("upstream responded with HTTP {0}")]
    UpstreamStatus(reqwest::StatusCode),
}

impl ExtractError {
    /// Short tag used in logs.
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractError::InvalidDomain(_) => "invalid_domain",
            ExtractError::NoVideoFound
            | ExtractError::Fetch(_)
            | ExtractError::UpstreamStatus(_) => "extraction",
        }
    }
}

#[async_trait]
pub trait LinkExtractor: Send + Sync {
    async fn fetch_video_links(&self, url: &str) -> Result<VideoMetadata, ExtractError>;
}
