//! Client side of the downloader: input validation, the call to
//! `/api/parse`, recent-URL history, theme preference and file download.
//!
//! All state lives in an [`AppContext`] built once by the front end and
//! passed to every handler.

use std::path::{Path, PathBuf};

use reqwest::StatusCode;
use tracing::{debug, warn};
use url::Url;

use crate::model::{ErrorBody, Quality, VideoMetadata};

pub mod download;
pub mod history;
pub mod storage;
pub mod theme;
pub mod validate;

pub use download::{DownloadOutcome, Opener, SystemOpener};
pub use storage::{FileStorage, LocalStorage, MemoryStorage};
pub use theme::Theme;
pub use validate::UrlCheck;

pub const DEFAULT_API_URL: &str = "http://localhost:3000/api/parse";
const GENERIC_FAILURE: &str = "Failed to process the link.";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("could not access {path}: {source}")]
    Storage {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid stored data: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("invalid API URL: {0}")]
    InvalidApiUrl(#[from] url::ParseError),
    #[error("could not open {0}")]
    Open(String),
    #[error("no {0} source in the current result")]
    NothingToDownload(String),
    #[error("no home directory found, pass --state-dir")]
    NoStateDir,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ViewState {
    Idle,
    Loading,
    Success(VideoMetadata),
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeKind {
    Success,
    Error,
}

/// Short message for the user, shown once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub kind: NoticeKind,
    pub message: String,
}

impl Notice {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: NoticeKind::Error,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl ApiClient {
    pub fn new(endpoint: &str) -> Result<Self, ClientError> {
        Ok(Self {
            http: reqwest::Client::builder().build()?,
            endpoint: Url::parse(endpoint)?,
        })
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// Any non-2xx answer is reduced to the most specific message it carries.
    pub async fn parse(&self, url: &str) -> Result<VideoMetadata, String> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&serde_json::json!({ "url": url }))
            .send()
            .await
            .map_err(|error| format!("Could not reach the server: {error}"))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|error| format!("Could not read the server response: {error}"))?;

        if status.is_success() {
            return serde_json::from_slice::<VideoMetadata>(&bytes)
                .map_err(|error| format!("Unexpected server response: {error}"));
        }

        debug!("API answered {status}");
        Err(failure_message(status, &bytes))
    }
}

fn failure_message(status: StatusCode, body: &[u8]) -> String {
    serde_json::from_slice::<ErrorBody>(body)
        .ok()
        .and_then(|body| {
            body.details
                .filter(|details| !details.trim().is_empty())
                .or(Some(body.error).filter(|error| !error.trim().is_empty()))
        })
        .unwrap_or_else(|| match status.canonical_reason() {
            Some(reason) => format!("{GENERIC_FAILURE} ({} {reason})", status.as_u16()),
            None => GENERIC_FAILURE.to_string(),
        })
}

pub struct AppContext<S, O> {
    api: ApiClient,
    storage: S,
    opener: O,
    system_theme: Theme,
    view: ViewState,
}

impl<S: LocalStorage, O: Opener> AppContext<S, O> {
    pub fn new(api: ApiClient, storage: S, opener: O, system_theme: Theme) -> Self {
        Self {
            api,
            storage,
            opener,
            system_theme,
            view: ViewState::Idle,
        }
    }

    pub fn view(&self) -> &ViewState {
        &self.view
    }

    pub fn storage(&self) -> &S {
        &self.storage
    }

    pub fn check_input(&self, input: &str) -> UrlCheck {
        validate::validate_url(input)
    }

    /// Calls take `&mut self`, so a submission cannot overlap another one.
    /// A dropped call leaves `Loading` behind and the next call replaces it.
    pub async fn submit(&mut self, input: &str) -> Notice {
        let url = input.trim();
        if !validate::validate_url(url).is_valid() {
            self.view = ViewState::Error("Invalid Facebook link!".to_string());
            return Notice::error("Invalid Facebook link!");
        }

        if let Err(error) = history::save_to_history(&mut self.storage, url) {
            warn!("Could not update history: {error}");
        }

        self.view = ViewState::Loading;
        match self.api.parse(&validate::normalize_url(url)).await {
            Ok(metadata) => {
                self.view = ViewState::Success(metadata);
                Notice::success("Video extracted!")
            }
            Err(message) => {
                self.view = ViewState::Error(message.clone());
                Notice::error(message)
            }
        }
    }

    pub fn history(&self) -> Vec<String> {
        history::load_history(&self.storage)
    }

    pub fn clear_history(&mut self) -> Result<(), ClientError> {
        history::clear_history(&mut self.storage)
    }

    /// Submits the history entry at `index` (0 is the most recent).
    pub async fn resubmit(&mut self, index: usize) -> Notice {
        match self.history().get(index).cloned() {
            Some(url) => self.submit(&url).await,
            None => Notice::error(format!("No history entry #{}", index + 1)),
        }
    }

    pub fn theme(&self) -> Theme {
        theme::resolve_theme(&self.storage, self.system_theme)
    }

    pub fn toggle_theme(&mut self) -> Result<Theme, ClientError> {
        theme::toggle_theme(&mut self.storage, self.system_theme)
    }

    pub async fn download(&self, quality: Quality, dir: &Path) -> Result<DownloadOutcome, ClientError> {
        let ViewState::Success(metadata) = &self.view else {
            return Err(ClientError::NothingToDownload(quality.to_string()));
        };
        let source = metadata
            .sources
            .iter()
            .find(|source| source.quality == quality)
            .ok_or_else(|| ClientError::NothingToDownload(quality.to_string()))?;

        download::download_source(self.api.http(), &self.opener, source, &metadata.title, dir).await
    }
}
