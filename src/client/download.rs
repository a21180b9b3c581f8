use std::{
    path::{Path, PathBuf},
    process::{Command, Stdio},
};

use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};

use super::ClientError;
use crate::model::{Quality, VideoSource};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Downloaded(PathBuf),
    OpenedExternally(String),
}

/// Hands a URL to something outside the process, usually the desktop browser.
pub trait Opener {
    fn open(&self, url: &str) -> Result<(), ClientError>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemOpener;

impl Opener for SystemOpener {
    fn open(&self, url: &str) -> Result<(), ClientError> {
        let mut command = if cfg!(target_os = "macos") {
            Command::new("open")
        } else if cfg!(target_os = "windows") {
            let mut command = Command::new("cmd");
            command.args(["/C", "start", ""]);
            command
        } else {
            Command::new("xdg-open")
        };

        command
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .map(|_| ())
            .map_err(|error| ClientError::Open(format!("{url}: {error}")))
    }
}

/// Saves the media next to `dir`, or hands the link to `opener` when the
/// file cannot be fetched.
pub async fn download_source(
    http: &reqwest::Client,
    opener: &dyn Opener,
    source: &VideoSource,
    title: &str,
    dir: &Path,
) -> Result<DownloadOutcome, ClientError> {
    let target = dir.join(download_filename(title, source.quality));

    match fetch_to_file(http, &source.url, &target).await {
        Ok(()) => Ok(DownloadOutcome::Downloaded(target)),
        Err(error) => {
            warn!("Direct download failed, opening link instead: {error}");
            opener.open(&source.url)?;
            Ok(DownloadOutcome::OpenedExternally(source.url.clone()))
        }
    }
}

async fn fetch_to_file(http: &reqwest::Client, url: &str, target: &Path) -> Result<(), ClientError> {
    let partial = target.with_extension("part");
    let result = async {
        let mut response = http.get(url).send().await?.error_for_status()?;
        let mut file = tokio::fs::File::create(&partial)
            .await
            .map_err(|source| ClientError::Storage {
                path: partial.clone(),
                source,
            })?;

        let mut written = 0usize;
        while let Some(chunk) = response.chunk().await? {
            file.write_all(&chunk)
                .await
                .map_err(|source| ClientError::Storage {
                    path: partial.clone(),
                    source,
                })?;
            written += chunk.len();
        }
        file.flush().await.map_err(|source| ClientError::Storage {
            path: partial.clone(),
            source,
        })?;
        debug!("Wrote {written} bytes to {}", partial.display());

        tokio::fs::rename(&partial, target)
            .await
            .map_err(|source| ClientError::Storage {
                path: target.to_path_buf(),
                source,
            })
    }
    .await;

    if result.is_err() {
        let _ = tokio::fs::remove_file(&partial).await;
    }
    result
}

/// `<title>-<quality>.mp4` with everything but word characters, spaces and
/// dashes removed from the title.
pub fn download_filename(title: &str, quality: Quality) -> String {
    let cleaned = title
        .chars()
        .filter(|character| {
            character.is_ascii_alphanumeric() || matches!(character, '_' | '-' | ' ')
        })
        .collect::<String>();
    let cleaned = cleaned.split_whitespace().collect::<Vec<_>>().join(" ");
    let stem = if cleaned.is_empty() {
        "video".to_string()
    } else {
        cleaned
    };

    format!("{stem}-{quality}.mp4")
}
