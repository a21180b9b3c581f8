use std::{sync::LazyLock, time::Duration};

use async_trait::async_trait;
use regex::Regex;
use reqwest::header::{ACCEPT, ACCEPT_LANGUAGE, USER_AGENT};
use tracing::debug;
use url::Url;

use super::{ExtractError, LinkExtractor, markup};
use crate::model::{FileSize, Quality, VideoMetadata, VideoSource};

pub const MOBILE_USER_AGENT: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 16_0 like Mac OS X) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/16.0 Mobile/15E148 Safari/604.1";

pub const ACCEPTED_HOST_FRAGMENTS: [&str; 2] = ["facebook.com", "fb.watch"];

pub const FALLBACK_TITLE: &str = "Facebook Video";
pub const FALLBACK_THUMBNAIL: &str =
    "https://images.unsplash.com/photo-1514888286974-6c03e2ca1dba?q=80&w=500";
pub const FALLBACK_DURATION: &str = "--:--";
const TITLE_SUFFIX: &str = " | Facebook";

static HD_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:"playable_url_quality_hd"|"?\bhd_src"?)\s*:\s*"((?:[^"\\]|\\.)+)""#)
        .expect("valid HD regex")
});
static SD_LINK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?:"playable_url"|"?\bsd_src"?)\s*:\s*"((?:[^"\\]|\\.)+)""#)
        .expect("valid SD regex")
});
static DURATION_MS: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#""playable_duration_in_ms"\s*:\s*(\d+)"#).expect("valid duration regex")
});

/// Scrapes public Facebook pages with a mobile browser identity.
#[derive(Debug, Clone)]
pub struct FacebookExtractor {
    client: reqwest::Client,
}

impl FacebookExtractor {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(client))
    }

    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn fetch_page(&self, url: &Url) -> Result<String, ExtractError> {
        let response = self
            .client
            .get(url.as_str())
            .header(USER_AGENT, MOBILE_USER_AGENT)
            .header(ACCEPT, "text/html,application/xhtml+xml")
            .header(ACCEPT_LANGUAGE, "en-US,en;q=0.9")
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(ExtractError::UpstreamStatus(response.status()));
        }

        Ok(response.text().await?)
    }
}

#[async_trait]
impl LinkExtractor for FacebookExtractor {
    async fn fetch_video_links(&self, url: &str) -> Result<VideoMetadata, ExtractError> {
        let target = ensure_supported_url(url)?;
        let html = self.fetch_page(&target).await?;
        debug!("Fetched {} bytes from {target}", html.len());
        parse_page(&html)
    }
}

/// Rejects inputs that are not Facebook links. Runs before any network call.
pub fn ensure_supported_url(input: &str) -> Result<Url, ExtractError> {
    let trimmed = input.trim();
    let invalid = || ExtractError::InvalidDomain(trimmed.to_string());

    if !ACCEPTED_HOST_FRAGMENTS
        .iter()
        .any(|fragment| trimmed.contains(fragment))
    {
        return Err(invalid());
    }

    let parsed = Url::parse(trimmed)
        .or_else(|_| Url::parse(&format!("https://{trimmed}")))
        .map_err(|_| invalid())?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid());
    }

    let host = parsed.host_str().ok_or_else(invalid)?.to_ascii_lowercase();
    let accepted = ACCEPTED_HOST_FRAGMENTS
        .iter()
        .any(|domain| host == *domain || host.ends_with(&format!(".{domain}")));
    if accepted { Ok(parsed) } else { Err(invalid()) }
}

/// Builds the metadata record from fetched page text.
pub fn parse_page(html: &str) -> Result<VideoMetadata, ExtractError> {
    let sources = [(Quality::Hd, &*HD_LINK), (Quality::Sd, &*SD_LINK)]
        .into_iter()
        .filter_map(|(quality, pattern)| {
            let raw = pattern.captures(html)?.get(1)?.as_str();
            Some(VideoSource {
                quality,
                kind: "mp4".to_string(),
                url: markup::decode_html_entities(&markup::unescape_embedded(raw)),
                size_mb: FileSize::unknown(),
            })
        })
        .collect::<Vec<_>>();

    if sources.is_empty() {
        return Err(ExtractError::NoVideoFound);
    }

    Ok(VideoMetadata {
        title: extract_title(html),
        thumbnail: extract_thumbnail(html),
        duration: extract_duration(html),
        sources,
    })
}

fn extract_title(html: &str) -> String {
    markup::meta_content(html, "og:title")
        .or_else(|| markup::title_tag(html))
        .map(|title| markup::decode_html_entities(&title))
        .map(|title| {
            let title = title.trim();
            title.strip_suffix(TITLE_SUFFIX).unwrap_or(title).trim().to_string()
        })
        .filter(|title| !title.is_empty())
        .unwrap_or_else(|| FALLBACK_TITLE.to_string())
}

fn extract_thumbnail(html: &str) -> String {
    markup::meta_content(html, "og:image")
        .map(|image| markup::decode_html_entities(&image))
        .filter(|image| !image.trim().is_empty())
        .unwrap_or_else(|| FALLBACK_THUMBNAIL.to_string())
}

fn extract_duration(html: &str) -> String {
    DURATION_MS
        .captures(html)
        .and_then(|captures| captures[1].parse::<u64>().ok())
        .map(|millis| format_duration(millis / 1000))
        .unwrap_or_else(|| FALLBACK_DURATION.to_string())
}

fn format_duration(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes:02}:{seconds:02}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HD_URL: &str = r"https:\/\/video.xx.fbcdn.net\/v\/t42\/hd.mp4?_nc_cat=1&oh=ab%3D";
    const SD_URL: &str = r"https:\/\/video.xx.fbcdn.net\/v\/t42\/sd.mp4?_nc_cat=1";

    fn page(body: &str) -> String {
        format!(
            r#"<html><head><title>Cat plays football | Facebook</title>
            <meta property="og:image" content="https://scontent.example/thumb.jpg?a=1&amp;b=2" />
            </head><body><script>{body}</script></body></html>"#
        )
    }

    #[test]
    fn hd_only_page_yields_single_hd_source() {
        let html = page(&format!(
            r#"{{"playable_url_quality_hd":"{HD_URL}","playable_url":null}}"#
        ));

        let metadata = parse_page(&html).unwrap();
        assert_eq!(metadata.sources.len(), 1);
        assert_eq!(metadata.sources[0].quality, Quality::Hd);
        assert_eq!(
            metadata.sources[0].url,
            "https://video.xx.fbcdn.net/v/t42/hd.mp4?_nc_cat=1&oh=ab%3D"
        );
    }

    #[test]
    fn hd_is_listed_before_sd() {
        let html = page(&format!(
            r#"{{"playable_url":"{SD_URL}","playable_url_quality_hd":"{HD_URL}"}}"#
        ));

        let metadata = parse_page(&html).unwrap();
        let qualities = metadata
            .sources
            .iter()
            .map(|source| source.quality)
            .collect::<Vec<_>>();
        assert_eq!(qualities, vec![Quality::Hd, Quality::Sd]);
        assert!(metadata.sources.iter().all(|source| source.kind == "mp4"));
        assert_eq!(
            metadata.sources[1].url,
            "https://video.xx.fbcdn.net/v/t42/sd.mp4?_nc_cat=1"
        );
    }

    #[test]
    fn legacy_src_keys_are_recognised() {
        let html = page(&format!(r#"videoData:[{{sd_src:"{SD_URL}",sd_src_no_ratelimit:"x"}}]"#));

        let metadata = parse_page(&html).unwrap();
        assert_eq!(metadata.sources.len(), 1);
        assert_eq!(metadata.sources[0].quality, Quality::Sd);
    }

    #[test]
    fn page_without_links_is_an_extraction_error() {
        let html = page(r#"{"playable_url":null,"video_id":"1"}"#);
        assert!(matches!(parse_page(&html), Err(ExtractError::NoVideoFound)));
    }

    #[test]
    fn facebook_title_suffix_is_stripped() {
        let html = page(&format!(r#"{{"playable_url":"{SD_URL}"}}"#));

        let metadata = parse_page(&html).unwrap();
        assert_eq!(metadata.title, "Cat plays football");
        assert_eq!(
            metadata.thumbnail,
            "https://scontent.example/thumb.jpg?a=1&b=2"
        );
    }

    #[test]
    fn og_title_wins_over_title_tag() {
        let html = format!(
            r#"<title>Log in | Facebook</title><meta content="Tom &amp; Jerry | Facebook" property="og:title">
            <script>{{"playable_url":"{SD_URL}"}}</script>"#
        );

        assert_eq!(parse_page(&html).unwrap().title, "Tom & Jerry");
    }

    #[test]
    fn only_the_trailing_suffix_is_removed() {
        let html = format!(
            r#"<meta property="og:title" content="Best of | Facebook Live clips | Facebook" />
            <script>{{"playable_url":"{SD_URL}"}}</script>"#
        );

        assert_eq!(
            parse_page(&html).unwrap().title,
            "Best of | Facebook Live clips"
        );
    }

    #[test]
    fn missing_metadata_uses_fallbacks() {
        let html = format!(r#"<script>{{"playable_url":"{SD_URL}"}}</script>"#);

        let metadata = parse_page(&html).unwrap();
        assert_eq!(metadata.title, FALLBACK_TITLE);
        assert_eq!(metadata.thumbnail, FALLBACK_THUMBNAIL);
        assert_eq!(metadata.duration, FALLBACK_DURATION);
        assert_eq!(metadata.sources[0].size_mb, FileSize::unknown());
    }

    #[test]
    fn duration_is_formatted_for_display() {
        let html = format!(
            r#"<script>{{"playable_url":"{SD_URL}","playable_duration_in_ms":84500}}</script>"#
        );
        assert_eq!(parse_page(&html).unwrap().duration, "01:24");
        assert_eq!(format_duration(3725), "1:02:05");
    }

    #[test]
    fn foreign_urls_are_rejected_as_invalid_domain() {
        for input in [
            "https://www.youtube.com/watch?v=abc",
            "not a url at all",
            "",
            "https://example.com/?next=fb-watch",
        ] {
            assert!(
                matches!(ensure_supported_url(input), Err(ExtractError::InvalidDomain(_))),
                "{input}"
            );
        }
    }

    #[test]
    fn fragment_outside_the_host_is_rejected() {
        for input in [
            "https://evil.example/facebook.com/videos/1",
            "https://notfacebook.com/watch/?v=1",
            "ftp://www.facebook.com/videos/1",
        ] {
            assert!(
                matches!(ensure_supported_url(input), Err(ExtractError::InvalidDomain(_))),
                "{input}"
            );
        }
    }

    #[test]
    fn facebook_hosts_are_accepted() {
        for input in [
            "https://www.facebook.com/watch/?v=123",
            "https://m.facebook.com/reel/456",
            "https://fb.watch/abcDEF/",
            "www.facebook.com/user/videos/789",
        ] {
            assert!(ensure_supported_url(input).is_ok(), "{input}");
        }
    }

    #[tokio::test]
    async fn invalid_domain_fails_before_any_fetch() {
        let extractor = FacebookExtractor::new(Duration::from_millis(1)).unwrap();

        let error = extractor
            .fetch_video_links("https://vimeo.com/123")
            .await
            .unwrap_err();
        assert!(matches!(error, ExtractError::InvalidDomain(_)));
        assert_eq!(error.kind(), "invalid_domain");
    }
}
