use std::sync::LazyLock;

use regex::Regex;
use url::Url;

static FACEBOOK_URL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)^(?:https?://)?(?:(?:[a-z0-9-]+\.)*facebook\.com/(?:watch/?\?v=|videos/|reel/|share/[vr]/|groups/[^/]+/permalink/|story\.php\?story_fbid=|[^/?#]+/videos/)?|fb\.watch/)[a-zA-Z0-9._-]+",
    )
    .expect("valid facebook url regex")
});

/// Query parameters that identify the video on `watch` and `story.php` links.
const KEPT_QUERY_PARAMS: [&str; 3] = ["v", "story_fbid", "id"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UrlCheck {
    Empty,
    Valid,
    Invalid,
}

impl UrlCheck {
    pub fn is_valid(self) -> bool {
        self == UrlCheck::Valid
    }

    pub fn helper_text(self) -> Option<&'static str> {
        match self {
            UrlCheck::Empty => None,
            UrlCheck::Valid => Some("Valid link! Ready to process."),
            UrlCheck::Invalid => Some("Not a supported Facebook link."),
        }
    }
}

pub fn validate_url(input: &str) -> UrlCheck {
    let input = input.trim();
    if input.is_empty() {
        UrlCheck::Empty
    } else if FACEBOOK_URL.is_match(input) {
        UrlCheck::Valid
    } else {
        UrlCheck::Invalid
    }
}

/// Origin and path of `input`, dropping tracking parameters. Inputs that do
/// not parse are returned unchanged.
pub fn normalize_url(input: &str) -> String {
    let input = input.trim();
    let parsed = Url::parse(input).or_else(|_| Url::parse(&format!("https://{input}")));
    let Ok(parsed) = parsed else {
        return input.to_string();
    };

    let mut normalized = format!("{}{}", parsed.origin().ascii_serialization(), parsed.path());
    let kept = parsed
        .query_pairs()
        .filter(|(key, _)| KEPT_QUERY_PARAMS.contains(&key.as_ref()))
        .collect::<Vec<_>>();
    if !kept.is_empty() {
        let query = url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(kept)
            .finish();
        normalized.push('?');
        normalized.push_str(&query);
    }
    normalized
}
