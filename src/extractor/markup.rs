use std::sync::LazyLock;

use regex::{Captures, Regex};

static META_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<meta\s[^>]*>").expect("valid meta regex"));
static ATTRIBUTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)([a-zA-Z_:\-]+)\s*=\s*(?:"([^"]*)"|'([^']*)')"#).expect("valid attr regex")
});
static TITLE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid title regex"));
static HTML_ENTITY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"&(#[xX][0-9a-fA-F]+|#[0-9]+|amp|lt|gt|quot|apos|nbsp);")
        .expect("valid entity regex")
});

/// `content` of the first `<meta>` whose `property` or `name` equals `key`.
pub fn meta_content(html: &str, key: &str) -> Option<String> {
    META_TAG.find_iter(html).find_map(|tag| {
        let mut matches_key = false;
        let mut content = None;
        for attribute in ATTRIBUTE.captures_iter(tag.as_str()) {
            let name = attribute[1].to_ascii_lowercase();
            let value = attribute
                .get(2)
                .or_else(|| attribute.get(3))
                .map(|value| value.as_str())
                .unwrap_or_default();
            match name.as_str() {
                "property" | "name" if value.eq_ignore_ascii_case(key) => matches_key = true,
                "content" => content = Some(value.to_string()),
                _ => {}
            }
        }
        if matches_key { content } else { None }
    })
}

pub fn title_tag(html: &str) -> Option<String> {
    TITLE_TAG
        .captures(html)
        .map(|captures| captures[1].trim().to_string())
}

pub fn decode_html_entities(value: &str) -> String {
    HTML_ENTITY
        .replace_all(value, |captures: &Captures<'_>| {
            let entity = &captures[1];
            let decoded = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" => Some('\''),
                "nbsp" => Some('\u{a0}'),
                _ => {
                    let code = if let Some(hex) = entity
                        .strip_prefix("#x")
                        .or_else(|| entity.strip_prefix("#X"))
                    {
                        u32::from_str_radix(hex, 16).ok()
                    } else {
                        entity.trim_start_matches('#').parse::<u32>().ok()
                    };
                    code.and_then(char::from_u32)
                }
            };
            decoded
                .map(String::from)
                .unwrap_or_else(|| captures[0].to_string())
        })
        .into_owned()
}

/// Resolves the backslash escaping a value carries while embedded in a
/// script string literal (`https:\/\/…`, `%`, …).
pub fn unescape_embedded(raw: &str) -> String {
    serde_json::from_str::<String>(&format!("\"{raw}\""))
        .unwrap_or_else(|_| raw.replace("\\/", "/").replace('\\', ""))
}
