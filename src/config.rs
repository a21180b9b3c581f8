use std::time::Duration;

pub const DEFAULT_PORT: u16 = 3000;
pub const DEFAULT_RATE_LIMIT_MAX: usize = 20;
pub const DEFAULT_RATE_LIMIT_WINDOW_SECONDS: u64 = 15 * 60;
pub const DEFAULT_UPSTREAM_TIMEOUT_SECONDS: u64 = 20;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub rate_limit_max: usize,
    pub rate_limit_window: Duration,
    pub upstream_timeout: Duration,
    pub trust_proxy_headers: bool,
    pub allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self::from_lookup(|_| None)
    }
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let rate_limit_max = read_parsed::<usize>(&lookup, "RATE_LIMIT_MAX")
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_RATE_LIMIT_MAX);
        let rate_limit_window = read_parsed::<u64>(&lookup, "RATE_LIMIT_WINDOW_SECONDS")
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_RATE_LIMIT_WINDOW_SECONDS);
        let upstream_timeout = read_parsed::<u64>(&lookup, "UPSTREAM_TIMEOUT_SECONDS")
            .filter(|value| *value > 0)
            .unwrap_or(DEFAULT_UPSTREAM_TIMEOUT_SECONDS);
        let allowed_origins = lookup("ALLOWED_ORIGINS")
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|origin| !origin.is_empty())
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
            })
            .unwrap_or_default();

        Self {
            bind_addr: resolve_bind_addr(&lookup),
            rate_limit_max,
            rate_limit_window: Duration::from_secs(rate_limit_window),
            upstream_timeout: Duration::from_secs(upstream_timeout),
            trust_proxy_headers: read_bool(&lookup, "TRUST_PROXY_HEADERS").unwrap_or(false),
            allowed_origins,
        }
    }
}

fn resolve_bind_addr(lookup: &impl Fn(&str) -> Option<String>) -> String {
    if let Some(configured) = lookup("APP_ADDR")
        .as_deref()
        .and_then(non_empty)
        .map(ToString::to_string)
    {
        return configured;
    }

    let port = read_parsed::<u16>(lookup, "PORT").unwrap_or(DEFAULT_PORT);
    format!("0.0.0.0:{port}")
}

fn read_bool(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<bool> {
    let value = lookup(name)?;
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn read_parsed<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Option<T> {
    lookup(name).and_then(|value| value.trim().parse::<T>().ok())
}

pub fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}
