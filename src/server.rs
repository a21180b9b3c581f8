use std::{
    collections::HashSet,
    net::{IpAddr, SocketAddr},
    sync::Arc,
};

use axum::{
    Json, Router,
    body::Body,
    extract::{ConnectInfo, DefaultBodyLimit, State, rejection::JsonRejection},
    http::{HeaderMap, HeaderName, HeaderValue, Method, Request, header},
    routing::{get, post},
};
use tokio::net::TcpListener;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    set_header::SetResponseHeaderLayer,
    trace::TraceLayer,
};
use tracing::{debug, error, info, info_span, warn};
use url::Url;
use uuid::Uuid;

use crate::{
    config::{ServerConfig, non_empty},
    error::ApiError,
    extractor::{FacebookExtractor, LinkExtractor},
    model::{ParseRequest, VideoMetadata},
    rate_limit::RateLimiter,
};

const MAX_BODY_BYTES: usize = 100 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub extractor: Arc<dyn LinkExtractor>,
    pub rate_limiter: Arc<RateLimiter>,
    pub trust_proxy_headers: bool,
}

impl AppState {
    pub fn new(extractor: Arc<dyn LinkExtractor>, config: &ServerConfig) -> Self {
        Self {
            extractor,
            rate_limiter: Arc::new(RateLimiter::new(
                config.rate_limit_max,
                config.rate_limit_window,
            )),
            trust_proxy_headers: config.trust_proxy_headers,
        }
    }
}

pub async fn run(config: ServerConfig) -> Result<(), ApiError> {
    let extractor = FacebookExtractor::new(config.upstream_timeout)
        .map_err(|error| ApiError::internal(format!("Could not create HTTP client: {error}")))?;
    let state = AppState::new(Arc::new(extractor), &config);

    if !config.trust_proxy_headers {
        warn!("TRUST_PROXY_HEADERS=false: the socket address is used for rate limiting.");
    }
    info!(
        "Rate limit: {} request(s) per {}s per address",
        config.rate_limit_max,
        config.rate_limit_window.as_secs()
    );

    let _sweeper = state.rate_limiter.spawn_sweeper();
    let app = build_router(state, build_cors_layer(&config.allowed_origins)?);

    let listener = TcpListener::bind(&config.bind_addr)
        .await
        .map_err(|error| {
            ApiError::internal(format!("Could not bind {}: {error}", config.bind_addr))
        })?;

    info!("Backend running on http://{}", config.bind_addr);

    serve(listener, app).await
}

pub async fn serve(listener: TcpListener, app: Router) -> Result<(), ApiError> {
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|error| ApiError::internal(format!("HTTP server error: {error}")))
}

async fn shutdown_signal() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!("Could not install Ctrl+C handler: {error}");
    }
    info!("Shutting down");
}

pub fn build_router(state: AppState, cors: CorsLayer) -> Router {
    let trace = TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
        info_span!(
            "request",
            id = %Uuid::new_v4(),
            method = %request.method(),
            path = %request.uri().path(),
        )
    });

    Router::new()
        .route("/api/health", get(health))
        .route("/api/parse", post(parse_video))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .layer(security_header(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(security_header(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("SAMEORIGIN"),
        ))
        .layer(security_header(
            header::REFERRER_POLICY,
            HeaderValue::from_static("no-referrer"),
        ))
        .layer(security_header(
            HeaderName::from_static("cross-origin-opener-policy"),
            HeaderValue::from_static("same-origin"),
        ))
        .layer(trace)
}

fn security_header(name: HeaderName, value: HeaderValue) -> SetResponseHeaderLayer<HeaderValue> {
    SetResponseHeaderLayer::if_not_present(name, value)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({"status": "ok"}))
}

async fn parse_video(
    State(state): State<AppState>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    payload: Result<Json<ParseRequest>, JsonRejection>,
) -> Result<Json<VideoMetadata>, ApiError> {
    let client_ip = client_ip_for_request(&state, &headers, addr);
    if let Err(limited) = state.rate_limiter.check(&client_ip).await {
        warn!("Rate limit hit for {client_ip}: {limited}");
        return Err(ApiError::rate_limited(limited.retry_after_seconds));
    }

    let Json(payload) = payload.map_err(|rejection| {
        debug!("Rejected request body from {client_ip}: {rejection}");
        ApiError::bad_request("Request body must be JSON like {\"url\": \"...\"}.")
    })?;
    let url = payload
        .url
        .as_deref()
        .and_then(non_empty)
        .ok_or_else(ApiError::missing_url)?;

    match state.extractor.fetch_video_links(url).await {
        Ok(metadata) => {
            info!(
                "Extracted {} source(s) for {url:?} ({client_ip})",
                metadata.sources.len()
            );
            Ok(Json(metadata))
        }
        Err(extract_error) => {
            error!(
                "Parser error [{}] for {url:?}: {extract_error}",
                extract_error.kind()
            );
            Err(ApiError::extraction_failed())
        }
    }
}

/// Headers set by reverse proxies, most specific first. Only the first hop
/// of `x-forwarded-for` is the client.
const PROXY_ADDRESS_HEADERS: [&str; 3] = ["x-forwarded-for", "cf-connecting-ip", "x-real-ip"];

fn forwarded_address(headers: &HeaderMap) -> Option<IpAddr> {
    PROXY_ADDRESS_HEADERS.iter().find_map(|name| {
        let value = headers.get(*name)?.to_str().ok()?;
        value.split(',').next()?.trim().parse().ok()
    })
}

fn client_ip_for_request(state: &AppState, headers: &HeaderMap, addr: SocketAddr) -> String {
    let forwarded = state
        .trust_proxy_headers
        .then(|| forwarded_address(headers))
        .flatten();
    forwarded.unwrap_or(addr.ip()).to_string()
}

/// An empty allow-list accepts any origin, like a bare `cors()` setup.
pub fn build_cors_layer(configured: &[String]) -> Result<CorsLayer, ApiError> {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers(Any);

    if configured.is_empty() {
        warn!("ALLOWED_ORIGINS is not set. Requests from any origin are accepted.");
        return Ok(base.allow_origin(Any));
    }

    let normalized_origins = configured
        .iter()
        .map(|origin| {
            normalize_origin(origin).ok_or_else(|| {
                ApiError::internal(format!(
                    "Invalid origin in ALLOWED_ORIGINS: {origin}. Use values like https://example.com"
                ))
            })
        })
        .collect::<Result<HashSet<_>, _>>()?;

    info!(
        "CORS allow-list loaded with {} origin(s): {:?}",
        normalized_origins.len(),
        normalized_origins
    );

    let allowed_origins = Arc::new(normalized_origins);
    let allow_origin = AllowOrigin::predicate(move |origin: &HeaderValue, _| {
        let normalized = origin.to_str().ok().and_then(normalize_origin);
        let allowed = normalized
            .as_ref()
            .is_some_and(|value| allowed_origins.contains(value));
        debug!("CORS origin check raw={origin:?} normalized={normalized:?} allowed={allowed}");
        allowed
    });

    Ok(base.allow_origin(allow_origin))
}

fn normalize_origin(value: &str) -> Option<String> {
    let parsed = Url::parse(value).ok()?;
    let host = parsed.host_str()?.to_ascii_lowercase();
    let scheme = parsed.scheme();
    let default_port = match scheme {
        "http" => 80,
        "https" => 443,
        _ => return None,
    };

    if parsed.path() != "/" || parsed.query().is_some() || parsed.fragment().is_some() {
        return None;
    }

    match parsed.port() {
        Some(port) if port != default_port => Some(format!("{scheme}://{host}:{port}")),
        _ => Some(format!("{scheme}://{host}")),
    }
}
