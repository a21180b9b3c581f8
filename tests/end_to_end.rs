use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use axum::{Router, routing::get};
use fbgrab::{
    client::{
        ApiClient, AppContext, ClientError, DownloadOutcome, MemoryStorage, NoticeKind, Opener,
        Theme, ViewState,
    },
    config::ServerConfig,
    error::{EXTRACTION_FAILED_DETAILS, MISSING_URL_MESSAGE, RATE_LIMITED_MESSAGE},
    extractor::{ExtractError, LinkExtractor},
    model::{FileSize, Quality, VideoMetadata, VideoSource},
    server::{AppState, build_cors_layer, build_router, serve},
};
use tempfile::tempdir;
use tokio::net::TcpListener;

const MEDIA_BYTES: &[u8] = b"\x00\x00\x00\x18ftypmp42 fake media";

struct StubExtractor {
    media_base: String,
    seen: Mutex<Vec<String>>,
}

#[async_trait]
impl LinkExtractor for StubExtractor {
    async fn fetch_video_links(&self, url: &str) -> Result<VideoMetadata, ExtractError> {
        self.seen.lock().unwrap().push(url.to_string());
        if url.contains("private") {
            return Err(ExtractError::NoVideoFound);
        }
        Ok(VideoMetadata {
            title: "Cat plays football".to_string(),
            thumbnail: "https://img.example/cat.jpg".to_string(),
            duration: "01:24".to_string(),
            sources: vec![
                VideoSource {
                    quality: Quality::Hd,
                    kind: "mp4".to_string(),
                    url: format!("{}/media/hd.mp4", self.media_base),
                    size_mb: FileSize::unknown(),
                },
                VideoSource {
                    quality: Quality::Sd,
                    kind: "mp4".to_string(),
                    url: format!("{}/media/missing.mp4", self.media_base),
                    size_mb: FileSize::unknown(),
                },
            ],
        })
    }
}

#[derive(Default, Clone)]
struct RecordingOpener {
    opened: Arc<Mutex<Vec<String>>>,
}

impl Opener for RecordingOpener {
    fn open(&self, url: &str) -> Result<(), ClientError> {
        self.opened.lock().unwrap().push(url.to_string());
        Ok(())
    }
}

struct TestServer {
    addr: SocketAddr,
    extractor: Arc<StubExtractor>,
}

impl TestServer {
    async fn start(rate_limit_max: usize) -> Self {
        let media_listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let media_addr = media_listener.local_addr().unwrap();
        let media = Router::new().route("/media/hd.mp4", get(|| async { MEDIA_BYTES }));
        tokio::spawn(async move {
            axum::serve(media_listener, media).await.unwrap();
        });

        let extractor = Arc::new(StubExtractor {
            media_base: format!("http://{media_addr}"),
            seen: Mutex::new(Vec::new()),
        });
        let config = ServerConfig {
            rate_limit_max,
            rate_limit_window: Duration::from_secs(15 * 60),
            ..ServerConfig::default()
        };
        let state = AppState::new(extractor.clone(), &config);
        let app = build_router(state, build_cors_layer(&[]).unwrap());

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            serve(listener, app).await.unwrap();
        });

        Self { addr, extractor }
    }

    fn url(&self, path: &str) -> String {
        format!("http://{}{path}", self.addr)
    }

    fn context(&self) -> (AppContext<MemoryStorage, RecordingOpener>, RecordingOpener) {
        let opener = RecordingOpener::default();
        let api = ApiClient::new(&self.url("/api/parse")).unwrap();
        let ctx = AppContext::new(api, MemoryStorage::default(), opener.clone(), Theme::Dark);
        (ctx, opener)
    }
}

#[tokio::test]
async fn submit_renders_metadata_and_records_history() {
    let server = TestServer::start(20).await;
    let (mut ctx, _) = server.context();

    let notice = ctx
        .submit(" https://www.facebook.com/watch/?v=42&ref=share ")
        .await;

    assert_eq!(notice.kind, NoticeKind::Success);
    let ViewState::Success(metadata) = ctx.view() else {
        panic!("expected a result, got {:?}", ctx.view());
    };
    assert_eq!(metadata.title, "Cat plays football");
    assert_eq!(metadata.sources[0].quality, Quality::Hd);
    assert_eq!(
        ctx.history(),
        vec!["https://www.facebook.com/watch/?v=42&ref=share"]
    );
    assert_eq!(
        *server.extractor.seen.lock().unwrap(),
        vec!["https://www.facebook.com/watch/?v=42"]
    );
}

#[tokio::test]
async fn extraction_failure_surfaces_server_details() {
    let server = TestServer::start(20).await;
    let (mut ctx, _) = server.context();

    let notice = ctx.submit("https://www.facebook.com/private/videos/1").await;

    assert_eq!(notice.kind, NoticeKind::Error);
    assert_eq!(notice.message, EXTRACTION_FAILED_DETAILS);
    assert_eq!(
        *ctx.view(),
        ViewState::Error(EXTRACTION_FAILED_DETAILS.to_string())
    );
}

#[tokio::test]
async fn rate_limited_client_sees_rejection_message() {
    let server = TestServer::start(2).await;
    let (mut ctx, _) = server.context();

    for _ in 0..2 {
        let notice = ctx.submit("https://fb.watch/abc/").await;
        assert_eq!(notice.kind, NoticeKind::Success);
    }

    let notice = ctx.submit("https://fb.watch/abc/").await;
    assert_eq!(notice.kind, NoticeKind::Error);
    assert_eq!(notice.message, RATE_LIMITED_MESSAGE);
    assert_eq!(ctx.history().len(), 1);
}

#[tokio::test]
async fn download_saves_file_or_falls_back_to_opening() {
    let server = TestServer::start(20).await;
    let (mut ctx, opener) = server.context();
    let dir = tempdir().unwrap();

    ctx.submit("https://fb.watch/abc/").await;

    let saved = ctx.download(Quality::Hd, dir.path()).await.unwrap();
    let expected = dir.path().join("Cat plays football-HD.mp4");
    assert_eq!(saved, DownloadOutcome::Downloaded(expected.clone()));
    assert_eq!(std::fs::read(&expected).unwrap(), MEDIA_BYTES);

    let fallback = ctx.download(Quality::Sd, dir.path()).await.unwrap();
    let DownloadOutcome::OpenedExternally(url) = fallback else {
        panic!("expected the link to be opened externally");
    };
    assert!(url.ends_with("/media/missing.mp4"));
    assert_eq!(*opener.opened.lock().unwrap(), vec![url]);
}

#[tokio::test]
async fn raw_http_contract() {
    let server = TestServer::start(20).await;
    let http = reqwest::Client::new();

    let missing = http
        .post(server.url("/api/parse"))
        .json(&serde_json::json!({}))
        .send()
        .await
        .unwrap();
    assert_eq!(missing.status(), reqwest::StatusCode::BAD_REQUEST);
    assert_eq!(
        missing.json::<serde_json::Value>().await.unwrap(),
        serde_json::json!({ "error": MISSING_URL_MESSAGE })
    );

    let malformed = http
        .post(server.url("/api/parse"))
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body("{\"url\":")
        .send()
        .await
        .unwrap();
    assert_eq!(malformed.status(), reqwest::StatusCode::BAD_REQUEST);
    assert!(
        malformed.json::<serde_json::Value>().await.unwrap()["error"].is_string()
    );

    let failed = http
        .post(server.url("/api/parse"))
        .json(&serde_json::json!({ "url": "https://www.facebook.com/private/1" }))
        .send()
        .await
        .unwrap();
    assert_eq!(failed.status(), reqwest::StatusCode::INTERNAL_SERVER_ERROR);
    let body = failed.json::<serde_json::Value>().await.unwrap();
    assert!(body["error"].is_string());
    assert!(body["details"].is_string());
    assert!(body["suggestion"].is_string());

    let health = http.get(server.url("/api/health")).send().await.unwrap();
    assert_eq!(health.status(), reqwest::StatusCode::OK);
    assert_eq!(health.headers()["x-content-type-options"], "nosniff");
    assert_eq!(health.headers()["x-frame-options"], "SAMEORIGIN");
}
