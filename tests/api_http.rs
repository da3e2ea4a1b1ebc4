// tests/api_http.rs
//
// HTTP-level tests for the public Router without opening sockets.
// We exercise the router directly via tower::ServiceExt::oneshot.
//
// Covered:
// - GET /health, /config, /layers, /layers/{label}/{z}/{x}/{y}
// - GET /daily.json, /daily, /rss.xml
// - GET /cache?url= (hit/miss headers, host allow-list, upstream failure)
// - GET /metrics

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value as Json;
use shuttle_axum::axum::{
    body::{self, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use tempfile::TempDir;
use tower::ServiceExt as _; // for `oneshot`

use blr_yesterday::cache::{CacheController, CacheError, CacheRequest, CachedResponse, Fetcher};
use blr_yesterday::config::{AppConfig, SiteConfig};
use blr_yesterday::daily::DailyLoader;
use blr_yesterday::metrics::Metrics;
use blr_yesterday::{create_router, AppState};

const BODY_LIMIT: usize = 1024 * 1024;

const DAILY: &str = r#"{"days":[
    {"files":["2022-10-25_05-06-01_UTC.jpg"],"description":"Mysore Bank circle"},
    {"files":["2022-12-25_05-00-26_UTC_1.jpg","2022-12-25_05-00-26_UTC_2.jpg"],"description":"St. Mark's <Cathedral>"},
    {"files":["2023-01-26_04-30-00_UTC.jpg"],"description":""},
    {"files":[],"description":"empty day"}
]}"#;

/// Answers every request with a tile-ish body; optionally fails.
#[derive(Default)]
struct TileFetcher {
    calls: AtomicUsize,
    offline: bool,
}

#[async_trait]
impl Fetcher for TileFetcher {
    async fn fetch(&self, req: &CacheRequest) -> Result<CachedResponse, CacheError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.offline {
            return Err(CacheError::Network("connection refused".into()));
        }
        Ok(CachedResponse {
            status: 200,
            content_type: Some("image/png".into()),
            body: Arc::new(req.url.path().as_bytes().to_vec()),
        })
    }
}

struct TestApp {
    router: Router,
    fetcher: Arc<TileFetcher>,
    _dir: TempDir,
}

fn build(daily_json: Option<&str>, fetcher: TileFetcher) -> TestApp {
    let dir = tempfile::tempdir().expect("tempdir");
    let daily_path = dir.path().join("daily.json");
    if let Some(body) = daily_json {
        std::fs::write(&daily_path, body).expect("write daily.json");
    }

    let site = SiteConfig::blr();
    let config = AppConfig {
        daily_json_path: daily_path.clone(),
        ..AppConfig::default()
    };
    let fetcher = Arc::new(fetcher);
    let origin = reqwest::Url::parse(&site.site_info.canonical_url).expect("origin");
    let cache = CacheController::with_default_policies(&origin, fetcher.clone(), None);
    let loader = DailyLoader::from_file(&daily_path);

    let state = AppState::with_parts(site, config, loader, cache).expect("state");
    let metrics = Metrics::init().expect("metrics");
    TestApp {
        router: create_router(state, &metrics),
        fetcher,
        _dir: dir,
    }
}

fn test_app() -> TestApp {
    build(Some(DAILY), TileFetcher::default())
}

async fn get(app: &Router, uri: &str) -> Response {
    let req = Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .expect("build request");
    app.clone().oneshot(req).await.expect("oneshot")
}

async fn body_string(resp: Response) -> String {
    let bytes = body::to_bytes(resp.into_body(), BODY_LIMIT)
        .await
        .expect("read body")
        .to_vec();
    String::from_utf8(bytes).expect("utf8")
}

fn header_str<'a>(resp: &'a Response, name: &str) -> &'a str {
    resp.headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
}

#[tokio::test]
async fn health_returns_ok() {
    let app = test_app();
    let resp = get(&app.router, "/health").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_string(resp).await.trim(), "OK");
}

#[tokio::test]
async fn config_is_served_as_camel_case_json() {
    let app = test_app();
    let resp = get(&app.router, "/config").await;
    assert_eq!(resp.status(), StatusCode::OK);

    let v: Json = serde_json::from_str(&body_string(resp).await).expect("json");
    assert_eq!(v["siteInfo"]["name"], "BLR Yesterday");
    assert_eq!(v["mapConfig"]["defaultYearIndex"], 6);
    assert_eq!(v["availableYears"].as_array().map(Vec::len), Some(18));
}

#[tokio::test]
async fn layers_report_default_from_eligible_years() {
    let app = test_app();
    let v: Json =
        serde_json::from_str(&body_string(get(&app.router, "/layers").await).await).expect("json");
    assert_eq!(v["default"]["year"], 1948);
    assert_eq!(v["default"]["label"], "1940");
    assert_eq!(v["years"].as_array().map(Vec::len), Some(18));
}

#[tokio::test]
async fn layer_tile_redirects_to_template() {
    let app = test_app();

    let resp = get(&app.router, "/layers/1940/14/11720/7585").await;
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        header_str(&resp, "location"),
        "https://maps.blryesterday.com/1948/14/11720/7585.png"
    );

    // labels with spaces arrive percent-encoded
    let resp = get(&app.router, "/layers/1960%20(Region)/3/4/5").await;
    assert_eq!(resp.status(), StatusCode::TEMPORARY_REDIRECT);
    assert_eq!(
        header_str(&resp, "location"),
        "https://maps.blryesterday.com/1958/3/4/5.png"
    );

    let resp = get(&app.router, "/layers/1066/1/2/3").await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn daily_json_is_served_from_disk() {
    let app = test_app();
    let resp = get(&app.router, "/daily.json").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(body_string(resp).await, DAILY);
}

#[tokio::test]
async fn daily_page_lists_newest_first_and_escapes() {
    let app = test_app();
    let resp = get(&app.router, "/daily").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(header_str(&resp, "content-type").starts_with("text/html"));

    let html = body_string(resp).await;
    assert!(html.contains(r#"<link rel="icon" href="https://blryesterday.com/favicon.png">"#));
    assert!(
        html.contains("St. Mark&#x27;s &lt;Cathedral&gt;")
            || html.contains("St. Mark's &lt;Cathedral&gt;")
    );
    assert!(html.contains("https://media.blryesterday.com/daily/2023-01-26_04-30-00_UTC.jpg"));

    let newest = html.find("2023-01-26_04-30-00_UTC.jpg").expect("newest");
    let oldest = html.find("2022-10-25_05-06-01_UTC.jpg").expect("oldest");
    assert!(newest < oldest);
}

#[tokio::test]
async fn daily_page_degrades_when_file_is_missing() {
    let app = build(None, TileFetcher::default());
    let resp = get(&app.router, "/daily").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_string(resp).await.contains("No photos to show right now."));
}

#[tokio::test]
async fn rss_has_headers_and_items_newest_first() {
    let app = test_app();
    let resp = get(&app.router, "/rss.xml").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(header_str(&resp, "content-type"), "application/rss+xml");
    assert_eq!(
        header_str(&resp, header::CACHE_CONTROL.as_str()),
        "max-age=0, s-maxage=3600"
    );

    let xml = body_string(resp).await;
    assert_eq!(xml.matches("<item>").count(), 3, "empty day is dropped");
    let jan = xml.find("January 26, 2023").expect("dated title");
    let dec = xml.find("St. Mark").expect("captioned title");
    let oct = xml.find("Mysore Bank circle").expect("oldest");
    assert!(jan < dec && dec < oct);
    assert!(xml.contains("<pubDate>Sun, 25 Dec 2022 00:00:00 +0000</pubDate>"));
}

#[tokio::test]
async fn rss_fails_loudly_on_bad_daily_json() {
    let app = build(Some("{not json"), TileFetcher::default());
    let resp = get(&app.router, "/rss.xml").await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);

    let app = build(None, TileFetcher::default());
    let resp = get(&app.router, "/rss.xml").await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
}

#[tokio::test]
async fn cache_serves_tiles_from_network_then_cache() {
    let app = test_app();
    let uri = "/cache?url=https%3A%2F%2Fa.tile.openstreetmap.org%2F3%2F4%2F5.png";

    let first = get(&app.router, uri).await;
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(header_str(&first, "x-cache"), "MISS");
    assert_eq!(header_str(&first, "x-cache-policy"), "tiles");
    assert_eq!(header_str(&first, "content-type"), "image/png");
    assert_eq!(body_string(first).await, "/3/4/5.png");

    let second = get(&app.router, uri).await;
    assert_eq!(header_str(&second, "x-cache"), "HIT");
    assert_eq!(app.fetcher.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn cache_passes_through_media_without_policy() {
    let app = test_app();
    let uri = "/cache?url=https%3A%2F%2Fmedia.blryesterday.com%2Fdaily%2Fa.jpg";
    for _ in 0..2 {
        let resp = get(&app.router, uri).await;
        assert_eq!(header_str(&resp, "x-cache"), "MISS");
        assert_eq!(header_str(&resp, "x-cache-policy"), "none");
    }
    assert_eq!(app.fetcher.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn cache_rejects_bad_requests() {
    let app = test_app();

    assert_eq!(get(&app.router, "/cache").await.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        get(&app.router, "/cache?url=ftp%3A%2F%2Fmaps.blryesterday.com%2Fx").await.status(),
        StatusCode::BAD_REQUEST
    );
    assert_eq!(
        get(&app.router, "/cache?url=https%3A%2F%2Fevil.example.com%2Fx.png").await.status(),
        StatusCode::FORBIDDEN
    );
    assert_eq!(app.fetcher.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn cache_reports_upstream_failure_as_bad_gateway() {
    let app = build(
        Some(DAILY),
        TileFetcher {
            offline: true,
            ..TileFetcher::default()
        },
    );
    let resp = get(
        &app.router,
        "/cache?url=https%3A%2F%2Fmaps.blryesterday.com%2F1948%2F1%2F2%2F3.png",
    )
    .await;
    assert_eq!(resp.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn metrics_endpoint_exposes_cache_counters() {
    let app = test_app();
    let _ = get(
        &app.router,
        "/cache?url=https%3A%2F%2Fserver.arcgisonline.com%2FArcGIS%2Frest%2Fservices%2FWorld_Imagery%2FMapServer%2Ftile%2F3%2F5%2F4",
    )
    .await;

    let resp = get(&app.router, "/metrics").await;
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(body_string(resp).await.contains("cache_misses_total"));
}

#[test]
fn invalid_site_config_is_rejected_at_startup() {
    let mut site = SiteConfig::blr();
    site.map_config.default_year_index = 99;
    let origin = reqwest::Url::parse("https://blryesterday.com").expect("origin");
    let cache =
        CacheController::with_default_policies(&origin, Arc::new(TileFetcher::default()), None);
    let loader = DailyLoader::from_file(Path::new("static/daily.json"));
    assert!(AppState::with_parts(site, AppConfig::default(), loader, cache).is_err());
}
