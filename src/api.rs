use std::collections::HashMap;
use std::sync::Arc;

use anyhow::Context;
use chrono::Utc;
use reqwest::Url;
use shuttle_axum::axum::{
    extract::{Path, Query, State},
    http::{header, HeaderMap, StatusCode},
    response::{Html, IntoResponse, Redirect, Response},
    routing::get,
    Json, Router,
};
use tower_http::{cors::CorsLayer, services::ServeFile};

use crate::cache::{
    CacheController, CacheError, CacheRequest, CacheSource, HttpFetcher, RequestMode, TILE_HOSTS,
};
use crate::config::{AppConfig, SiteConfig, YearData};
use crate::daily::{DailyData, DailyLoader};
use crate::error::AppError;
use crate::feed::{
    build_feed_items, media_url, render_rss, FeedMeta, RSS_CACHE_CONTROL, RSS_CONTENT_TYPE,
};
use crate::metrics::Metrics;

/// Host serving the daily photos; proxied through `/cache` alongside tile hosts.
pub const MEDIA_HOST: &str = "media.blryesterday.com";

#[derive(Clone)]
pub struct AppState {
    pub site: Arc<SiteConfig>,
    pub config: Arc<AppConfig>,
    pub loader: Arc<DailyLoader>,
    pub cache: Arc<CacheController>,
    allowed_hosts: Arc<Vec<String>>,
}

impl AppState {
    /// Production wiring: reqwest-backed cache fetcher, loader reading from
    /// `DAILY_SOURCE_URL` when set, else from the local file.
    pub fn new(site: SiteConfig, config: AppConfig) -> anyhow::Result<Self> {
        let origin = site_origin(&site)?;
        let client = reqwest::Client::builder()
            .user_agent(concat!("blr-yesterday/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("building http client")?;

        let fetcher = Arc::new(HttpFetcher::new(client.clone(), config.fetch_timeout));
        let cache =
            CacheController::with_default_policies(&origin, fetcher, config.cache_quota_bytes);
        let loader = match &config.daily_source_url {
            Some(url) => DailyLoader::from_url(url.clone(), client, config.fetch_timeout),
            None => DailyLoader::from_file(config.daily_json_path.clone()),
        };
        Self::with_parts(site, config, loader, cache)
    }

    /// Assemble from prebuilt parts. The site config is validated here.
    pub fn with_parts(
        site: SiteConfig,
        config: AppConfig,
        loader: DailyLoader,
        cache: CacheController,
    ) -> anyhow::Result<Self> {
        site.validate()?;
        let origin = site_origin(&site)?;

        let mut allowed: Vec<String> = Vec::new();
        let candidates = TILE_HOSTS
            .iter()
            .map(|h| h.to_string())
            .chain(site.tile_hosts())
            .chain(origin.host_str().map(str::to_string))
            .chain([MEDIA_HOST.to_string()]);
        for host in candidates {
            if !allowed.contains(&host) {
                allowed.push(host);
            }
        }

        Ok(Self {
            site: Arc::new(site),
            config: Arc::new(config),
            loader: Arc::new(loader),
            cache: Arc::new(cache),
            allowed_hosts: Arc::new(allowed),
        })
    }

    /// Site config from `SITE_CONFIG_PATH` or fallbacks, app config from env.
    pub fn from_env() -> anyhow::Result<Self> {
        Self::new(SiteConfig::load_default()?, AppConfig::from_env())
    }

    fn host_allowed(&self, host: &str) -> bool {
        self.allowed_hosts
            .iter()
            .any(|h| host == h || host.ends_with(&format!(".{h}")))
    }
}

fn site_origin(site: &SiteConfig) -> anyhow::Result<Url> {
    Url::parse(&site.site_info.canonical_url)
        .with_context(|| format!("invalid canonical url {}", site.site_info.canonical_url))
}

pub fn create_router(state: AppState, metrics: &Metrics) -> Router {
    let daily_json = ServeFile::new(state.config.daily_json_path.clone());

    Router::new()
        .route("/health", get(|| async { "OK" }))
        .route("/config", get(site_config))
        .route("/layers", get(layers))
        .route("/layers/{label}/{z}/{x}/{y}", get(layer_tile))
        .route_service("/daily.json", daily_json)
        .route("/daily", get(daily_page))
        .route("/rss.xml", get(rss_feed))
        .route("/cache", get(cache_proxy))
        .merge(metrics.router())
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Router with state from the environment and the global metrics recorder.
pub fn router(state: AppState) -> anyhow::Result<Router> {
    let metrics = Metrics::init()?;
    Ok(create_router(state, &metrics))
}

async fn site_config(State(state): State<AppState>) -> Json<SiteConfig> {
    Json(state.site.as_ref().clone())
}

#[derive(serde::Serialize)]
struct LayersResp {
    default: Option<YearData>,
    years: Vec<YearData>,
}

async fn layers(State(state): State<AppState>) -> Json<LayersResp> {
    Json(LayersResp {
        default: state.site.default_year().cloned(),
        years: state.site.available_years.clone(),
    })
}

async fn layer_tile(
    State(state): State<AppState>,
    Path((label, z, x, y)): Path<(String, u8, u32, u32)>,
) -> Response {
    match state.site.year_by_label(&label) {
        Some(year) => Redirect::temporary(&year.tile_url(z, x, y)).into_response(),
        None => (StatusCode::NOT_FOUND, format!("unknown layer: {label}")).into_response(),
    }
}

async fn rss_feed(State(state): State<AppState>) -> Result<Response, AppError> {
    let path = &state.config.daily_json_path;
    let raw = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    let data = DailyData::from_json(&raw).context("parsing daily json")?;

    let items = build_feed_items(&data.days);
    let now = Utc::now();
    let xml = render_rss(&FeedMeta::from_site(&state.site, now), &items, now)?;
    tracing::info!(target: "feed", items = items.len(), "rendered rss");

    Ok((
        [
            (header::CONTENT_TYPE, RSS_CONTENT_TYPE),
            (header::CACHE_CONTROL, RSS_CACHE_CONTROL),
        ],
        xml,
    )
        .into_response())
}

async fn daily_page(State(state): State<AppState>) -> Html<String> {
    let load = state.loader.load().await;
    let meta = FeedMeta::from_site(&state.site, Utc::now());

    let mut html = String::new();
    html.push_str(&format!(
        "<!doctype html>\n<html lang=\"{lang}\">\n<head>\n<meta charset=\"utf-8\">\n\
         <title>{title} | Daily</title>\n<link rel=\"icon\" href=\"{favicon}\">\n\
         <link rel=\"alternate\" type=\"{rss}\" href=\"{feed}\">\n</head>\n<body>\n<main>\n\
         <h1>{title}</h1>\n",
        lang = meta.language,
        title = html_escape::encode_text(&meta.title),
        favicon = html_escape::encode_double_quoted_attribute(&meta.favicon),
        rss = RSS_CONTENT_TYPE,
        feed = html_escape::encode_double_quoted_attribute(&meta.self_link),
    ));

    if load.days.is_empty() {
        html.push_str("<p class=\"empty\">No photos to show right now.</p>\n");
    }
    for day in &load.days {
        html.push_str("<article>\n");
        for file in &day.files {
            html.push_str(&format!(
                "<img loading=\"lazy\" src=\"{}\" alt=\"{}\">\n",
                html_escape::encode_double_quoted_attribute(&media_url(file)),
                html_escape::encode_double_quoted_attribute(&day.description),
            ));
        }
        if !day.description.is_empty() {
            html.push_str(&format!("<p>{}</p>\n", html_escape::encode_text(&day.description)));
        }
        html.push_str("</article>\n");
    }
    html.push_str("</main>\n</body>\n</html>\n");
    Html(html)
}

async fn cache_proxy(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    headers: HeaderMap,
) -> Response {
    let Some(raw) = params.get("url") else {
        return (StatusCode::BAD_REQUEST, "missing url parameter").into_response();
    };
    let url = match Url::parse(raw) {
        Ok(u) if matches!(u.scheme(), "http" | "https") => u,
        _ => return (StatusCode::BAD_REQUEST, "url must be absolute http(s)").into_response(),
    };
    if !url.host_str().is_some_and(|h| state.host_allowed(h)) {
        tracing::warn!(target: "cache", %url, "host not allowed");
        return (StatusCode::FORBIDDEN, "host not allowed").into_response();
    }

    let sec_fetch_mode = headers.get("sec-fetch-mode").and_then(|v| v.to_str().ok());
    let mode = RequestMode::from_sec_fetch_mode(sec_fetch_mode);
    let req = CacheRequest::new(url, mode);

    match state.cache.handle(&req).await {
        Ok(outcome) => {
            let resp = outcome.response;
            // opaque responses carry no status of their own
            let status = StatusCode::from_u16(resp.status).unwrap_or(StatusCode::OK);
            let hit = match outcome.source {
                CacheSource::Cache => "HIT",
                CacheSource::Network => "MISS",
            };
            let content_type = resp
                .content_type
                .clone()
                .unwrap_or_else(|| "application/octet-stream".to_string());
            (
                status,
                [
                    ("content-type", content_type),
                    ("x-cache", hit.to_string()),
                    ("x-cache-policy", outcome.policy.unwrap_or_else(|| "none".to_string())),
                ],
                resp.body.as_ref().clone(),
            )
                .into_response()
        }
        Err(CacheError::Network(e)) => {
            tracing::warn!(target: "cache", url = %req.url, error = %e, "upstream fetch failed");
            (StatusCode::BAD_GATEWAY, format!("upstream fetch failed: {e}")).into_response()
        }
        Err(e) => {
            tracing::error!(target: "cache", url = %req.url, error = %e, "cache error");
            (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response()
        }
    }
}
