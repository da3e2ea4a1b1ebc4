//! BLR Yesterday back end: site config, daily feed, RSS and the offline cache proxy.

use anyhow::Context;
use shuttle_axum::ShuttleAxum;

use blr_yesterday::{init_tracing, router, AppConfig, AppState, SiteConfig};

#[shuttle_runtime::main]
async fn axum() -> ShuttleAxum {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    let site = SiteConfig::load_default().context("loading site config")?;
    let config = AppConfig::from_env();
    tracing::info!(
        target: "startup",
        site = %site.site_info.name,
        layers = site.available_years.len(),
        daily = %config.daily_json_path.display(),
        remote_daily = config.daily_source_url.is_some(),
        "starting"
    );

    let state = AppState::new(site, config)?;
    let router = router(state)?;

    Ok(router.into())
}
