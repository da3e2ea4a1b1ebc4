// src/lib.rs
// Public library surface for the binaries and integration tests.

pub mod api;
pub mod cache;
pub mod config;
pub mod daily;
pub mod error;
pub mod feed;
pub mod metrics;

pub use crate::api::{create_router, router, AppState};
pub use crate::config::{AppConfig, SiteConfig};

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const DEFAULT_LOG_FILTER: &str = "blr_yesterday=info,warn";

/// Compact tracing logs; `RUST_LOG` overrides the default filter.
/// Safe to call more than once: later calls are no-ops.
pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .try_init();
}

/// Build the full application from the environment.
pub fn app() -> anyhow::Result<shuttle_axum::axum::Router> {
    let state = AppState::from_env()?;
    router(state)
}
