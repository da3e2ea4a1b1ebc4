// src/daily/loader.rs
//! Loads `daily.json` for the `/daily` page, newest entry first.
//!
//! A failed load never surfaces as an error: it is logged and reported as
//! `LoadOutcome::Degraded` with an empty list.

use anyhow::{bail, Context, Result};
use metrics::counter;
use serde::Serialize;
use std::path::PathBuf;
use std::time::Duration;

use super::{DailyData, DailyEntry};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LoadOutcome {
    Fetched,
    Degraded { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DailyLoad {
    pub days: Vec<DailyEntry>,
    pub outcome: LoadOutcome,
}

impl DailyLoad {
    pub fn is_degraded(&self) -> bool {
        matches!(self.outcome, LoadOutcome::Degraded { .. })
    }
}

enum Mode {
    Fixture(String),
    File(PathBuf),
    Http {
        url: String,
        client: reqwest::Client,
        timeout: Duration,
    },
}

pub struct DailyLoader {
    mode: Mode,
}

impl DailyLoader {
    pub fn from_fixture_str(s: &str) -> Self {
        Self {
            mode: Mode::Fixture(s.to_string()),
        }
    }

    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self {
            mode: Mode::File(path.into()),
        }
    }

    pub fn from_url(url: impl Into<String>, client: reqwest::Client, timeout: Duration) -> Self {
        Self {
            mode: Mode::Http {
                url: url.into(),
                client,
                timeout,
            },
        }
    }

    fn source(&self) -> String {
        match &self.mode {
            Mode::Fixture(_) => "fixture".to_string(),
            Mode::File(p) => p.display().to_string(),
            Mode::Http { url, .. } => url.clone(),
        }
    }

    /// Fetch, parse and reverse. Never fails.
    pub async fn load(&self) -> DailyLoad {
        match self.fetch().await {
            Ok(data) => {
                let mut days = data.days;
                days.reverse();
                DailyLoad {
                    days,
                    outcome: LoadOutcome::Fetched,
                }
            }
            Err(e) => {
                let reason = format!("{e:#}");
                tracing::error!(
                    target: "daily",
                    source = %self.source(),
                    error = %reason,
                    "error loading daily data"
                );
                counter!("daily_load_failures_total").increment(1);
                DailyLoad {
                    days: Vec::new(),
                    outcome: LoadOutcome::Degraded { reason },
                }
            }
        }
    }

    async fn fetch(&self) -> Result<DailyData> {
        match &self.mode {
            Mode::Fixture(s) => DailyData::from_json(s),
            Mode::File(path) => {
                let body = tokio::fs::read_to_string(path)
                    .await
                    .with_context(|| format!("reading {}", path.display()))?;
                DailyData::from_json(&body).context("parsing daily json")
            }
            Mode::Http {
                url,
                client,
                timeout,
            } => {
                let resp = client
                    .get(url.as_str())
                    .timeout(*timeout)
                    .send()
                    .await
                    .context("daily http get()")?;
                let status = resp.status();
                if !status.is_success() {
                    bail!("failed to fetch daily data: {status}");
                }
                let body = resp.text().await.context("daily http .text()")?;
                DailyData::from_json(&body).context("parsing daily json")
            }
        }
    }
}
