// src/config/app.rs
//! Process configuration read from the environment (`.env` is loaded by the binaries).

use std::env;
use std::path::PathBuf;
use std::time::Duration;

pub const ENV_DAILY_JSON_PATH: &str = "DAILY_JSON_PATH";
pub const ENV_DAILY_SOURCE_URL: &str = "DAILY_SOURCE_URL";
pub const ENV_CACHE_QUOTA_BYTES: &str = "CACHE_QUOTA_BYTES";
pub const ENV_FETCH_TIMEOUT_SECS: &str = "FETCH_TIMEOUT_SECS";

pub const DEFAULT_DAILY_JSON_PATH: &str = "static/daily.json";
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    /// Local copy of `daily.json`, served at `/daily.json` and read by the RSS route.
    pub daily_json_path: PathBuf,
    /// When set, the `/daily` page loads its data over HTTP from here instead of the file.
    pub daily_source_url: Option<String>,
    /// Byte budget per cache store; `None` means unlimited.
    pub cache_quota_bytes: Option<u64>,
    pub fetch_timeout: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            daily_json_path: PathBuf::from(DEFAULT_DAILY_JSON_PATH),
            daily_source_url: None,
            cache_quota_bytes: None,
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECS),
        }
    }
}

impl AppConfig {
    /// Build from env; unset or unparsable values fall back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let daily_json_path = non_empty_env(ENV_DAILY_JSON_PATH)
            .map(PathBuf::from)
            .unwrap_or(defaults.daily_json_path);
        let daily_source_url = non_empty_env(ENV_DAILY_SOURCE_URL);
        let cache_quota_bytes =
            non_empty_env(ENV_CACHE_QUOTA_BYTES).and_then(|v| v.trim().parse::<u64>().ok());
        let fetch_timeout = non_empty_env(ENV_FETCH_TIMEOUT_SECS)
            .and_then(|v| v.trim().parse::<u64>().ok())
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
            .unwrap_or(defaults.fetch_timeout);

        Self {
            daily_json_path,
            daily_source_url,
            cache_quota_bytes,
            fetch_timeout,
        }
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}
