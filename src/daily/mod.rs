// src/daily/mod.rs
//! Daily captures: the `daily.json` document, its loader and the ingest step that builds it.

pub mod ingest;
pub mod loader;

use serde::{Deserialize, Serialize};

pub use loader::{DailyLoad, DailyLoader, LoadOutcome};

/// One day's post: captured image filenames plus an optional caption.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyEntry {
    #[serde(default)]
    pub files: Vec<String>,
    #[serde(default)]
    pub description: String,
}

/// Top-level shape of `daily.json`, oldest entry first.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyData {
    #[serde(default)]
    pub days: Vec<DailyEntry>,
}

impl DailyData {
    pub fn from_json(s: &str) -> anyhow::Result<Self> {
        Ok(serde_json::from_str(s)?)
    }
}
