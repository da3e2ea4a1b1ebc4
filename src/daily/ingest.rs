// src/daily/ingest.rs
//! Builds `daily.json` from a directory of captured posts.
//!
//! A post is one or more `.jpg` files sharing a timestamp prefix
//! (`2022-12-25_05-00-26_UTC_1.jpg`, `..._2.jpg`) plus an optional `.txt`
//! caption. Entries already present in the output file are merged, not replaced.

use anyhow::{Context, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use super::{DailyData, DailyEntry};

/// Files found on disk for one timestamp.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CapturedPost {
    pub jpg_files: Vec<String>,
    pub txt_file: Option<String>,
}

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestReport {
    /// Timestamp keys that were not in the existing document.
    pub added: Vec<String>,
    pub total_days: usize,
}

/// `2022-12-25_05-00-26_UTC_1.jpg` -> `2022-12-25_05-00-26_UTC`
pub fn timestamp_key(filename: &str) -> String {
    let name = filename
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(filename);
    if name.ends_with("_1") || name.ends_with("_2") || name.ends_with("_3") {
        if let Some((base, _)) = name.rsplit_once('_') {
            return base.to_string();
        }
    }
    name.to_string()
}

/// Group `.jpg` and `.txt` files by timestamp key.
pub fn scan_dir(dir: &Path) -> Result<BTreeMap<String, CapturedPost>> {
    let mut grouped: BTreeMap<String, CapturedPost> = BTreeMap::new();
    let entries =
        fs::read_dir(dir).with_context(|| format!("reading capture dir {}", dir.display()))?;
    for e in entries.flatten() {
        if !e.file_type().map(|t| t.is_file()).unwrap_or(false) {
            continue;
        }
        let name = e.file_name().to_string_lossy().to_string();
        if name.contains("profile_pic") {
            continue;
        }
        if name.ends_with(".jpg") {
            grouped
                .entry(timestamp_key(&name))
                .or_default()
                .jpg_files
                .push(name);
        } else if name.ends_with(".txt") {
            let key = timestamp_key(&name);
            grouped.entry(key).or_default().txt_file = Some(name);
        }
    }
    Ok(grouped)
}

fn read_description(dir: &Path, txt_file: Option<&str>) -> String {
    let Some(txt) = txt_file else {
        return String::new();
    };
    match fs::read_to_string(dir.join(txt)) {
        Ok(s) => s.trim().to_string(),
        Err(e) => {
            tracing::warn!(target: "ingest", file = txt, error = %e, "error reading caption");
            String::new()
        }
    }
}

/// Existing document keyed by the first file's timestamp. Entries without
/// files are dropped; an unreadable document counts as empty.
pub fn load_existing(path: &Path) -> BTreeMap<String, DailyEntry> {
    if !path.exists() {
        return BTreeMap::new();
    }
    let parsed = fs::read_to_string(path)
        .map_err(anyhow::Error::from)
        .and_then(|s| DailyData::from_json(&s));
    match parsed {
        Ok(data) => data
            .days
            .into_iter()
            .filter_map(|day| {
                let key = timestamp_key(day.files.first()?);
                Some((key, day))
            })
            .collect(),
        Err(e) => {
            tracing::warn!(
                target: "ingest",
                path = %path.display(),
                error = %e,
                "error loading existing json"
            );
            BTreeMap::new()
        }
    }
}

/// Merge scanned posts into existing entries. Files are unioned and sorted; a
/// new non-empty caption wins over the stored one.
pub fn merge(
    mut existing: BTreeMap<String, DailyEntry>,
    scanned: BTreeMap<String, CapturedPost>,
    dir: &Path,
) -> (DailyData, Vec<String>) {
    let mut added = Vec::new();
    for (key, post) in scanned {
        let mut jpg_files = post.jpg_files;
        jpg_files.sort();
        let description = read_description(dir, post.txt_file.as_deref());

        match existing.get_mut(&key) {
            Some(entry) => {
                let files: BTreeSet<String> =
                    entry.files.drain(..).chain(jpg_files).collect();
                entry.files = files.into_iter().collect();
                if !description.is_empty() {
                    entry.description = description;
                }
            }
            None => {
                added.push(key.clone());
                existing.insert(
                    key,
                    DailyEntry {
                        files: jpg_files,
                        description,
                    },
                );
            }
        }
    }

    let days = existing
        .into_values()
        .filter(|day| !day.files.is_empty())
        .collect();
    (DailyData { days }, added)
}

/// Scan `dir`, merge into `output` and rewrite it.
pub fn build_daily_json(dir: &Path, output: &Path) -> Result<IngestReport> {
    let existing = load_existing(output);
    let scanned = scan_dir(dir)?;
    let (data, added) = merge(existing, scanned, dir);

    for key in &added {
        let day: String = key.chars().take(10).collect();
        tracing::info!(target: "ingest", %day, "added day");
    }

    let json = serde_json::to_string(&data).context("serializing daily json")?;
    fs::write(output, json).with_context(|| format!("writing {}", output.display()))?;

    let report = IngestReport {
        added,
        total_days: data.days.len(),
    };
    tracing::info!(target: "ingest", days = report.total_days, "wrote daily json");
    Ok(report)
}
