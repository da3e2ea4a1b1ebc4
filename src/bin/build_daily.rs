//! Rebuild `daily.json` from a directory of captured posts.
//!
//! Usage: `build_daily [CAPTURE_DIR] [OUTPUT]` (defaults: `daily`, `$DAILY_JSON_PATH`
//! or `static/daily.json`).

use std::path::PathBuf;

use anyhow::Result;
use blr_yesterday::{config::AppConfig, daily::ingest::build_daily_json, init_tracing};

fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    init_tracing();

    let mut args = std::env::args().skip(1);
    let dir = args.next().map(PathBuf::from).unwrap_or_else(|| PathBuf::from("daily"));
    let output = args
        .next()
        .map(PathBuf::from)
        .unwrap_or_else(|| AppConfig::from_env().daily_json_path);

    let report = build_daily_json(&dir, &output)?;
    println!(
        "wrote {} ({} days, {} added)",
        output.display(),
        report.total_days,
        report.added.len()
    );
    Ok(())
}
