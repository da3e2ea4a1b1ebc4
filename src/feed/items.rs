// src/feed/items.rs
//! Daily entries -> feed items.

use chrono::{DateTime, NaiveDate, Utc};
use metrics::counter;
use once_cell::sync::Lazy;
use regex::Regex;

use crate::daily::DailyEntry;

pub const MEDIA_BASE_URL: &str = "https://media.blryesterday.com/daily/";
pub const DAILY_PAGE_URL: &str = "https://blryesterday.com/daily";

static RE_CAPTURE_TS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})-(\d{2})-(\d{2})_(\d{2})-(\d{2})-(\d{2})_UTC").expect("capture ts regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedItem {
    pub title: String,
    /// Newline-separated media URLs.
    pub description: String,
    pub link: String,
    pub date: DateTime<Utc>,
    pub image: Option<String>,
}

pub fn media_url(filename: &str) -> String {
    format!("{MEDIA_BASE_URL}{filename}")
}

/// Calendar day encoded in a capture filename, at 00:00:00 UTC. The time of
/// day in the name is ignored. Impossible dates (month 13) yield `None`.
pub fn parse_filename_date(filename: &str) -> Option<DateTime<Utc>> {
    let caps = RE_CAPTURE_TS.captures(filename)?;
    let year: i32 = caps[1].parse().ok()?;
    let month: u32 = caps[2].parse().ok()?;
    let day: u32 = caps[3].parse().ok()?;
    let date = NaiveDate::from_ymd_opt(year, month, day)?;
    Some(date.and_hms_opt(0, 0, 0)?.and_utc())
}

/// "January 5, 2024"
pub fn long_date(date: &DateTime<Utc>) -> String {
    date.format("%B %-d, %Y").to_string()
}

fn to_feed_item(day: &DailyEntry) -> Option<FeedItem> {
    let first = day.files.first()?;
    let date = parse_filename_date(first)?;

    let title = if day.description.is_empty() {
        long_date(&date)
    } else {
        day.description.clone()
    };

    let mut description = String::new();
    for file in &day.files {
        description.push_str(&media_url(file));
        description.push('\n');
    }

    Some(FeedItem {
        title,
        description: description.trim_end().to_string(),
        link: DAILY_PAGE_URL.to_string(),
        date,
        image: Some(media_url(first)),
    })
}

/// Build items newest first. Entries with no files or an undated first file
/// are skipped. Equal dates keep input order.
pub fn build_feed_items(days: &[DailyEntry]) -> Vec<FeedItem> {
    let mut items: Vec<FeedItem> = days.iter().filter_map(to_feed_item).collect();
    items.sort_by(|a, b| b.date.cmp(&a.date));
    counter!("feed_items_total").increment(items.len() as u64);
    items
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone, Timelike};

    fn entry(files: &[&str], description: &str) -> DailyEntry {
        DailyEntry {
            files: files.iter().map(|s| s.to_string()).collect(),
            description: description.to_string(),
        }
    }

    #[test]
    fn parse_keeps_calendar_day_and_drops_time() {
        let d = parse_filename_date("2023-07-19_23-59-58_UTC_2.jpg").unwrap();
        assert_eq!((d.year(), d.month(), d.day()), (2023, 7, 19));
        assert_eq!((d.hour(), d.minute(), d.second()), (0, 0, 0));
    }

    #[test]
    fn parse_rejects_non_matching_and_impossible_dates() {
        assert_eq!(parse_filename_date("not-a-date.jpg"), None);
        assert_eq!(parse_filename_date("x2024-01-05_10-00-00_UTC.jpg"), None);
        assert_eq!(parse_filename_date("2024-01-05_10-00-00.jpg"), None);
        assert_eq!(parse_filename_date("2024-13-05_10-00-00_UTC.jpg"), None);
    }

    #[test]
    fn single_entry_without_description_uses_long_date() {
        let items = build_feed_items(&[entry(&["2024-01-05_10-00-00_UTC_a.jpg"], "")]);
        assert_eq!(items.len(), 1);
        let it = &items[0];
        let url = "https://media.blryesterday.com/daily/2024-01-05_10-00-00_UTC_a.jpg";
        assert_eq!(it.title, "January 5, 2024");
        assert_eq!(it.description, url);
        assert_eq!(it.image.as_deref(), Some(url));
        assert_eq!(it.link, DAILY_PAGE_URL);
        assert_eq!(it.date, Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap());
    }

    #[test]
    fn description_is_used_verbatim_and_lists_every_file() {
        let items = build_feed_items(&[entry(
            &["2024-02-01_08-00-00_UTC_1.jpg", "2024-02-01_08-00-00_UTC_2.jpg"],
            "MG Road, 1950s",
        )]);
        assert_eq!(items[0].title, "MG Road, 1950s");
        assert_eq!(
            items[0].description,
            "https://media.blryesterday.com/daily/2024-02-01_08-00-00_UTC_1.jpg\n\
             https://media.blryesterday.com/daily/2024-02-01_08-00-00_UTC_2.jpg"
        );
    }

    #[test]
    fn invalid_entries_are_skipped_and_output_is_newest_first() {
        let days = vec![
            entry(&["2023-03-01_05-00-00_UTC.jpg"], "a"),
            entry(&[], "empty"),
            entry(&["not-a-date.jpg", "2023-09-09_05-00-00_UTC.jpg"], "bad first"),
            entry(&["2024-03-01_05-00-00_UTC.jpg"], "b"),
            entry(&["2023-03-01_22-00-00_UTC.jpg"], "a2"),
        ];
        let items = build_feed_items(&days);
        let titles: Vec<&str> = items.iter().map(|i| i.title.as_str()).collect();
        assert_eq!(titles, vec!["b", "a", "a2"]);
        assert!(items.windows(2).all(|w| w[0].date >= w[1].date));
    }
}
