// src/feed/mod.rs
//! RSS mirror of the daily feed.

pub mod items;
pub mod rss;

pub use items::{
    build_feed_items, media_url, parse_filename_date, FeedItem, DAILY_PAGE_URL, MEDIA_BASE_URL,
};
pub use rss::{render_rss, FeedMeta, RSS_CACHE_CONTROL, RSS_CONTENT_TYPE};
