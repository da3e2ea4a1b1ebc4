// src/cache/policy.rs
//! Route policies: which requests a cache handles and how.

use regex::Regex;
use reqwest::Url;
use std::time::Duration;

use super::{CacheRequest, RequestMode};

pub const STATIC_CACHE: &str = "static";
pub const TILES_CACHE: &str = "tiles";
pub const INDEX_CACHE: &str = "index";

/// Hosts whose responses go to the tile cache. Matched by substring, so
/// `a.tile.openstreetmap.org` is covered.
pub const TILE_HOSTS: [&str; 4] = [
    "maps.blryesterday.com",
    "tile.openstreetmap.org",
    "server.arcgisonline.com",
    "wayback.maptiles.arcgis.com",
];

const THIRTY_DAYS: Duration = Duration::from_secs(30 * 24 * 60 * 60);

#[derive(Debug, Clone)]
pub enum Matcher {
    /// Same-origin requests whose path (and query) match the pattern.
    SameOriginPath { origin: Url, pattern: Regex },
    /// Hostname contains any of the listed hosts.
    HostContains(Vec<String>),
    /// Top-level page navigations.
    Navigate,
}

impl Matcher {
    pub fn matches(&self, req: &CacheRequest) -> bool {
        match self {
            Matcher::SameOriginPath { origin, pattern } => {
                if req.url.origin() != origin.origin() {
                    return false;
                }
                let target = match req.url.query() {
                    Some(q) => format!("{}?{}", req.url.path(), q),
                    None => req.url.path().to_string(),
                };
                pattern.is_match(&target)
            }
            Matcher::HostContains(hosts) => req
                .url
                .host_str()
                .is_some_and(|h| hosts.iter().any(|allowed| h.contains(allowed.as_str()))),
            Matcher::Navigate => req.mode == RequestMode::Navigate,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Serve cached, refresh in the background.
    StaleWhileRevalidate,
    /// Serve cached if present, else fetch and store.
    CacheFirst,
    /// Fetch, fall back to cache when the network fails.
    NetworkFirst,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Expiration {
    pub max_entries: Option<u64>,
    pub max_age: Option<Duration>,
    pub purge_on_quota_error: bool,
}

#[derive(Debug, Clone)]
pub struct RoutePolicy {
    pub matcher: Matcher,
    pub strategy: Strategy,
    pub cache_name: String,
    pub expiration: Expiration,
    /// Status 0 stands for an opaque cross-origin response.
    pub cacheable_statuses: Vec<u16>,
}

impl RoutePolicy {
    pub fn is_cacheable(&self, status: u16) -> bool {
        self.cacheable_statuses.contains(&status)
    }
}

/// Static assets, tiles, navigations; registered in that order.
pub fn default_policies(site_origin: &Url) -> Vec<RoutePolicy> {
    vec![
        RoutePolicy {
            matcher: Matcher::SameOriginPath {
                origin: site_origin.clone(),
                pattern: Regex::new(r"/.*\.(?:jpg|json|png)$").expect("static asset regex"),
            },
            strategy: Strategy::StaleWhileRevalidate,
            cache_name: STATIC_CACHE.to_string(),
            expiration: Expiration {
                max_entries: None,
                max_age: Some(THIRTY_DAYS),
                purge_on_quota_error: true,
            },
            cacheable_statuses: vec![200],
        },
        RoutePolicy {
            matcher: Matcher::HostContains(TILE_HOSTS.iter().map(|h| h.to_string()).collect()),
            strategy: Strategy::CacheFirst,
            cache_name: TILES_CACHE.to_string(),
            expiration: Expiration {
                max_entries: Some(10_000),
                max_age: Some(THIRTY_DAYS),
                purge_on_quota_error: true,
            },
            cacheable_statuses: vec![0, 200, 404],
        },
        RoutePolicy {
            matcher: Matcher::Navigate,
            strategy: Strategy::NetworkFirst,
            cache_name: INDEX_CACHE.to_string(),
            expiration: Expiration::default(),
            cacheable_statuses: vec![200],
        },
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(url: &str, mode: RequestMode) -> CacheRequest {
        CacheRequest::new(Url::parse(url).unwrap(), mode)
    }

    fn first_match<'a>(policies: &'a [RoutePolicy], r: &CacheRequest) -> Option<&'a str> {
        policies
            .iter()
            .find(|p| p.matcher.matches(r))
            .map(|p| p.cache_name.as_str())
    }

    #[test]
    fn requests_route_to_expected_cache() {
        let origin = Url::parse("https://blryesterday.com").unwrap();
        let p = default_policies(&origin);

        let cases = [
            ("https://blryesterday.com/daily.json", RequestMode::Cors, Some(STATIC_CACHE)),
            ("https://blryesterday.com/sharecard.jpg", RequestMode::NoCors, Some(STATIC_CACHE)),
            ("https://blryesterday.com/daily.json?v=2", RequestMode::Cors, None),
            (
                "https://maps.blryesterday.com/1791/14/11720/7585.png",
                RequestMode::NoCors,
                Some(TILES_CACHE),
            ),
            ("https://b.tile.openstreetmap.org/3/4/5.png", RequestMode::NoCors, Some(TILES_CACHE)),
            (
                "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/3/5/4",
                RequestMode::Cors,
                Some(TILES_CACHE),
            ),
            ("https://blryesterday.com/about", RequestMode::Navigate, Some(INDEX_CACHE)),
            ("https://media.blryesterday.com/daily/a.jpg", RequestMode::NoCors, None),
            ("https://blryesterday.com/rss.xml", RequestMode::Cors, None),
        ];
        for (url, mode, expected) in cases {
            assert_eq!(first_match(&p, &req(url, mode)), expected, "{url}");
        }
    }

    #[test]
    fn registration_order_wins_for_overlapping_matches() {
        let origin = Url::parse("https://blryesterday.com").unwrap();
        let p = default_policies(&origin);
        // a navigation to a same-origin json file hits the static policy first
        let r = req("https://blryesterday.com/daily.json", RequestMode::Navigate);
        assert_eq!(first_match(&p, &r), Some(STATIC_CACHE));
    }

    #[test]
    fn tile_policy_accepts_opaque_and_not_found() {
        let origin = Url::parse("https://blryesterday.com").unwrap();
        let tiles = &default_policies(&origin)[1];
        assert!(tiles.is_cacheable(0));
        assert!(tiles.is_cacheable(404));
        assert!(!tiles.is_cacheable(500));
        assert_eq!(tiles.expiration.max_entries, Some(10_000));
    }
}
