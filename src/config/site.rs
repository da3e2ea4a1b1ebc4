// src/config/site.rs
//! Site configuration store: map layers, map framing and about-page content.

use anyhow::{anyhow, Context, Result};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const ENV_SITE_CONFIG_PATH: &str = "SITE_CONFIG_PATH";
pub const DEFAULT_SITE_CONFIG_TOML: &str = "config/site.toml";
pub const DEFAULT_SITE_CONFIG_JSON: &str = "config/site.json";

/// One historical map layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct YearData {
    pub year: i32,
    pub label: String,
    /// Tile template with `{z}`, `{x}` and `{y}` placeholders (any order).
    pub url: String,
    /// `Some(false)` opts the layer out of being a default view.
    #[serde(rename = "default", default, skip_serializing_if = "Option::is_none")]
    pub default_eligible: Option<bool>,
}

impl YearData {
    pub fn is_default_eligible(&self) -> bool {
        self.default_eligible != Some(false)
    }

    /// Resolve the template for a single tile.
    pub fn tile_url(&self, z: u8, x: u32, y: u32) -> String {
        self.url
            .replace("{z}", &z.to_string())
            .replace("{x}", &x.to_string())
            .replace("{y}", &y.to_string())
    }

    pub fn host(&self) -> Option<String> {
        Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialLinks {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instagram: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub github: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteInfo {
    pub name: String,
    pub city_name: String,
    pub description: String,
    pub author: String,
    pub canonical_url: String,
    pub og_image: String,
    pub keywords: String,
    pub social_links: SocialLinks,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapConfig {
    /// [longitude, latitude]
    pub initial_center: [f64; 2],
    pub initial_zoom: f64,
    /// [[west, south], [east, north]]
    pub bounds: [[f64; 2]; 2],
    /// Index into the default-eligible years, not into `available_years`.
    pub default_year_index: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelledItem {
    pub label: String,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapsSection {
    pub title: String,
    pub items: Vec<LabelledItem>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextSection {
    pub title: String,
    /// May contain HTML.
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListSection {
    pub title: String,
    pub items: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AboutContent {
    pub introduction: String,
    pub maps_section: MapsSection,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub archives_section: Option<TextSection>,
    pub how_to_use_section: ListSection,
    pub contribute_section: TextSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SiteConfig {
    pub site_info: SiteInfo,
    pub map_config: MapConfig,
    pub available_years: Vec<YearData>,
    pub about_content: AboutContent,
}

#[derive(Debug, Error, PartialEq)]
pub enum SiteConfigError {
    #[error("availableYears is empty")]
    NoYears,
    #[error("no year is eligible as the default layer")]
    NoDefaultEligibleYear,
    #[error("defaultYearIndex {index} is out of range ({eligible} default-eligible years)")]
    DefaultIndexOutOfRange { index: usize, eligible: usize },
    #[error("tile template for '{label}' lacks the {placeholder} placeholder")]
    BadTemplate {
        label: String,
        placeholder: &'static str,
    },
    #[error("map bounds must be [[west, south], [east, north]]")]
    BadBounds,
}

impl SiteConfig {
    /// Years that may be picked as the default view, in configured order.
    pub fn default_eligible_years(&self) -> Vec<&YearData> {
        self.available_years
            .iter()
            .filter(|y| y.is_default_eligible())
            .collect()
    }

    /// The layer shown on first load. `default_year_index` is applied to the
    /// eligible subsequence.
    pub fn default_year(&self) -> Option<&YearData> {
        self.default_eligible_years()
            .get(self.map_config.default_year_index)
            .copied()
    }

    pub fn year_by_label(&self, label: &str) -> Option<&YearData> {
        self.available_years.iter().find(|y| y.label == label)
    }

    /// Distinct tile hosts across all layers, first-seen order.
    pub fn tile_hosts(&self) -> Vec<String> {
        let mut hosts: Vec<String> = Vec::new();
        for host in self.available_years.iter().filter_map(YearData::host) {
            if !hosts.contains(&host) {
                hosts.push(host);
            }
        }
        hosts
    }

    pub fn validate(&self) -> Result<(), SiteConfigError> {
        if self.available_years.is_empty() {
            return Err(SiteConfigError::NoYears);
        }
        for y in &self.available_years {
            for placeholder in ["{z}", "{x}", "{y}"] {
                if !y.url.contains(placeholder) {
                    return Err(SiteConfigError::BadTemplate {
                        label: y.label.clone(),
                        placeholder,
                    });
                }
            }
        }
        let eligible = self.default_eligible_years().len();
        if eligible == 0 {
            return Err(SiteConfigError::NoDefaultEligibleYear);
        }
        let index = self.map_config.default_year_index;
        if index >= eligible {
            return Err(SiteConfigError::DefaultIndexOutOfRange { index, eligible });
        }
        let [sw, ne] = self.map_config.bounds;
        if !(sw[0] < ne[0] && sw[1] < ne[1]) {
            return Err(SiteConfigError::BadBounds);
        }
        Ok(())
    }

    /// Load from an explicit path. Supports TOML or JSON formats.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("reading site config from {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let cfg = parse_site_config(&content, ext.as_str())
            .with_context(|| format!("parsing site config {}", path.display()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Load using env var + fallbacks:
    /// 1) $SITE_CONFIG_PATH
    /// 2) config/site.toml
    /// 3) config/site.json
    /// 4) built-in Bangalore config
    pub fn load_default() -> Result<Self> {
        if let Ok(p) = std::env::var(ENV_SITE_CONFIG_PATH) {
            let pb = PathBuf::from(p);
            if pb.exists() {
                return Self::load_from_file(&pb);
            }
            return Err(anyhow!("SITE_CONFIG_PATH points to non-existent path"));
        }
        for candidate in [DEFAULT_SITE_CONFIG_TOML, DEFAULT_SITE_CONFIG_JSON] {
            let pb = PathBuf::from(candidate);
            if pb.exists() {
                return Self::load_from_file(&pb);
            }
        }
        let cfg = Self::blr();
        cfg.validate()?;
        Ok(cfg)
    }

    /// Built-in configuration for Bangalore.
    pub fn blr() -> Self {
        let year = |year: i32, label: &str, url: &str, eligible: Option<bool>| YearData {
            year,
            label: label.to_string(),
            url: url.to_string(),
            default_eligible: eligible,
        };
        let maps = |n: u16| format!("https://maps.blryesterday.com/{n}/{{z}}/{{x}}/{{y}}.png");
        let wayback = |release: u32| {
            format!(
                "https://wayback.maptiles.arcgis.com/arcgis/rest/services/World_Imagery/WMTS/1.0.0/default028mm/MapServer/tile/{release}/{{z}}/{{y}}/{{x}}"
            )
        };
        let link = |href: &str, text: &str| {
            format!(
                r#"<a href="{href}" class="text-blue-600 underline hover:text-blue-800 dark:text-blue-400 dark:hover:text-blue-300">{text}</a>"#
            )
        };
        let item = |label: &str, description: String| LabelledItem {
            label: label.to_string(),
            description,
        };
        let mod_archives = link("https://mod.org.in/", "Mod Foundation archives");
        let bengawalk = link("https://bengawalk.com", "Bengawalk");

        SiteConfig {
            site_info: SiteInfo {
                name: "BLR Yesterday".into(),
                city_name: "Bangalore".into(),
                description:
                    "Explore Bangalore's transformation through historical maps and archival documents."
                        .into(),
                author: "Vivek Matthew".into(),
                canonical_url: "https://blryesterday.com".into(),
                og_image: "https://blryesterday.com/sharecard.jpg".into(),
                keywords: "blr, bangalore, bengaluru, history, maps, archives, documents".into(),
                social_links: SocialLinks {
                    instagram: Some("https://www.instagram.com/blr.on.this.day/".into()),
                    github: Some("https://github.com/Vonter/blr-yesterday".into()),
                },
            },
            map_config: MapConfig {
                initial_center: [77.59, 12.98],
                initial_zoom: 14.0,
                bounds: [[77.0, 12.5], [78.5, 13.5]],
                default_year_index: 6,
            },
            available_years: vec![
                year(1791, "1790", &maps(1791), None),
                year(1843, "1840", &maps(1843), None),
                year(1854, "1850", &maps(1854), None),
                year(1884, "1880", &maps(1884), None),
                year(1898, "1900", &maps(1898), None),
                year(1910, "1910", &maps(1910), Some(false)),
                year(1927, "1920", &maps(1927), None),
                year(1948, "1940", &maps(1948), None),
                year(1969, "1960", &maps(1969), None),
                year(1958, "1960 (Region)", &maps(1958), Some(false)),
                year(1983, "1980", &maps(1983), None),
                year(1978, "1980 (Region)", &maps(1978), Some(false)),
                year(2002, "2000", &maps(2002), None),
                year(2003, "2000 (Region)", &maps(2003), None),
                year(2009, "200x", &wayback(10), None),
                year(2015, "2015", &wayback(31026), Some(false)),
                year(
                    2025,
                    "Today",
                    "https://server.arcgisonline.com/ArcGIS/rest/services/World_Imagery/MapServer/tile/{z}/{y}/{x}",
                    None,
                ),
                year(2999, "OpenStreetMap", &maps(2999), Some(false)),
            ],
            about_content: AboutContent {
                introduction:
                    "Explore Bangalore's transformation through historical maps and archival documents."
                        .into(),
                maps_section: MapsSection {
                    title: "About the Maps".into(),
                    items: vec![
                        item("1790", "Published in 1791 (Plan of the Siege of Bangalore, Lord Cornwallis)".into()),
                        item("1840", "Published in 1843 (Plan of the Cantonment of Bangalore, B.C. Regel)".into()),
                        item("1850", "Published in 1854 (Pharoah & Co., Madras; J. & C. Walker)".into()),
                        item(
                            "1880",
                            format!("Published in 1884 (Multiple individuals, unknown organization; scans courtesy {mod_archives})"),
                        ),
                        item("1900", "Published in 1935 (John Bartholomew)".into()),
                        item("1910", "Published in 1910 (Litho. School 2nd Q.V.O.S. & M in Bangalore)".into()),
                        item("1920", "Published in 1927 (Survey of India)".into()),
                        item(
                            "1940",
                            format!("Surveyed 1935-36. Published in 1948 (Survey of India; scans courtesy {mod_archives})"),
                        ),
                        item(
                            "1960",
                            format!("Surveyed 1960-61. Published in 1969 (Survey of India; scans courtesy {mod_archives})"),
                        ),
                        item("1960 (Region)", "Published in 1958 (Survey of India)".into()),
                        item(
                            "1980",
                            format!("Surveyed 1979-80. Published in 1983 (Survey of India; scans courtesy {mod_archives})"),
                        ),
                        item("1980 (Region)", "Published in 1978 (Survey of India)".into()),
                        item(
                            "2000",
                            format!("Surveyed 1997-99. Published in 2002 (Survey of India; scans courtesy {bengawalk})"),
                        ),
                        item(
                            "2000 (Region)",
                            format!("Surveyed across multiple decades in the late 20th Century. Major details updated around 2000. Published in 2011 (Survey of India; scans courtesy {bengawalk})"),
                        ),
                        item("200x", "Satellite images captured in different areas across multiple years through the 2000s (ESRI)".into()),
                        item("2015", "Satellite images captured in different areas across multiple years prior to 2015 (ESRI)".into()),
                        item("Today", "Satellite images captured after 2022 (ESRI)".into()),
                        item(
                            "Background",
                            format!("{} (OpenStreetMap contributors)", link("https://openstreetmap.in", "OpenStreetMap")),
                        ),
                    ],
                },
                archives_section: Some(TextSection {
                    title: "From the Archives".into(),
                    content: "Coming Soon!".into(),
                }),
                how_to_use_section: ListSection {
                    title: "How to Use".into(),
                    items: vec![
                        "Use the arrow buttons to switch between different years".into(),
                        "Zoom and pan around to explore different areas of the city".into(),
                        "Use the locate button on the bottom right to jump to your current location".into(),
                        "Select the gear icon to open the settings menu and enable more options".into(),
                    ],
                },
                contribute_section: TextSection {
                    title: "Want to Contribute?".into(),
                    content: format!(
                        "Interested in helping us improve this project by contributing historical maps or documents? Contact us on {} or check out the {}.",
                        link("https://www.instagram.com/blr.on.this.day/", "Instagram"),
                        link("https://github.com/Vonter/blr-yesterday", "GitHub repository"),
                    ),
                },
            },
        }
    }
}

fn parse_site_config(s: &str, hint_ext: &str) -> Result<SiteConfig> {
    match hint_ext {
        "toml" => Ok(toml::from_str(s)?),
        "json" => Ok(serde_json::from_str(s)?),
        _ => serde_json::from_str(s)
            .map_err(anyhow::Error::from)
            .or_else(|_| toml::from_str(s).map_err(anyhow::Error::from))
            .map_err(|_| anyhow!("unsupported site config format")),
    }
}
