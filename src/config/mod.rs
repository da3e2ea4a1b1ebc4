// src/config/mod.rs
pub mod app;
pub mod site;

pub use app::AppConfig;
pub use site::{SiteConfig, YearData};
