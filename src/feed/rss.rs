// src/feed/rss.rs
//! RSS 2.0 document for the daily feed.

use anyhow::Result;
use chrono::{DateTime, Datelike, Utc};
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use std::io::Write;

use super::items::FeedItem;
use crate::config::SiteConfig;

pub const RSS_CONTENT_TYPE: &str = "application/rss+xml";
/// Shared caches may keep the document for an hour; browsers revalidate.
pub const RSS_CACHE_CONTROL: &str = "max-age=0, s-maxage=3600";

const RSS_DOCS: &str = "https://validator.w3.org/feed/docs/rss2.html";

/// Channel-level constants.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedMeta {
    pub title: String,
    pub description: String,
    pub link: String,
    pub self_link: String,
    pub language: String,
    pub favicon: String,
    pub copyright: String,
    pub generator: String,
    pub author_name: String,
    pub author_link: String,
    pub image: String,
    /// Minutes.
    pub ttl: u32,
}

impl FeedMeta {
    /// Channel metadata derived from the site info; the copyright year follows `now`.
    pub fn from_site(site: &SiteConfig, now: DateTime<Utc>) -> Self {
        let info = &site.site_info;
        let base = info.canonical_url.trim_end_matches('/');
        Self {
            title: info.name.clone(),
            description: info.description.clone(),
            link: format!("{base}/daily"),
            self_link: format!("{base}/rss.xml"),
            language: "en".into(),
            favicon: format!("{base}/favicon.png"),
            copyright: format!("© {} {}. All rights reserved.", now.year(), info.name),
            generator: concat!("blr-yesterday ", env!("CARGO_PKG_VERSION")).into(),
            author_name: info.name.clone(),
            author_link: format!("{base}/"),
            image: info.og_image.clone(),
            ttl: 1440,
        }
    }
}

fn text_element<W: Write>(w: &mut Writer<W>, name: &str, text: &str) -> Result<()> {
    w.write_event(Event::Start(BytesStart::new(name)))?;
    w.write_event(Event::Text(BytesText::new(text)))?;
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

/// CDATA unless the text would terminate the section early.
fn cdata_element<W: Write>(w: &mut Writer<W>, name: &str, text: &str) -> Result<()> {
    if text.contains("]]>") {
        return text_element(w, name, text);
    }
    w.write_event(Event::Start(BytesStart::new(name)))?;
    w.write_event(Event::CData(BytesCData::new(text)))?;
    w.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn write_item<W: Write>(w: &mut Writer<W>, meta: &FeedMeta, item: &FeedItem) -> Result<()> {
    w.write_event(Event::Start(BytesStart::new("item")))?;
    cdata_element(w, "title", &item.title)?;
    text_element(w, "link", &item.link)?;

    let mut guid = BytesStart::new("guid");
    guid.push_attribute(("isPermaLink", "false"));
    w.write_event(Event::Start(guid))?;
    let guid_text = item.image.as_deref().unwrap_or(&item.link);
    w.write_event(Event::Text(BytesText::new(guid_text)))?;
    w.write_event(Event::End(BytesEnd::new("guid")))?;

    text_element(w, "pubDate", &item.date.to_rfc2822())?;
    cdata_element(w, "description", &item.description)?;
    text_element(w, "dc:creator", &meta.author_name)?;

    if let Some(image) = &item.image {
        let mut enclosure = BytesStart::new("enclosure");
        enclosure.push_attribute(("url", image.as_str()));
        enclosure.push_attribute(("length", "0"));
        enclosure.push_attribute(("type", "image/jpeg"));
        w.write_event(Event::Empty(enclosure))?;
    }

    w.write_event(Event::End(BytesEnd::new("item")))?;
    Ok(())
}

/// Serialize the channel and its items. Items are written in the given order.
pub fn render_rss(meta: &FeedMeta, items: &[FeedItem], now: DateTime<Utc>) -> Result<String> {
    let mut w = Writer::new_with_indent(Vec::new(), b' ', 4);
    w.write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut rss = BytesStart::new("rss");
    rss.push_attribute(("version", "2.0"));
    rss.push_attribute(("xmlns:dc", "http://purl.org/dc/elements/1.1/"));
    rss.push_attribute(("xmlns:content", "http://purl.org/rss/1.0/modules/content/"));
    rss.push_attribute(("xmlns:atom", "http://www.w3.org/2005/Atom"));
    w.write_event(Event::Start(rss))?;
    w.write_event(Event::Start(BytesStart::new("channel")))?;

    text_element(&mut w, "title", &meta.title)?;
    text_element(&mut w, "link", &meta.link)?;
    text_element(&mut w, "description", &meta.description)?;
    text_element(&mut w, "lastBuildDate", &now.to_rfc2822())?;
    text_element(&mut w, "docs", RSS_DOCS)?;
    text_element(&mut w, "generator", &meta.generator)?;
    text_element(&mut w, "language", &meta.language)?;
    text_element(&mut w, "ttl", &meta.ttl.to_string())?;

    w.write_event(Event::Start(BytesStart::new("image")))?;
    text_element(&mut w, "title", &meta.title)?;
    text_element(&mut w, "url", &meta.image)?;
    text_element(&mut w, "link", &meta.link)?;
    w.write_event(Event::End(BytesEnd::new("image")))?;

    text_element(&mut w, "copyright", &meta.copyright)?;

    let mut self_link = BytesStart::new("atom:link");
    self_link.push_attribute(("href", meta.self_link.as_str()));
    self_link.push_attribute(("rel", "self"));
    self_link.push_attribute(("type", RSS_CONTENT_TYPE));
    w.write_event(Event::Empty(self_link))?;

    for item in items {
        write_item(&mut w, meta, item)?;
    }

    w.write_event(Event::End(BytesEnd::new("channel")))?;
    w.write_event(Event::End(BytesEnd::new("rss")))?;

    Ok(String::from_utf8(w.into_inner())?)
}
