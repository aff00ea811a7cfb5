// src/sources/mod.rs
//! Content sources. Each source fetches a batch and names the processor
//! chain its items must pass before notification.

pub mod alerts;
pub mod rss;

use async_trait::async_trait;
use once_cell::sync::OnceCell;
use regex::Regex;

use crate::content::Content;
use crate::processors::ProcessorKind;

pub use alerts::{AlertFilter, AlertsSource};
pub use rss::RssSource;

#[async_trait]
pub trait Source: Send + Sync {
    /// Never fails: transport and parse errors are logged and yield an
    /// empty (or partial) batch.
    async fn fetch(&self) -> Vec<Content>;

    /// Ordered stages every item from this source goes through.
    fn processors(&self) -> Vec<ProcessorKind>;

    /// Short label for logs.
    fn name(&self) -> &str;
}

/// Plain text from an HTML fragment: tags removed, entities decoded,
/// whitespace collapsed.
pub fn strip_markup(s: &str) -> String {
    static RE_TAGS: OnceCell<Regex> = OnceCell::new();
    let re_tags = RE_TAGS.get_or_init(|| Regex::new(r"(?is)<[^>]*>").unwrap());
    let out = re_tags.replace_all(s, "");

    let out = html_escape::decode_html_entities(&out);

    static RE_WS: OnceCell<Regex> = OnceCell::new();
    let re_ws = RE_WS.get_or_init(|| Regex::new(r"\s+").unwrap());
    re_ws.replace_all(&out, " ").trim().to_string()
}
