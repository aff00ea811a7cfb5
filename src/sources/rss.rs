// src/sources/rss.rs
use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use metrics::counter;
use quick_xml::events::Event;
use quick_xml::Reader;

use super::{strip_markup, Source};
use crate::content::Content;
use crate::metrics::SOURCE_ERRORS_TOTAL;
use crate::processors::ProcessorKind;

#[derive(Debug, Clone, Copy)]
enum Field {
    Title,
    Link,
    PubDate,
    Description,
}

impl Field {
    fn from_tag(tag: &[u8]) -> Option<Self> {
        match tag {
            b"title" => Some(Self::Title),
            b"link" => Some(Self::Link),
            b"pubDate" => Some(Self::PubDate),
            b"description" => Some(Self::Description),
            _ => None,
        }
    }
}

/// One `<item>` being read. The first occurrence of each child wins; text
/// of nested markup inside a child is kept and stripped later.
#[derive(Debug, Default)]
struct Item {
    title: Option<String>,
    link: Option<String>,
    pub_date: Option<String>,
    description: Option<String>,
    field: Option<Field>,
    depth: usize,
    text: String,
    error: Option<anyhow::Error>,
}

impl Item {
    fn open(&mut self, tag: &[u8]) {
        if self.depth == 0 {
            self.field = Field::from_tag(tag);
            self.text.clear();
        }
        self.depth += 1;
    }

    /// Returns true when the closing tag is the item's own.
    fn close(&mut self) -> bool {
        if self.depth == 0 {
            return true;
        }
        self.depth -= 1;
        if self.depth == 0 {
            if let Some(field) = self.field.take() {
                let text = std::mem::take(&mut self.text);
                let slot = match field {
                    Field::Title => &mut self.title,
                    Field::Link => &mut self.link,
                    Field::PubDate => &mut self.pub_date,
                    Field::Description => &mut self.description,
                };
                slot.get_or_insert(text);
            }
        }
        false
    }

    fn capturing(&self) -> bool {
        self.depth > 0 && self.field.is_some()
    }

    fn push_text(&mut self, text: &str) {
        if self.capturing() {
            self.text.push_str(text);
        }
    }

    fn fail(&mut self, err: anyhow::Error) {
        if self.error.is_none() {
            self.error = Some(err);
        }
    }

    fn into_content(self) -> Result<Content> {
        if let Some(err) = self.error {
            return Err(err);
        }
        let Some(title) = self.title else {
            bail!("item has no title");
        };
        let Some(description) = self.description else {
            bail!("item has no description");
        };
        let Some(pub_date) = self.pub_date else {
            bail!("item has no pubDate");
        };
        let Some(link) = self.link else {
            bail!("item has no link");
        };
        Ok(Content::article(
            strip_markup(&title),
            strip_markup(&description),
            pub_date.trim(),
            link.trim(),
        ))
    }
}

/// Parse an RSS document into articles. Items are read one at a time, so an
/// item that is incomplete or badly formed is skipped without losing its
/// siblings; the second tuple field counts them. A document that breaks off
/// midway keeps the items completed before the break.
pub fn parse_feed(xml: &str) -> Result<(Vec<Content>, usize)> {
    let xml_clean = scrub_html_entities_for_xml(xml);
    let mut reader = Reader::from_str(&xml_clean);

    let mut out = Vec::new();
    let mut skipped = 0usize;
    let mut in_channel = false;
    let mut item: Option<Item> = None;
    let mut idx = 0usize;

    loop {
        let event = match reader.read_event() {
            Ok(ev) => ev,
            Err(e) if in_channel => {
                if item.take().is_some() {
                    skipped += 1;
                }
                tracing::warn!(error = %e, items = out.len(), "rss document broken off, keeping parsed items");
                break;
            }
            Err(e) => return Err(e).context("parsing rss xml"),
        };

        match event {
            Event::Eof => break,
            Event::Start(e) => {
                let name = e.name();
                if let Some(it) = item.as_mut() {
                    it.open(name.as_ref());
                } else {
                    match name.as_ref() {
                        b"channel" => in_channel = true,
                        b"item" if in_channel => item = Some(Item::default()),
                        _ => {}
                    }
                }
            }
            // Void elements such as `<br/>` separate words inside a field.
            Event::Empty(_) => {
                if let Some(it) = item.as_mut() {
                    it.push_text(" ");
                }
            }
            Event::End(_) => {
                let finished = item.as_mut().map(Item::close).unwrap_or(false);
                if finished {
                    if let Some(it) = item.take() {
                        match it.into_content() {
                            Ok(c) => out.push(c),
                            Err(e) => {
                                tracing::warn!(item = idx, error = %format!("{e:#}"), "skipping rss item");
                                skipped += 1;
                            }
                        }
                        idx += 1;
                    }
                }
            }
            Event::Text(e) => {
                if let Some(it) = item.as_mut().filter(|it| it.capturing()) {
                    match e.unescape() {
                        Ok(text) => it.push_text(&text),
                        Err(err) => it.fail(anyhow::Error::new(err).context("unescaping item text")),
                    }
                }
            }
            Event::CData(e) => {
                if let Some(it) = item.as_mut() {
                    let bytes = e.into_inner();
                    it.push_text(&String::from_utf8_lossy(&bytes));
                }
            }
            _ => {}
        }
    }

    if item.is_some() {
        skipped += 1;
    }
    if !in_channel {
        bail!("parsing rss xml: no <channel> element");
    }
    Ok((out, skipped))
}

/// Feed source for one URL. Items are deduplicated and then classified.
pub struct RssSource {
    url: String,
    client: reqwest::Client,
}

impl RssSource {
    pub fn new(url: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("war-alert/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .context("building rss http client")?;
        Ok(Self {
            url: url.into(),
            client,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn fetch_body(&self) -> Result<String> {
        let resp = self
            .client
            .get(&self.url)
            .send()
            .await
            .context("rss http get()")?;
        let status = resp.status();
        let body = resp.text().await.context("rss http .text()")?;
        if !status.is_success() {
            bail!("rss endpoint returned {status}: {body}");
        }
        Ok(body)
    }
}

#[async_trait]
impl Source for RssSource {
    async fn fetch(&self) -> Vec<Content> {
        tracing::info!(source = "rss", url = %self.url, "fetching");

        let body = match self.fetch_body().await {
            Ok(b) => b,
            Err(e) => {
                tracing::error!(url = %self.url, error = %format!("{e:#}"), "rss fetch failed");
                counter!(SOURCE_ERRORS_TOTAL, "source" => "rss").increment(1);
                return Vec::new();
            }
        };

        match parse_feed(&body) {
            Ok((items, skipped)) => {
                tracing::debug!(url = %self.url, items = items.len(), skipped, "rss parsed");
                items
            }
            Err(e) => {
                tracing::error!(url = %self.url, error = %format!("{e:#}"), "error parsing rss source");
                counter!(SOURCE_ERRORS_TOTAL, "source" => "rss").increment(1);
                Vec::new()
            }
        }
    }

    fn processors(&self) -> Vec<ProcessorKind> {
        vec![ProcessorKind::Unique, ProcessorKind::Classify]
    }

    fn name(&self) -> &str {
        "rss"
    }
}

// HTML named entities are not defined in XML and make the parser bail.
fn scrub_html_entities_for_xml(s: &str) -> String {
    s.replace("&nbsp;", " ")
        .replace("&ndash;", "-")
        .replace("&mdash;", "-")
        .replace("&ldquo;", "\"")
        .replace("&rdquo;", "\"")
        .replace("&lsquo;", "'")
        .replace("&rsquo;", "'")
}

#[cfg(test)]
mod tests {
    use super::*;

    const FEED: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<rss version="2.0">
  <channel>
    <title>World</title>
    <item>
      <title>Missile strike reported</title>
      <description>&lt;p&gt;Several &lt;b&gt;explosions&lt;/b&gt;&lt;/p&gt;</description>
      <pubDate>Mon, 01 Jan 2024 10:00:00 GMT</pubDate>
      <link>https://news.example/1</link>
    </item>
    <item>
      <title>No link here</title>
      <description>broken</description>
      <pubDate>Mon, 01 Jan 2024 10:05:00 GMT</pubDate>
    </item>
    <item>
      <title>Ceasefire&nbsp;talks</title>
      <description><![CDATA[<i>Delegations</i> meet]]></description>
      <pubDate>Mon, 01 Jan 2024 11:00:00 GMT</pubDate>
      <link>https://news.example/2</link>
    </item>
  </channel>
</rss>"#;

    #[test]
    fn parses_items_and_skips_incomplete_ones() {
        let (items, skipped) = parse_feed(FEED).expect("parses");
        assert_eq!(skipped, 1);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Missile strike reported");
        assert_eq!(items[0].description, "Several explosions");
        assert_eq!(items[0].published_at, "Mon, 01 Jan 2024 10:00:00 GMT");
        assert_eq!(items[0].link, "https://news.example/1");
        assert_eq!(items[1].title, "Ceasefire talks");
        assert_eq!(items[1].description, "Delegations meet");
    }

    #[test]
    fn empty_channel_yields_nothing() {
        let (items, skipped) =
            parse_feed("<rss><channel><title>x</title></channel></rss>").expect("parses");
        assert!(items.is_empty());
        assert_eq!(skipped, 0);
    }

    #[test]
    fn nested_markup_in_one_item_does_not_lose_its_siblings() {
        let xml = r#"<rss><channel>
            <item>
              <title>Good</title>
              <description>fine</description>
              <pubDate>Mon, 01 Jan 2024 10:00:00 GMT</pubDate>
              <link>https://news.example/1</link>
            </item>
            <item>
              <title>Raw xhtml</title>
              <description><p>Shelling <b>near</b> the port</p></description>
              <pubDate>Mon, 01 Jan 2024 10:05:00 GMT</pubDate>
              <link>https://news.example/2</link>
            </item>
          </channel></rss>"#;
        let (items, skipped) = parse_feed(xml).expect("parses");
        assert_eq!(skipped, 0);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "Good");
        assert_eq!(items[1].description, "Shelling near the port");
    }

    #[test]
    fn repeated_child_takes_the_first_occurrence() {
        let xml = r#"<rss><channel>
            <item>
              <title>First title</title>
              <title>Second title</title>
              <description>body</description>
              <pubDate>Mon, 01 Jan 2024 10:00:00 GMT</pubDate>
              <link>https://news.example/1</link>
            </item>
            <item>
              <title>Sibling</title>
              <description>body</description>
              <pubDate>Mon, 01 Jan 2024 10:05:00 GMT</pubDate>
              <link>https://news.example/2</link>
            </item>
          </channel></rss>"#;
        let (items, skipped) = parse_feed(xml).expect("parses");
        assert_eq!(skipped, 0);
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].title, "First title");
        assert_eq!(items[1].title, "Sibling");
    }

    #[test]
    fn undefined_entity_skips_only_that_item() {
        let xml = r#"<rss><channel>
            <item>
              <title>Bad &bogus; entity</title>
              <description>body</description>
              <pubDate>Mon, 01 Jan 2024 10:00:00 GMT</pubDate>
              <link>https://news.example/1</link>
            </item>
            <item>
              <title>Kept</title>
              <description>body</description>
              <pubDate>Mon, 01 Jan 2024 10:05:00 GMT</pubDate>
              <link>https://news.example/2</link>
            </item>
          </channel></rss>"#;
        let (items, skipped) = parse_feed(xml).expect("parses");
        assert_eq!(skipped, 1);
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Kept");
    }

    #[test]
    fn document_broken_off_keeps_completed_items() {
        let xml = r#"<rss><channel>
            <item>
              <title>Complete</title>
              <description>body</description>
              <pubDate>Mon, 01 Jan 2024 10:00:00 GMT</pubDate>
              <link>https://news.example/1</link>
            </item>
            <item>
              <title>Cut off</title>
              <description>bo</wrong>"#;
        let (items, skipped) = parse_feed(xml).expect("partial batch");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Complete");
        assert_eq!(skipped, 1);
    }

    #[test]
    fn garbage_is_an_error() {
        assert!(parse_feed("this is not xml").is_err());
    }
}
