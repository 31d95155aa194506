use std::time::Duration;

use feed_rs::model::Entry;
use feed_rs::parser;
use html2text::render::text_renderer::TrivialDecorator;
use reqwest::Client;
use rss::Channel;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::error::FetchError;
use crate::registry::FeedSource;

pub const DEFAULT_MAX_ITEMS: usize = 10;

// Wide enough that snippets are never wrapped mid-word.
const SNIPPET_WIDTH: usize = 10_000;

/// One parsed feed, trimmed to the newest items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawFeed {
    pub title: Option<String>,
    pub items: Vec<RawItem>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawItem {
    pub title: Option<String>,
    pub link: Option<String>,
    pub summary: Option<String>,
    pub pub_date: Option<String>,
}

pub struct Fetcher {
    client: Client,
    timeout: Duration,
    max_items: usize,
}

impl Fetcher {
    pub fn new(timeout: Duration, max_items: usize) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent("DailyDigest/1.0 (RSS Aggregator)")
            .build()?;

        Ok(Self {
            client,
            timeout,
            max_items,
        })
    }

    /// Best-effort fetch: any failure yields an empty feed.
    pub async fn fetch(&self, source: &FeedSource) -> RawFeed {
        match self.try_fetch(&source.url).await {
            Ok(feed) => {
                info!("Fetched {} items for '{}'", feed.items.len(), source.key);
                feed
            }
            Err(e) if e.is_timeout() => {
                warn!("Feed '{}' timed out after {:?}: {}", source.key, self.timeout, e);
                RawFeed::default()
            }
            Err(e) => {
                warn!("Failed to fetch feed '{}': {}", source.key, e);
                RawFeed::default()
            }
        }
    }

    pub async fn try_fetch(&self, url: &str) -> Result<RawFeed, FetchError> {
        debug!("Fetching feed: {}", url);

        let bytes = timeout(self.timeout, self.download(url))
            .await
            .map_err(|_| FetchError::Timeout(url.to_string()))??;

        let parsed = parser::parse(&bytes[..]).map_err(|source| FetchError::Parse {
            url: url.to_string(),
            source,
        })?;

        let mut raw_dates = raw_pub_dates(&bytes, parsed.entries.len()).into_iter();
        let title = parsed.title.map(|t| t.content);
        let items = parsed
            .entries
            .iter()
            .take(self.max_items)
            .map(|entry| Self::raw_item(entry, raw_dates.next().flatten()))
            .collect();

        Ok(RawFeed { title, items })
    }

    async fn download(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let http_error = |source: reqwest::Error| FetchError::Http {
            url: url.to_string(),
            source,
        };

        let response = self
            .client
            .get(url)
            .header(
                "Accept",
                "application/rss+xml, application/atom+xml, application/xml, text/xml, */*",
            )
            .send()
            .await
            .map_err(http_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status,
            });
        }

        let bytes = response.bytes().await.map_err(http_error)?;
        Ok(bytes.to_vec())
    }

    /// `raw_date` is the publish date as written upstream. Without one the
    /// parsed timestamp is rendered in RFC 3339.
    pub fn raw_item(entry: &Entry, raw_date: Option<String>) -> RawItem {
        let title = entry.title.as_ref().map(|t| t.content.clone());

        let link = entry.links.first().map(|l| l.href.clone());

        let summary = entry
            .summary
            .as_ref()
            .map(|s| s.content.as_str())
            .or_else(|| entry.content.as_ref().and_then(|c| c.body.as_deref()))
            .map(plain_text);

        let pub_date = raw_date.or_else(|| {
            entry
                .published
                .or(entry.updated)
                .map(|dt| dt.to_rfc3339())
        });

        RawItem {
            title,
            link,
            summary,
            pub_date,
        }
    }
}

/// Item publish dates exactly as an RSS 2.0 document spells them, in item
/// order. Empty unless the document reads as RSS with `expected` items.
fn raw_pub_dates(bytes: &[u8], expected: usize) -> Vec<Option<String>> {
    match Channel::read_from(bytes) {
        Ok(channel) if channel.items().len() == expected => channel
            .items()
            .iter()
            .map(|item| {
                item.pub_date().map(str::to_string).or_else(|| {
                    item.dublin_core_ext()
                        .and_then(|dc| dc.dates().first().cloned())
                })
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// Render an HTML fragment as plain text on a single line.
pub fn plain_text(html: &str) -> String {
    let text = html2text::from_read_with_decorator(
        html.as_bytes(),
        SNIPPET_WIDTH,
        TrivialDecorator::new(),
    );
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
