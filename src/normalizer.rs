use serde::{Deserialize, Serialize};

use crate::fetcher::RawItem;

/// Canonical article record handed to callers and stored in the daily cache.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Article {
    pub title: String,
    pub link: String,
    pub snippet: String,
    #[serde(rename = "pubDate")]
    pub pub_date: String,
    pub source: String,
}

/// Rewrites links through the paywall bypass proxy.
#[derive(Debug, Clone)]
pub struct ProxyRewriter {
    host: String,
}

impl ProxyRewriter {
    pub fn new(host: impl Into<String>) -> Self {
        Self { host: host.into() }
    }

    pub fn rewrite(&self, link: &str) -> String {
        format!("https://{}/proxy?q={}", self.host, urlencoding::encode(link))
    }
}

pub fn normalize(
    item: &RawItem,
    feed_title: Option<&str>,
    paywalled: bool,
    proxy: &ProxyRewriter,
) -> Article {
    let link = item.link.as_deref().unwrap_or("");
    let link = if paywalled {
        proxy.rewrite(link)
    } else {
        link.to_string()
    };

    Article {
        title: item.title.clone().unwrap_or_default(),
        link,
        snippet: item.summary.clone().unwrap_or_default(),
        pub_date: item.pub_date.clone().unwrap_or_default(),
        source: feed_title.unwrap_or("").to_string(),
    }
}
