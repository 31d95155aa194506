use std::sync::Arc;

use futures::future::join_all;
use rand::seq::SliceRandom;
use rand::Rng;
use tracing::info;

use crate::fetcher::Fetcher;
use crate::normalizer::{normalize, Article, ProxyRewriter};
use crate::registry::FeedSource;

/// Fans out one fetch per source and merges the normalized results.
pub struct Aggregator {
    fetcher: Arc<Fetcher>,
    proxy: ProxyRewriter,
}

impl Aggregator {
    pub fn new(fetcher: Arc<Fetcher>, proxy: ProxyRewriter) -> Self {
        Self { fetcher, proxy }
    }

    pub async fn aggregate(&self, sources: &[FeedSource], limit: i64) -> Vec<Article> {
        if limit <= 0 || sources.is_empty() {
            return Vec::new();
        }

        let per_source = join_all(sources.iter().map(|source| self.fetch_articles(source))).await;
        let merged: Vec<Article> = per_source.into_iter().flatten().collect();

        info!(
            "Aggregated {} articles from {} sources, keeping up to {}",
            merged.len(),
            sources.len(),
            limit
        );

        select(merged, limit, &mut rand::thread_rng())
    }

    /// Fetch and normalize a single source. Failures contribute nothing.
    pub async fn fetch_articles(&self, source: &FeedSource) -> Vec<Article> {
        let feed = self.fetcher.fetch(source).await;
        feed.items
            .iter()
            .map(|item| normalize(item, feed.title.as_deref(), source.paywalled, &self.proxy))
            .collect()
    }
}

/// Uniformly shuffle `articles` and keep the first `limit`.
pub fn select<R: Rng + ?Sized>(mut articles: Vec<Article>, limit: i64, rng: &mut R) -> Vec<Article> {
    if limit <= 0 {
        return Vec::new();
    }

    articles.shuffle(rng);
    articles.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
    articles
}
