use std::sync::Arc;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tracing::{debug, warn};

use crate::normalizer::Article;

pub trait Clock: Send + Sync {
    /// Current calendar date in UTC.
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// The most recent article set stored for one user.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedArticles {
    pub date: NaiveDate,
    pub articles: Vec<Article>,
}

/// Backing storage for per-user daily article sets.
#[async_trait]
pub trait ArticleStore: Send + Sync {
    async fn latest_articles(&self, email: &str) -> anyhow::Result<Option<CachedArticles>>;

    /// Upsert the article set for (email, date).
    async fn put_articles(&self, email: &str, date: NaiveDate, articles: &[Article])
        -> anyhow::Result<()>;
}

/// Per-user cache valid for the rest of the UTC calendar day.
#[derive(Clone)]
pub struct DailyCache {
    store: Arc<dyn ArticleStore>,
    clock: Arc<dyn Clock>,
}

impl DailyCache {
    pub fn new(store: Arc<dyn ArticleStore>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Today's articles for `email`, or `None` when they must be recomputed.
    pub async fn lookup(&self, email: &str) -> Option<Vec<Article>> {
        let today = self.clock.today();

        match self.store.latest_articles(email).await {
            Ok(Some(entry)) if entry.date == today => {
                debug!("Cache hit for {} on {}", email, today);
                Some(entry.articles)
            }
            Ok(Some(entry)) => {
                debug!("Cache entry for {} is from {}, recomputing", email, entry.date);
                None
            }
            Ok(None) => None,
            Err(e) => {
                warn!("Cache lookup failed for {}: {}", email, e);
                None
            }
        }
    }

    pub async fn store(&self, email: &str, articles: &[Article]) -> anyhow::Result<()> {
        self.store.put_articles(email, self.clock.today(), articles).await
    }
}


#[cfg(test)]
mod tests {
    use super::testing::{FixedClock, MemoryArticleStore};
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn article(title: &str) -> Article {
        Article {
            title: title.to_string(),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_lookup_miss_when_empty() {
        let cache = DailyCache::new(
            Arc::new(MemoryArticleStore::default()),
            Arc::new(FixedClock::new(date(2024, 12, 9))),
        );
        assert!(cache.lookup("a@example.com").await.is_none());
    }

    #[tokio::test]
    async fn test_store_then_lookup_same_day() {
        let cache = DailyCache::new(
            Arc::new(MemoryArticleStore::default()),
            Arc::new(FixedClock::new(date(2024, 12, 9))),
        );
        let articles = vec![article("one"), article("two")];

        cache.store("a@example.com", &articles).await.unwrap();

        assert_eq!(cache.lookup("a@example.com").await, Some(articles));
        assert!(cache.lookup("b@example.com").await.is_none());
    }

    #[tokio::test]
    async fn test_entry_expires_on_date_rollover() {
        let clock = Arc::new(FixedClock::new(date(2024, 12, 9)));
        let cache = DailyCache::new(Arc::new(MemoryArticleStore::default()), clock.clone());

        cache.store("a@example.com", &[article("one")]).await.unwrap();
        clock.advance_days(1);

        assert!(cache.lookup("a@example.com").await.is_none());
    }

    #[tokio::test]
    async fn test_store_overwrites() {
        let cache = DailyCache::new(
            Arc::new(MemoryArticleStore::default()),
            Arc::new(FixedClock::new(date(2024, 12, 9))),
        );

        cache.store("a@example.com", &[article("first")]).await.unwrap();
        cache.store("a@example.com", &[article("second")]).await.unwrap();

        assert_eq!(cache.lookup("a@example.com").await, Some(vec![article("second")]));
    }

    #[tokio::test]
    async fn test_read_failure_is_a_miss() {
        let store = MemoryArticleStore {
            fail_reads: true,
            ..Default::default()
        };
        let cache = DailyCache::new(Arc::new(store), Arc::new(FixedClock::new(date(2024, 12, 9))));
        assert!(cache.lookup("a@example.com").await.is_none());
    }

    #[tokio::test]
    async fn test_write_failure_is_reported() {
        let store = MemoryArticleStore {
            fail_writes: true,
            ..Default::default()
        };
        let cache = DailyCache::new(Arc::new(store), Arc::new(FixedClock::new(date(2024, 12, 9))));
        assert!(cache.store("a@example.com", &[article("one")]).await.is_err());
    }

    #[test]
    fn test_system_clock_is_utc_today() {
        assert_eq!(SystemClock.today(), Utc::now().date_naive());
    }
}
