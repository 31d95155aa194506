use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use sqlx::{sqlite::SqlitePoolOptions, FromRow, SqlitePool};

use crate::cache::{ArticleStore, CachedArticles};
use crate::normalizer::Article;
use crate::preferences::{CustomFeed, Preferences, PreferencesStore};

const DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, FromRow)]
struct PreferencesRow {
    publications: String,
    daily_limit: i64,
}

#[derive(Debug, Clone, FromRow)]
struct CustomFeedRow {
    url: String,
    paywalled: bool,
}

#[derive(Debug, Clone, FromRow)]
struct DailyArticlesRow {
    date: String,
    articles: String,
}

pub struct Database {
    pool: SqlitePool,
}

impl Database {
    pub async fn new(database_url: &str) -> anyhow::Result<Self> {
        // Every connection to an in-memory database gets its own copy.
        let max_connections = if database_url.contains(":memory:") { 1 } else { 5 };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        Ok(Self { pool })
    }

    pub async fn initialize(&self) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS preferences (
                email TEXT PRIMARY KEY,
                publications TEXT NOT NULL,
                daily_limit INTEGER NOT NULL,
                updated_at TEXT NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS custom_feeds (
                id INTEGER PRIMARY KEY,
                email TEXT NOT NULL,
                url TEXT NOT NULL,
                paywalled INTEGER NOT NULL DEFAULT 0,
                UNIQUE(email, url)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS daily_articles (
                email TEXT NOT NULL,
                date TEXT NOT NULL,
                articles TEXT NOT NULL,
                PRIMARY KEY(email, date)
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get_custom_feeds(&self, email: &str) -> anyhow::Result<Vec<CustomFeed>> {
        let rows = sqlx::query_as::<_, CustomFeedRow>(
            "SELECT url, paywalled FROM custom_feeds WHERE email = ? ORDER BY id",
        )
        .bind(email)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| CustomFeed {
                url: row.url,
                paywalled: row.paywalled,
            })
            .collect())
    }
}

#[async_trait]
impl PreferencesStore for Database {
    async fn get_preferences(&self, email: &str) -> anyhow::Result<Option<Preferences>> {
        let row = sqlx::query_as::<_, PreferencesRow>(
            "SELECT publications, daily_limit FROM preferences WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(Preferences {
            email: email.to_string(),
            publications: serde_json::from_str(&row.publications)?,
            daily_limit: row.daily_limit,
            custom_feeds: self.get_custom_feeds(email).await?,
        }))
    }

    async fn upsert_preferences(&self, preferences: &Preferences) -> anyhow::Result<()> {
        let publications = serde_json::to_string(&preferences.publications)?;
        let now = Utc::now().to_rfc3339();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO preferences (email, publications, daily_limit, updated_at)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(email) DO UPDATE SET
                publications = excluded.publications,
                daily_limit = excluded.daily_limit,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&preferences.email)
        .bind(&publications)
        .bind(preferences.daily_limit)
        .bind(&now)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM custom_feeds WHERE email = ?")
            .bind(&preferences.email)
            .execute(&mut *tx)
            .await?;

        for feed in &preferences.custom_feeds {
            sqlx::query(
                r#"
                INSERT INTO custom_feeds (email, url, paywalled)
                VALUES (?, ?, ?)
                ON CONFLICT(email, url) DO UPDATE SET paywalled = excluded.paywalled
                "#,
            )
            .bind(&preferences.email)
            .bind(&feed.url)
            .bind(feed.paywalled)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl ArticleStore for Database {
    async fn latest_articles(&self, email: &str) -> anyhow::Result<Option<CachedArticles>> {
        let row = sqlx::query_as::<_, DailyArticlesRow>(
            r#"
            SELECT date, articles FROM daily_articles
            WHERE email = ?
            ORDER BY date DESC
            LIMIT 1
            "#,
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        Ok(Some(CachedArticles {
            date: NaiveDate::parse_from_str(&row.date, DATE_FORMAT)?,
            articles: serde_json::from_str(&row.articles)?,
        }))
    }

    async fn put_articles(
        &self,
        email: &str,
        date: NaiveDate,
        articles: &[Article],
    ) -> anyhow::Result<()> {
        let articles = serde_json::to_string(articles)?;

        sqlx::query(
            r#"
            INSERT INTO daily_articles (email, date, articles)
            VALUES (?, ?, ?)
            ON CONFLICT(email, date) DO UPDATE SET
                articles = excluded.articles
            "#,
        )
        .bind(email)
        .bind(date.format(DATE_FORMAT).to_string())
        .bind(&articles)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn create_test_db() -> Database {
        let db = Database::new("sqlite::memory:").await.unwrap();
        db.initialize().await.unwrap();
        db
    }

    fn create_preferences(email: &str, publications: &[&str], daily_limit: i64) -> Preferences {
        Preferences {
            email: email.to_string(),
            publications: publications.iter().map(|p| p.to_string()).collect(),
            daily_limit,
            custom_feeds: Vec::new(),
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn article(title: &str) -> Article {
        Article {
            title: title.to_string(),
            link: format!("https://example.com/{}", title),
            snippet: String::new(),
            pub_date: "Mon, 09 Dec 2024 12:00:00 +0000".to_string(),
            source: "Example".to_string(),
        }
    }

    // Database initialization tests
    mod initialization_tests {
        use super::*;

        #[tokio::test]
        async fn test_database_creation() {
            let db = Database::new("sqlite::memory:").await;
            assert!(db.is_ok());
        }

        #[tokio::test]
        async fn test_database_initialization() {
            let db = create_test_db().await;
            let prefs = db.get_preferences("nobody@example.com").await.unwrap();
            assert!(prefs.is_none());
        }

        #[tokio::test]
        async fn test_double_initialization_is_safe() {
            let db = create_test_db().await;
            // Initialize again - should not fail due to IF NOT EXISTS
            let result = db.initialize().await;
            assert!(result.is_ok());
        }
    }

    mod preferences_tests {
        use super::*;

        #[tokio::test]
        async fn test_round_trip() {
            let db = create_test_db().await;
            let mut prefs = create_preferences("a@example.com", &["nyt", "atlantic"], 5);
            prefs.custom_feeds = vec![
                CustomFeed {
                    url: "https://blog.example.com/rss".to_string(),
                    paywalled: false,
                },
                CustomFeed {
                    url: "https://paywalled.example.com/rss".to_string(),
                    paywalled: true,
                },
            ];

            db.upsert_preferences(&prefs).await.unwrap();

            let loaded = db.get_preferences("a@example.com").await.unwrap();
            assert_eq!(loaded, Some(prefs));
        }

        #[tokio::test]
        async fn test_last_write_wins() {
            let db = create_test_db().await;
            let mut first = create_preferences("a@example.com", &["nyt"], 3);
            first.custom_feeds = vec![CustomFeed {
                url: "https://old.example.com/rss".to_string(),
                paywalled: false,
            }];
            db.upsert_preferences(&first).await.unwrap();

            let second = create_preferences("a@example.com", &["wired", "aeon"], 12);
            db.upsert_preferences(&second).await.unwrap();

            let loaded = db.get_preferences("a@example.com").await.unwrap().unwrap();
            assert_eq!(loaded, second);
            assert!(db.get_custom_feeds("a@example.com").await.unwrap().is_empty());
        }

        #[tokio::test]
        async fn test_users_are_isolated() {
            let db = create_test_db().await;
            db.upsert_preferences(&create_preferences("a@example.com", &["nyt"], 3))
                .await
                .unwrap();
            db.upsert_preferences(&create_preferences("b@example.com", &["vice"], 7))
                .await
                .unwrap();

            let a = db.get_preferences("a@example.com").await.unwrap().unwrap();
            let b = db.get_preferences("b@example.com").await.unwrap().unwrap();
            assert_eq!(a.publications, vec!["nyt"]);
            assert_eq!(b.daily_limit, 7);
        }

        #[tokio::test]
        async fn test_duplicate_custom_feed_urls_collapse() {
            let db = create_test_db().await;
            let mut prefs = create_preferences("a@example.com", &[], 3);
            prefs.custom_feeds = vec![
                CustomFeed {
                    url: "https://blog.example.com/rss".to_string(),
                    paywalled: false,
                },
                CustomFeed {
                    url: "https://blog.example.com/rss".to_string(),
                    paywalled: true,
                },
            ];
            db.upsert_preferences(&prefs).await.unwrap();

            let feeds = db.get_custom_feeds("a@example.com").await.unwrap();
            assert_eq!(feeds.len(), 1);
            assert!(feeds[0].paywalled);
        }
    }

    mod daily_articles_tests {
        use super::*;

        #[tokio::test]
        async fn test_no_entry() {
            let db = create_test_db().await;
            assert!(db.latest_articles("a@example.com").await.unwrap().is_none());
        }

        #[tokio::test]
        async fn test_put_then_get() {
            let db = create_test_db().await;
            let articles = vec![article("one"), article("two")];

            db.put_articles("a@example.com", date(2024, 12, 9), &articles)
                .await
                .unwrap();

            let entry = db.latest_articles("a@example.com").await.unwrap().unwrap();
            assert_eq!(entry.date, date(2024, 12, 9));
            assert_eq!(entry.articles, articles);
        }

        #[tokio::test]
        async fn test_latest_date_wins() {
            let db = create_test_db().await;
            db.put_articles("a@example.com", date(2024, 12, 10), &[article("new")])
                .await
                .unwrap();
            db.put_articles("a@example.com", date(2024, 12, 9), &[article("old")])
                .await
                .unwrap();

            let entry = db.latest_articles("a@example.com").await.unwrap().unwrap();
            assert_eq!(entry.date, date(2024, 12, 10));
            assert_eq!(entry.articles, vec![article("new")]);
        }

        #[tokio::test]
        async fn test_same_day_upsert_overwrites() {
            let db = create_test_db().await;
            db.put_articles("a@example.com", date(2024, 12, 9), &[article("first")])
                .await
                .unwrap();
            db.put_articles("a@example.com", date(2024, 12, 9), &[article("second")])
                .await
                .unwrap();

            let entry = db.latest_articles("a@example.com").await.unwrap().unwrap();
            assert_eq!(entry.articles, vec![article("second")]);
        }

        #[tokio::test]
        async fn test_empty_article_set_is_cached() {
            let db = create_test_db().await;
            db.put_articles("a@example.com", date(2024, 12, 9), &[])
                .await
                .unwrap();

            let entry = db.latest_articles("a@example.com").await.unwrap().unwrap();
            assert!(entry.articles.is_empty());
        }
    }
}
