use std::sync::Arc;

use tracing::{info, warn};

use crate::aggregator::Aggregator;
use crate::cache::DailyCache;
use crate::config::DefaultPreferences;
use crate::error::ServiceError;
use crate::normalizer::Article;
use crate::preferences::{Preferences, PreferencesStore};
use crate::registry::{FeedSource, Registry};

/// An authenticated user, as vouched for by the upstream auth layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub email: String,
}

impl Identity {
    pub fn new(email: impl Into<String>) -> Self {
        Self {
            email: email.into(),
        }
    }
}

pub struct AggregationService {
    registry: Arc<Registry>,
    aggregator: Aggregator,
    cache: DailyCache,
    preferences: Arc<dyn PreferencesStore>,
    defaults: DefaultPreferences,
    fallback_to_defaults: bool,
}

impl AggregationService {
    pub fn new(
        registry: Arc<Registry>,
        aggregator: Aggregator,
        cache: DailyCache,
        preferences: Arc<dyn PreferencesStore>,
        defaults: DefaultPreferences,
        fallback_to_defaults: bool,
    ) -> Self {
        Self {
            registry,
            aggregator,
            cache,
            preferences,
            defaults,
            fallback_to_defaults,
        }
    }

    pub async fn articles_for(
        &self,
        identity: Option<&Identity>,
    ) -> Result<Vec<Article>, ServiceError> {
        let identity = identity.ok_or(ServiceError::AuthenticationRequired)?;
        let email = identity.email.as_str();

        if let Some(articles) = self.cache.lookup(email).await {
            info!("Serving {} cached articles to {}", articles.len(), email);
            return Ok(articles);
        }

        let preferences = self.preferences_for(email).await?;
        let sources = self.resolve_sources(&preferences);
        info!(
            "Aggregating {} sources for {} (limit {})",
            sources.len(),
            email,
            preferences.daily_limit
        );

        let articles = self
            .aggregator
            .aggregate(&sources, preferences.daily_limit)
            .await;

        if let Err(e) = self.cache.store(email, &articles).await {
            warn!("Failed to cache articles for {}: {}", email, e);
        }

        Ok(articles)
    }

    /// Stored preferences, or the defaults when fallback is enabled.
    pub async fn preferences_for(&self, email: &str) -> Result<Preferences, ServiceError> {
        let reason = match self.preferences.get_preferences(email).await {
            Ok(Some(preferences)) => return Ok(preferences),
            Ok(None) => format!("no preferences saved for {}", email),
            Err(e) => {
                warn!("Failed to load preferences for {}: {}", email, e);
                e.to_string()
            }
        };

        if self.fallback_to_defaults {
            Ok(Preferences::defaults_for(email, &self.defaults))
        } else {
            Err(ServiceError::PreferencesUnavailable(reason))
        }
    }

    pub async fn save_preferences(&self, preferences: &Preferences) -> Result<(), ServiceError> {
        self.preferences.upsert_preferences(preferences).await?;
        info!("Saved preferences for {}", preferences.email);
        Ok(())
    }

    /// Registry sources for each known publication, then one per custom feed.
    pub fn resolve_sources(&self, preferences: &Preferences) -> Vec<FeedSource> {
        let registered = preferences.publications.iter().filter_map(|key| {
            let source = self.registry.lookup(key);
            if source.is_none() {
                warn!("Unknown publication '{}', skipping", key);
            }
            source.cloned()
        });

        let custom = preferences
            .custom_feeds
            .iter()
            .map(|feed| FeedSource::custom(&feed.url, feed.paywalled));

        registered.chain(custom).collect()
    }
}
