use async_trait::async_trait;
use reqwest::Url;
use serde::{Deserialize, Serialize};

use crate::config::DefaultPreferences;
use crate::error::ServiceError;

pub const MAX_DAILY_LIMIT: i64 = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preferences {
    pub email: String,
    pub publications: Vec<String>,
    pub daily_limit: i64,
    #[serde(default)]
    pub custom_feeds: Vec<CustomFeed>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomFeed {
    pub url: String,
    #[serde(default)]
    pub paywalled: bool,
}

impl Preferences {
    pub fn defaults_for(email: &str, defaults: &DefaultPreferences) -> Self {
        Self {
            email: email.to_string(),
            publications: defaults.publications.clone(),
            daily_limit: defaults.daily_limit,
            custom_feeds: Vec::new(),
        }
    }
}

/// Body of a preferences update request.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreferencesUpdate {
    pub publications: Vec<String>,
    #[serde(alias = "daily_limit")]
    pub daily_limit: i64,
    #[serde(default, alias = "custom_feeds")]
    pub custom_feeds: Vec<CustomFeed>,
}

impl PreferencesUpdate {
    pub fn validate(self, email: &str) -> Result<Preferences, ServiceError> {
        if !(0..=MAX_DAILY_LIMIT).contains(&self.daily_limit) {
            return Err(ServiceError::InvalidInput(format!(
                "dailyLimit must be between 0 and {}",
                MAX_DAILY_LIMIT
            )));
        }

        let mut publications = Vec::with_capacity(self.publications.len());
        for key in self.publications {
            let key = key.trim().to_string();
            if key.is_empty() {
                return Err(ServiceError::InvalidInput(
                    "publication keys must not be empty".to_string(),
                ));
            }
            publications.push(key);
        }

        let mut custom_feeds = Vec::with_capacity(self.custom_feeds.len());
        for feed in self.custom_feeds {
            let url = feed.url.trim().to_string();
            match Url::parse(&url) {
                Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => {}
                _ => {
                    return Err(ServiceError::InvalidInput(format!(
                        "invalid custom feed URL: {}",
                        url
                    )))
                }
            }
            custom_feeds.push(CustomFeed {
                url,
                paywalled: feed.paywalled,
            });
        }

        Ok(Preferences {
            email: email.to_string(),
            publications,
            daily_limit: self.daily_limit,
            custom_feeds,
        })
    }
}

/// Persistence for user preferences, keyed by email.
#[async_trait]
pub trait PreferencesStore: Send + Sync {
    async fn get_preferences(&self, email: &str) -> anyhow::Result<Option<Preferences>>;

    /// Replace any stored record for the same email.
    async fn upsert_preferences(&self, preferences: &Preferences) -> anyhow::Result<()>;
}
