use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

use crate::fetcher::DEFAULT_MAX_ITEMS;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    /// Per-feed fetch timeout in seconds
    #[serde(default = "default_fetch_timeout")]
    pub fetch_timeout: u64,
    #[serde(default = "default_max_items_per_feed")]
    pub max_items_per_feed: usize,
    /// Host of the paywall bypass proxy
    #[serde(default = "default_proxy_host")]
    pub proxy_host: String,
    #[serde(default = "default_fallback")]
    pub fallback_to_default_preferences: bool,
    #[serde(default)]
    pub defaults: DefaultPreferences,
    pub publications: Vec<PublicationConfig>,
}

fn default_listen_addr() -> String {
    "0.0.0.0:3000".to_string()
}

fn default_fetch_timeout() -> u64 {
    10
}

fn default_max_items_per_feed() -> usize {
    DEFAULT_MAX_ITEMS
}

fn default_proxy_host() -> String {
    "12ft.io".to_string()
}

fn default_fallback() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone)]
pub struct PublicationConfig {
    pub key: String,
    pub url: String,
    #[serde(default)]
    pub paywalled: bool,
}

/// Preferences served to users who have not saved any.
#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct DefaultPreferences {
    pub publications: Vec<String>,
    pub daily_limit: i64,
}

impl Default for DefaultPreferences {
    fn default() -> Self {
        Self {
            publications: vec!["nyt".to_string(), "atlantic".to_string(), "aeon".to_string()],
            daily_limit: 9,
        }
    }
}

impl Config {
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Parse config from a TOML string (useful for testing)
    pub fn from_str(content: &str) -> anyhow::Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout)
    }
}
