use std::collections::HashMap;

use crate::config::PublicationConfig;

/// A syndication endpoint plus whether its links need the bypass proxy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedSource {
    pub key: String,
    pub url: String,
    pub paywalled: bool,
}

impl FeedSource {
    /// Source for a user-supplied feed URL. The URL doubles as the key.
    pub fn custom(url: &str, paywalled: bool) -> Self {
        Self {
            key: url.to_string(),
            url: url.to_string(),
            paywalled,
        }
    }
}

/// Known publications, keyed case-insensitively.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    sources: HashMap<String, FeedSource>,
}

impl Registry {
    pub fn new(publications: &[PublicationConfig]) -> Self {
        let sources = publications
            .iter()
            .map(|p| {
                let key = p.key.to_lowercase();
                let source = FeedSource {
                    key: key.clone(),
                    url: p.url.clone(),
                    paywalled: p.paywalled,
                };
                (key, source)
            })
            .collect();

        Self { sources }
    }

    pub fn lookup(&self, key: &str) -> Option<&FeedSource> {
        self.sources.get(&key.to_lowercase())
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }
}
