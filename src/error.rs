use thiserror::Error;

/// Failure to retrieve or parse a single feed.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("HTTP {status} for {url}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("request to {0} timed out")]
    Timeout(String),

    #[error("could not parse feed from {url}: {source}")]
    Parse {
        url: String,
        #[source]
        source: feed_rs::parser::ParseFeedError,
    },
}

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("Not authenticated")]
    AuthenticationRequired,

    #[error("Preferences unavailable: {0}")]
    PreferencesUnavailable(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl FetchError {
    pub fn is_timeout(&self) -> bool {
        match self {
            FetchError::Timeout(_) => true,
            FetchError::Http { source, .. } => source.is_timeout(),
            _ => false,
        }
    }
}
