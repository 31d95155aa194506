use std::sync::Arc;

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequestParts, Query, State},
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

use crate::error::ServiceError;
use crate::fetcher::Fetcher;
use crate::normalizer::{normalize, Article, ProxyRewriter};
use crate::preferences::PreferencesUpdate;
use crate::service::{AggregationService, Identity};

/// Header set by the authenticating reverse proxy in front of the service.
pub const IDENTITY_HEADER: &str = "x-forwarded-email";

pub struct AppState {
    pub service: Arc<AggregationService>,
    pub fetcher: Arc<Fetcher>,
    pub proxy: ProxyRewriter,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/articles", get(articles))
        .route("/customFeed", get(custom_feed))
        .route("/preferences", get(get_preferences).post(save_preferences))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

// Custom error type
pub struct AppError(ServiceError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            ServiceError::AuthenticationRequired => StatusCode::UNAUTHORIZED,
            ServiceError::PreferencesUnavailable(_) => StatusCode::NOT_FOUND,
            ServiceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ServiceError::Internal(e) => {
                error!("Request failed: {:#}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

impl<E: Into<ServiceError>> From<E> for AppError {
    fn from(err: E) -> Self {
        AppError(err.into())
    }
}

#[async_trait]
impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .headers
            .get(IDENTITY_HEADER)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|email| !email.is_empty())
            .map(Identity::new)
            .ok_or(AppError(ServiceError::AuthenticationRequired))
    }
}

// Route handlers
pub async fn articles(
    State(state): State<Arc<AppState>>,
    identity: Option<Identity>,
) -> Result<Json<Vec<Article>>, AppError> {
    let articles = state.service.articles_for(identity.as_ref()).await?;
    Ok(Json(articles))
}

#[derive(Deserialize)]
pub struct CustomFeedQuery {
    pub url: Option<String>,
    #[serde(default)]
    pub paywalled: bool,
}

/// Fetch one feed directly. Unlike aggregation, failures are surfaced.
pub async fn custom_feed(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CustomFeedQuery>,
) -> Response {
    let Some(url) = query.url.filter(|u| !u.trim().is_empty()) else {
        return (StatusCode::BAD_REQUEST, Json(Vec::<Article>::new())).into_response();
    };

    match state.fetcher.try_fetch(&url).await {
        Ok(feed) => {
            let articles: Vec<Article> = feed
                .items
                .iter()
                .map(|item| normalize(item, feed.title.as_deref(), query.paywalled, &state.proxy))
                .collect();
            Json(articles).into_response()
        }
        Err(e) => {
            warn!("Error fetching custom feed {}: {}", url, e);
            (StatusCode::INTERNAL_SERVER_ERROR, Json(Vec::<Article>::new())).into_response()
        }
    }
}

pub async fn get_preferences(
    State(state): State<Arc<AppState>>,
    identity: Identity,
) -> Result<impl IntoResponse, AppError> {
    let preferences = state.service.preferences_for(&identity.email).await?;
    Ok(Json(preferences))
}

pub async fn save_preferences(
    State(state): State<Arc<AppState>>,
    identity: Identity,
    body: Result<Json<PreferencesUpdate>, JsonRejection>,
) -> Result<impl IntoResponse, AppError> {
    let Json(update) = body.map_err(|e| ServiceError::InvalidInput(e.body_text()))?;
    let preferences = update.validate(&identity.email)?;

    state.service.save_preferences(&preferences).await?;

    Ok(Json(json!({ "message": "Preferences saved successfully" })))
}

pub async fn health() -> impl IntoResponse {
    "OK"
}
