use std::sync::Arc;

use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use daily_digest::aggregator::Aggregator;
use daily_digest::cache::{DailyCache, SystemClock};
use daily_digest::config::Config;
use daily_digest::db::Database;
use daily_digest::fetcher::Fetcher;
use daily_digest::normalizer::ProxyRewriter;
use daily_digest::registry::Registry;
use daily_digest::routes::{self, AppState};
use daily_digest::service::AggregationService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "daily_digest=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::var("DIGEST_CONFIG").unwrap_or_else(|_| "digest.toml".to_string());
    let config = Config::load(&config_path)?;
    info!(
        "Loaded {} publications from {}",
        config.publications.len(),
        config_path
    );

    // Initialize database
    let database_url = std::env::var("DATABASE_URL")
        .unwrap_or_else(|_| "sqlite:daily_digest.db?mode=rwc".to_string());
    let db = Database::new(&database_url).await?;
    db.initialize().await?;
    info!("Database initialized");

    let db = Arc::new(db);

    let registry = Arc::new(Registry::new(&config.publications));
    let fetcher = Arc::new(Fetcher::new(config.fetch_timeout(), config.max_items_per_feed)?);
    let proxy = ProxyRewriter::new(config.proxy_host.clone());

    let service = AggregationService::new(
        registry,
        Aggregator::new(fetcher.clone(), proxy.clone()),
        DailyCache::new(db.clone(), Arc::new(SystemClock)),
        db.clone(),
        config.defaults.clone(),
        config.fallback_to_default_preferences,
    );

    // Create app state
    let state = Arc::new(AppState {
        service: Arc::new(service),
        fetcher,
        proxy,
    });

    let app = routes::router(state);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!("Server starting on http://{}", config.listen_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
