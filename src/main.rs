use axum::{routing::get, Router};
use std::net::SocketAddr;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_governor::{
    governor::GovernorConfigBuilder, key_extractor::SmartIpKeyExtractor, GovernorLayer,
};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crm_intel::api;
use crm_intel::config::Config;
use crm_intel::handlers::{self, AppState};
use crm_intel::pipeline::Analyzer;
use crm_intel::store::JsonFileStore;

/// Main entry point for the service.
///
/// Initializes logging and configuration, builds the analyzer (vendor
/// directory, fetcher, AI normalizer, record cache) and the JSON record
/// store, then serves the HTTP API with CORS and per-IP rate limiting.
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "crm_intel=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    let analyzer = Analyzer::from_config(&config)?;
    tracing::info!(
        "✓ Analyzer ready: {} known vendors, concurrency {}, cache TTL {}s",
        analyzer.directory().entries().len(),
        config.max_concurrency,
        config.record_cache_ttl.as_secs()
    );

    let store = JsonFileStore::new(config.data_file.clone());
    tracing::info!("Record store: {}", store.path().display());

    // Build application state
    let app_state = Arc::new(AppState {
        config: config.clone(),
        analyzer: Arc::new(analyzer),
        store: Arc::new(store),
    });

    // Configure rate limiter: 2 requests/second per IP, burst of 5
    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(2)
            .burst_size(5)
            .key_extractor(SmartIpKeyExtractor)
            .finish()
            .ok_or_else(|| anyhow::anyhow!("Invalid rate limiter configuration"))?,
    );

    // Health check bypasses rate limiting
    let app = Router::new()
        .route("/health", get(handlers::health))
        .merge(api::routes().layer(ServiceBuilder::new().layer(GovernorLayer {
            config: governor_conf,
        })))
        .with_state(app_state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    // Start server
    let addr = format!("0.0.0.0:{}", config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Server listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
