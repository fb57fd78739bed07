use axum::{extract::DefaultBodyLimit, http::HeaderValue};
use secrecy::ExposeSecret;
use std::sync::Arc;
use tower_http::{
    cors::{AllowOrigin, Any, CorsLayer},
    trace::TraceLayer,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use donation_points::api::{
    self,
    state::{ApiSettings, AppState},
};
use donation_points::config::Config;
use donation_points::db::{self, PgStore};
use donation_points::services::image_store::ImageStore;
use donation_points::services::oauth::GoogleTokenVerifier;
use donation_points::services::session_token::SessionTokens;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "donation_points=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting donation points server...");

    // Load configuration
    let config = Config::from_env()?;
    tracing::info!("Configuration loaded successfully");

    if config.google_client_id.is_none() {
        tracing::warn!("GOOGLE_CLIENT_ID is not set, Google login will be rejected");
    }

    // Create database pool
    let pool = db::create_pool(&config.database_url).await?;
    tracing::info!("Database pool created");

    // Run migrations
    db::run_migrations(&pool).await?;
    tracing::info!("Database migrations completed");

    let store = Arc::new(PgStore::new(pool));

    let images = ImageStore::new(config.image_store());
    images.ensure_root().await?;
    tracing::info!(root = %config.upload_dir.display(), "Upload directory ready");

    let tokens = SessionTokens::new(
        config.jwt_secret.expose_secret().as_bytes(),
        chrono::Duration::minutes(config.token_expire_minutes),
    );
    let identity =
        GoogleTokenVerifier::new(config.google_client_id.clone(), config.tokeninfo_url()?);

    // Build application state
    let state = AppState {
        creators: store.clone(),
        points: store,
        images: Arc::new(images),
        tokens: Arc::new(tokens),
        identity: Arc::new(identity),
        settings: Arc::new(ApiSettings::from(&config)),
    };

    // Multipart bodies carry several images, each up to the per-file limit
    let body_limit = config.max_upload_bytes.saturating_mul(10);

    // Build router
    let app = api::router()
        .layer(cors_layer(&config.cors_allowed_origins)?)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", config.host, config.port);
    tracing::info!("Listening on {}", addr);

    // Start server
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// `*` allows any origin; otherwise only the listed ones
fn cors_layer(origins: &[String]) -> anyhow::Result<CorsLayer> {
    let layer = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if origins.is_empty() || origins.iter().any(|o| o == "*") {
        return Ok(layer.allow_origin(Any));
    }

    let origins = origins
        .iter()
        .map(|o| HeaderValue::from_str(o))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(layer.allow_origin(AllowOrigin::list(origins)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received, cleaning up...");
}
