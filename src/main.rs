use std::sync::Arc;

use anyhow::Context;
use tower_http::cors::CorsLayer;

use anxiety_tarot_api::auth::jwt::JwtVerifier;
use anxiety_tarot_api::auth::rate_limit::RateLimitState;
use anxiety_tarot_api::config::Config;
use anxiety_tarot_api::db::{self, MemoryStore, PgStore, Store};
use anxiety_tarot_api::services::gemini::GeminiClient;
use anxiety_tarot_api::services::imagen::ImagenClient;
use anxiety_tarot_api::services::storage::{GcsStorage, InlineStorage, ObjectStorage};
use anxiety_tarot_api::{router, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "anxiety_tarot_api=debug,tower_http=debug".into()),
        )
        .json()
        .init();

    let config = Arc::new(Config::from_env());

    // Persistence
    let store: Arc<dyn Store> = match &config.database_url {
        Some(url) => {
            let pool = db::pool::connect(url)
                .await
                .context("Failed to connect to database")?;
            Arc::new(PgStore::new(pool))
        }
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory store");
            Arc::new(MemoryStore::new())
        }
    };

    // Object storage
    let storage: Arc<dyn ObjectStorage> = match &config.gcs_bucket {
        Some(bucket) => Arc::new(GcsStorage::new(&config, bucket.clone())?),
        None => {
            tracing::warn!("GCS_BUCKET not set, images are returned inline and not persisted");
            Arc::new(InlineStorage)
        }
    };

    if config.mock_generation {
        tracing::warn!("MOCK_GENERATION enabled, upstream AI calls are skipped");
    }

    let rate_limiter = RateLimitState::new();
    rate_limiter.spawn_cleanup_worker();

    let state = AppState {
        store,
        text_gen: Arc::new(GeminiClient::new(&config)?),
        image_gen: Arc::new(ImagenClient::new(&config)?),
        storage,
        verifier: Arc::new(JwtVerifier::new(&config.jwt_secret)),
        config: config.clone(),
        rate_limiter,
    };

    let allowed_origins: Vec<axum::http::HeaderValue> = {
        let mut origins = vec![config
            .frontend_url
            .parse::<axum::http::HeaderValue>()
            .context("FRONTEND_URL is not a valid origin")?];
        // Extra origins, e.g. testing from another device on the LAN
        if let Ok(extra) = std::env::var("CORS_EXTRA_ORIGINS") {
            for o in extra.split(',') {
                if let Ok(hv) = o.trim().parse::<axum::http::HeaderValue>() {
                    origins.push(hv);
                }
            }
        }
        origins
    };
    let cors = CorsLayer::new()
        .allow_origin(allowed_origins)
        .allow_methods([
            axum::http::Method::GET,
            axum::http::Method::POST,
            axum::http::Method::OPTIONS,
        ])
        .allow_headers([
            axum::http::header::AUTHORIZATION,
            axum::http::header::CONTENT_TYPE,
            axum::http::header::ACCEPT,
        ])
        .allow_credentials(true);

    let app = router(state).layer(cors);

    let addr = config.listen_addr();
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    // Connect info feeds the per-IP rate limiter
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<std::net::SocketAddr>(),
    )
    .await?;

    Ok(())
}
