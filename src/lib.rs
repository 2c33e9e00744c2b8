use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::compression::CompressionLayer;
use tower_http::trace::TraceLayer;

pub mod auth;
pub mod client;
pub mod config;
pub mod db;
pub mod dto;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod models;
pub mod services;

#[cfg(test)]
pub(crate) mod test_support;

use auth::jwt::TokenVerifier;
use auth::rate_limit::RateLimitState;
use config::Config;
use db::Store;
use services::gemini::TextGenerator;
use services::imagen::ImageGenerator;
use services::storage::ObjectStorage;

/// Everything a handler needs, constructed once at startup.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn Store>,
    pub text_gen: Arc<dyn TextGenerator>,
    pub image_gen: Arc<dyn ImageGenerator>,
    pub storage: Arc<dyn ObjectStorage>,
    pub verifier: Arc<dyn TokenVerifier>,
    pub config: Arc<Config>,
    pub rate_limiter: RateLimitState,
}

/// All routes with their middleware; CORS is added by the binary.
pub fn router(state: AppState) -> Router {
    // Endpoints that call the paid AI backends
    let generation_routes = Router::new()
        .route("/api/generate", post(handlers::generate::generate))
        .route("/api/images", post(handlers::images::generate_image))
        .route("/api/task-image", post(handlers::tasks::task_image))
        .route("/api/self-image", post(handlers::self_image::create_self_image))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::rate_limit::rate_limit_generation,
        ));

    let api_routes = Router::new()
        .route("/api/select-image", post(handlers::cards::select_image))
        .route("/api/register", post(handlers::cards::register))
        .route("/api/checklist", post(handlers::cards::checklist))
        .route("/api/complete", post(handlers::cards::complete))
        // Calendar
        .route("/api/calendar", get(handlers::calendar::get_calendar))
        .route("/api/calendar-task", post(handlers::tasks::create_task))
        .route("/api/task-update", post(handlers::tasks::update_task))
        .route("/api/task-delete", post(handlers::tasks::delete_task))
        // Reads
        .route("/api/history", get(handlers::history::get_history))
        .route("/api/self-image", get(handlers::self_image::get_self_image))
        .merge(generation_routes)
        .layer(middleware::from_fn_with_state(
            state.clone(),
            auth::middleware::resolve_requester,
        ));

    let public_routes = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route("/readyz", get(handlers::health::readyz));

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
