use axum::extract::Extension;
use axum::handler::Handler;
use axum::http::HeaderValue;
use axum::routing::{get, post};
use axum::Router;
use log::{info, warn};
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::error::AppError;
use crate::handlers::{auth, health};
use crate::rate_limit::RateLimitLayer;
use crate::secrets::SecretGenerator;
use crate::store::UserStore;
use crate::token::TokenService;

/// Shared components handed to the handlers as extensions.
#[derive(Clone)]
pub struct Components {
    pub tokens: Arc<TokenService>,
    pub secrets: Arc<SecretGenerator>,
    pub users: Arc<dyn UserStore>,
}

pub fn build_router(components: Components, config: &Config) -> Router {
    Router::new()
        .route("/version", get(health::get_version))
        .route("/v1/health", get(health::health))
        .route("/v1/auth/register", post(auth::register))
        .route("/v1/auth/login", post(auth::login))
        .route("/v1/auth/refresh", post(auth::refresh))
        .route("/v1/auth/me", get(auth::me))
        .route("/v1/auth/password/reset", post(auth::reset_password))
        // Unmatched paths also go through the layers below, rate limiter included.
        .fallback(not_found.into_service())
        .layer(Extension(components.tokens))
        .layer(Extension(components.secrets))
        .layer(Extension(components.users))
        .layer(RateLimitLayer::new(&config.rate_limiter))
        .layer(cors_layer(&config.cors_allowed_origins))
        .layer(TraceLayer::new_for_http())
}

async fn not_found() -> AppError {
    AppError::NotFound("Not found".to_string())
}

/// `*` allows any origin, otherwise a comma-separated allow list.
fn cors_layer(allowed_origins: &str) -> CorsLayer {
    let cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if allowed_origins.trim() == "*" {
        return cors.allow_origin(Any);
    }

    let origins: Vec<HeaderValue> = allowed_origins
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!("router: ignoring invalid CORS origin {:?}", origin);
                None
            }
        })
        .collect();
    info!("router: CORS restricted to {} origin(s)", origins.len());
    cors.allow_origin(AllowOrigin::list(origins))
}
