use axum::{
    http::{Method, Uri},
    Router,
};
use std::sync::Arc;
use tower::Layer;
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::api::{self, ApiError};
use crate::config::Config;
use crate::db::Repository;
use crate::metrics::ApiMetrics;
use crate::service::{MovieCache, Services};

#[derive(Clone)]
pub struct AppState {
    pub cache: Arc<MovieCache>,
    pub metrics: Arc<ApiMetrics>,
    pub services: Services,
}

impl AppState {
    pub fn new(config: &Config, repo: Arc<dyn Repository>) -> Self {
        let cache = Arc::new(MovieCache::with_default_ttl(config.cache_ttl()));
        Self {
            services: Services::new(repo, cache.clone()),
            cache,
            metrics: Arc::new(ApiMetrics::new()),
        }
    }
}

/// The served application: paths are normalized before they reach the
/// router. Wrapping it in an empty `Router` keeps it a `Router` for both
/// `axum::serve` and `axum_server`.
pub fn build_app(state: AppState) -> Router {
    let normalized = axum::middleware::from_fn(crate::middleware::normalize_path).layer(build_router(state));
    Router::new().fallback_service(normalized)
}

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::system::routes())
        .merge(api::movies::routes())
        .merge(api::genres::routes())
        .merge(api::actors::routes())
        .merge(api::recommendations::routes())
        .fallback(fallback_handler)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            crate::middleware::record_metrics,
        ))
        .layer(axum::middleware::from_fn(crate::middleware::log_request))
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .layer(CompressionLayer::new())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn fallback_handler(method: Method, uri: Uri) -> ApiError {
    ApiError::NotFound(format!("No endpoint {} {}", method, uri.path()))
}
