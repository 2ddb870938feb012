//! Service banner, cache administration and request metrics.

use std::time::Duration;

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Value};

use crate::cache::CacheStats;
use crate::metrics::{HealthReport, MetricsSnapshot};
use crate::server::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/api/cache/stats", get(cache_stats))
        .route("/api/cache/clear", post(clear_cache))
        .route("/api/cache/info", get(cache_info))
        .route("/api/metrics/stats", get(metrics_stats))
        .route("/api/metrics/health", get(metrics_health))
        .route("/api/metrics/reset", get(reset_metrics))
}

async fn home() -> Json<Value> {
    Json(json!({
        "message": "Movies API is running successfully!",
        "status": "OK",
        "version": env!("CARGO_PKG_VERSION"),
        "endpoints": {
            "movies": "/api/movies",
            "actors": "/api/actors",
            "genres": "/api/genres",
            "recommendations": "/api/recommendations",
        },
    }))
}

async fn cache_stats(State(state): State<AppState>) -> Json<CacheStats> {
    Json(state.cache.stats())
}

async fn clear_cache(State(state): State<AppState>) -> Json<Value> {
    state.cache.clear();
    Json(json!({
        "success": true,
        "message": "Cache cleared successfully",
        "timestamp": chrono::Utc::now().timestamp_millis(),
    }))
}

fn describe_ttl(ttl: Duration) -> String {
    let secs = ttl.as_secs();
    if secs > 0 && secs % 60 == 0 {
        format!("{} minutes", secs / 60)
    } else {
        format!("{} seconds", secs)
    }
}

async fn cache_info(State(state): State<AppState>) -> Json<Value> {
    Json(json!({
        "service": "Simple In-Memory Cache",
        "defaultTTL": describe_ttl(state.cache.default_ttl()),
        "implementation": "DashMap",
        "threadSafe": true,
        "autoExpiry": true,
    }))
}

async fn metrics_stats(State(state): State<AppState>) -> Json<MetricsSnapshot> {
    Json(state.metrics.snapshot())
}

async fn metrics_health(State(state): State<AppState>) -> Json<HealthReport> {
    Json(state.metrics.health())
}

async fn reset_metrics(State(state): State<AppState>) -> Json<Value> {
    state.metrics.reset();
    Json(json!({
        "success": true,
        "message": "Metrics reset successfully",
    }))
}
