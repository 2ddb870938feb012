use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};

use super::{ApiPath, ApiResult, QueryParams};
use crate::recommend::{DEFAULT_LIMIT, DEFAULT_STYLE_LIMIT};
use crate::server::AppState;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/recommendations/by-movie/:id", get(by_movie))
        .route("/api/recommendations/trending", get(trending))
        .route("/api/recommendations/by-mood/:mood", get(by_mood))
        .route("/api/recommendations/similar-style/:id", get(similar_style))
        .route("/api/recommendations/moods", get(moods))
}

fn limit(params: &QueryParams, default: usize) -> ApiResult<usize> {
    params.parse_or("limit", "int", default)
}

async fn by_movie(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Value>> {
    let limit = limit(&params, DEFAULT_LIMIT)?;
    let movies = state.services.recommendations.by_movie(id, limit).await?;
    Ok(Json(json!({
        "success": true,
        "movieId": id,
        "limit": limit,
        "count": movies.len(),
        "recommendations": movies,
    })))
}

async fn trending(State(state): State<AppState>, Query(params): Query<QueryParams>) -> ApiResult<Json<Value>> {
    let limit = limit(&params, DEFAULT_LIMIT)?;
    let movies = state.services.recommendations.trending(limit).await?;
    Ok(Json(json!({
        "success": true,
        "type": "trending",
        "limit": limit,
        "count": movies.len(),
        "movies": movies,
    })))
}

async fn by_mood(
    State(state): State<AppState>,
    ApiPath(mood): ApiPath<String>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Value>> {
    let limit = limit(&params, DEFAULT_LIMIT)?;
    let movies = state.services.recommendations.by_mood(&mood, limit).await?;
    Ok(Json(json!({
        "success": true,
        "mood": mood,
        "limit": limit,
        "count": movies.len(),
        "movies": movies,
    })))
}

async fn similar_style(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Value>> {
    let limit = limit(&params, DEFAULT_STYLE_LIMIT)?;
    let movies = state.services.recommendations.similar_style(id, limit).await?;
    Ok(Json(json!({
        "success": true,
        "movieId": id,
        "limit": limit,
        "count": movies.len(),
        "similarMovies": movies,
    })))
}

async fn moods(State(state): State<AppState>) -> Json<Value> {
    let moods = state.services.recommendations.available_moods();
    Json(json!({
        "success": true,
        "count": moods.len(),
        "availableMoods": moods,
    }))
}
