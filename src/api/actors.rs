use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use super::{ApiError, ApiJson, ApiPath, ApiResult, Page, PageRequest, QueryParams};
use crate::db::{Actor, ActorFilter, Movie, WithMovieCount};
use crate::server::AppState;
use crate::service::ActorRequest;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/actors", get(list_actors).post(create_actor))
        .route("/api/actors/bulk", post(actors_by_ids))
        .route("/api/actors/paged", get(list_actors_paged))
        .route("/api/actors/search", get(search_actors))
        .route("/api/actors/advanced-search", get(advanced_search))
        .route("/api/actors/by-birthdate", get(actors_by_birth_date))
        .route("/api/actors/stats/with-movie-count", get(actors_with_movie_count))
        .route("/api/actors/stats/top-by-movies", get(top_actors))
        .route("/api/actors/stats/no-movies", get(actors_without_movies))
        .route("/api/actors/stats/min-movies", get(actors_with_min_movies))
        .route(
            "/api/actors/:id",
            get(get_actor).patch(update_actor).delete(delete_actor),
        )
        .route("/api/actors/:id/movies", get(actor_movies))
        .route("/api/actors/:id/exists", get(actor_exists))
}

async fn list_actors(State(state): State<AppState>) -> ApiResult<Json<Vec<Actor>>> {
    Ok(Json(state.services.actors.list().await?))
}

async fn create_actor(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<ActorRequest>,
) -> ApiResult<(StatusCode, Json<Actor>)> {
    let actor = state.services.actors.create(req).await?;
    Ok((StatusCode::CREATED, Json(actor)))
}

async fn list_actors_paged(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Page<Actor>>> {
    let page = PageRequest::from_params(&params)?;
    let slice = state.services.actors.page(page.window()).await?;
    Ok(Json(Page::new(slice, page)))
}

async fn get_actor(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> ApiResult<Json<Actor>> {
    Ok(Json(state.services.actors.get(id).await?))
}

async fn actor_movies(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> ApiResult<Json<Vec<Movie>>> {
    Ok(Json(state.services.actors.movies_of(id).await?))
}

async fn search_actors(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Page<Actor>>> {
    let name = params.required_str("name")?;
    let page = PageRequest::from_params(&params)?;
    let slice = state.services.actors.search(name, page.window()).await?;
    Ok(Json(Page::new(slice, page)))
}

async fn advanced_search(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Page<Actor>>> {
    let filter = ActorFilter {
        name: params.get("name").filter(|n| !n.is_empty()).map(str::to_string),
        min_birth_date: params.date("minBirthDate")?,
        max_birth_date: params.date("maxBirthDate")?,
    };
    let page = PageRequest::from_params(&params)?;
    let slice = state.services.actors.advanced_search(&filter, page.window()).await?;
    Ok(Json(Page::new(slice, page)))
}

async fn actors_by_birth_date(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Vec<Actor>>> {
    let start = params
        .date("startDate")?
        .ok_or_else(|| ApiError::missing_param("startDate"))?;
    let end = params
        .date("endDate")?
        .ok_or_else(|| ApiError::missing_param("endDate"))?;
    Ok(Json(state.services.actors.by_birth_date_range(start, end).await?))
}

async fn actors_with_movie_count(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Page<WithMovieCount<Actor>>>> {
    let page = PageRequest::from_params(&params)?;
    let slice = state.services.actors.with_movie_count(page.window()).await?;
    Ok(Json(Page::new(slice, page)))
}

async fn top_actors(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Page<WithMovieCount<Actor>>>> {
    let page = PageRequest::from_params(&params)?;
    let slice = state.services.actors.top_by_movie_count(page.window()).await?;
    Ok(Json(Page::new(slice, page)))
}

async fn actors_without_movies(State(state): State<AppState>) -> ApiResult<Json<Vec<Actor>>> {
    Ok(Json(state.services.actors.without_movies().await?))
}

async fn actors_with_min_movies(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Vec<Actor>>> {
    let min_movies = params.required("minMovies", "int")?;
    Ok(Json(state.services.actors.with_min_movies(min_movies).await?))
}

async fn update_actor(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<ActorRequest>,
) -> ApiResult<Json<Actor>> {
    Ok(Json(state.services.actors.update(id, req).await?))
}

async fn delete_actor(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    Query(params): Query<QueryParams>,
) -> ApiResult<StatusCode> {
    let force = params.parse_or("force", "boolean", false)?;
    state.services.actors.delete(id, force).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn actors_by_ids(
    State(state): State<AppState>,
    ApiJson(ids): ApiJson<Vec<i64>>,
) -> ApiResult<Json<Vec<Actor>>> {
    Ok(Json(state.services.actors.get_many(&ids).await?))
}

async fn actor_exists(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> ApiResult<Json<bool>> {
    Ok(Json(state.services.actors.exists(id).await?))
}
