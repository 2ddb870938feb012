use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, patch, post},
    Json, Router,
};

use super::{ApiJson, ApiPath, ApiResult, Page, PageRequest, QueryParams};
use crate::db::{Actor, Genre, Movie, MovieFilter, WithActorCount};
use crate::server::AppState;
use crate::service::MovieRequest;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/movies", get(list_movies).post(create_movie))
        .route("/api/movies/with-relationships", post(create_movie_with_relationships))
        .route("/api/movies/paged", get(list_movies_paged))
        .route("/api/movies/search", get(search_movies))
        .route("/api/movies/advanced-search", get(advanced_search))
        .route("/api/movies/by-genre/:id", get(movies_by_genre))
        .route("/api/movies/by-actor/:id", get(movies_by_actor))
        .route("/api/movies/by-year/:year", get(movies_by_year))
        .route("/api/movies/stats/with-actor-count", get(movies_with_actor_count))
        .route("/api/movies/stats/latest", get(latest_movies))
        .route("/api/movies/stats/by-duration", get(movies_by_duration))
        .route("/api/movies/stats/no-genres", get(movies_without_genres))
        .route("/api/movies/stats/no-actors", get(movies_without_actors))
        .route(
            "/api/movies/:id",
            get(get_movie).patch(update_movie).delete(delete_movie),
        )
        .route("/api/movies/:id/exists", get(movie_exists))
        .route("/api/movies/:id/relationships", patch(update_relationships))
        .route(
            "/api/movies/:id/genres",
            get(movie_genres).post(add_genres).delete(remove_genres),
        )
        .route(
            "/api/movies/:id/actors",
            get(movie_actors).post(add_actors).delete(remove_actors),
        )
}

async fn list_movies(State(state): State<AppState>) -> ApiResult<Response> {
    let movies = state.services.movies.list_cached().await?;
    Ok(Json(movies.as_slice()).into_response())
}

async fn create_movie(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<MovieRequest>,
) -> ApiResult<(StatusCode, Json<Movie>)> {
    let movie = state.services.movies.create(req).await?;
    Ok((StatusCode::CREATED, Json(movie)))
}

async fn create_movie_with_relationships(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
    ApiJson(req): ApiJson<MovieRequest>,
) -> ApiResult<(StatusCode, Json<Movie>)> {
    let genre_ids = params.ids("genreIds")?.unwrap_or_default();
    let actor_ids = params.ids("actorIds")?.unwrap_or_default();
    let movie = state
        .services
        .movies
        .create_with_relations(req, &genre_ids, &actor_ids)
        .await?;
    Ok((StatusCode::CREATED, Json(movie)))
}

async fn list_movies_paged(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Page<Movie>>> {
    let page = PageRequest::from_params(&params)?;
    let slice = state.services.movies.page(page.window()).await?;
    Ok(Json(Page::new(slice, page)))
}

async fn get_movie(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> ApiResult<Response> {
    let movie = state.services.movies.get_cached(id).await?;
    Ok(Json(movie.as_ref()).into_response())
}

async fn movie_actors(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> ApiResult<Json<Vec<Actor>>> {
    Ok(Json(state.services.movies.actors_of(id).await?))
}

async fn movie_genres(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> ApiResult<Json<Vec<Genre>>> {
    Ok(Json(state.services.movies.genres_of(id).await?))
}

async fn movies_by_genre(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Page<Movie>>> {
    let page = PageRequest::from_params(&params)?;
    let slice = state.services.movies.by_genre(id, page.window()).await?;
    Ok(Json(Page::new(slice, page)))
}

async fn movies_by_actor(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Page<Movie>>> {
    let page = PageRequest::from_params(&params)?;
    let slice = state.services.movies.by_actor(id, page.window()).await?;
    Ok(Json(Page::new(slice, page)))
}

async fn movies_by_year(
    State(state): State<AppState>,
    ApiPath(year): ApiPath<i32>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Page<Movie>>> {
    let page = PageRequest::from_params(&params)?;
    let slice = state.services.movies.by_year(year, page.window()).await?;
    Ok(Json(Page::new(slice, page)))
}

async fn search_movies(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Page<Movie>>> {
    let title = params.required_str("title")?;
    let page = PageRequest::from_params(&params)?;
    let slice = state.services.movies.search_title(title, page.window()).await?;
    Ok(Json(Page::new(slice, page)))
}

async fn advanced_search(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Page<Movie>>> {
    let filter = MovieFilter {
        title: params.get("title").filter(|t| !t.is_empty()).map(str::to_string),
        release_year: None,
        min_year: params.parse("minYear", "Integer")?,
        max_year: params.parse("maxYear", "Integer")?,
        min_duration: params.parse("minDuration", "Integer")?,
        max_duration: params.parse("maxDuration", "Integer")?,
    };
    let page = PageRequest::from_params(&params)?;
    let slice = state.services.movies.advanced_search(&filter, page.window()).await?;
    Ok(Json(Page::new(slice, page)))
}

async fn update_movie(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<MovieRequest>,
) -> ApiResult<Json<Movie>> {
    Ok(Json(state.services.movies.update(id, req).await?))
}

async fn update_relationships(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Movie>> {
    let genre_ids = params.ids("genreIds")?;
    let actor_ids = params.ids("actorIds")?;
    let movie = state
        .services
        .movies
        .replace_relations(id, genre_ids.as_deref(), actor_ids.as_deref())
        .await?;
    Ok(Json(movie))
}

async fn add_genres(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(ids): ApiJson<Vec<i64>>,
) -> ApiResult<Json<Movie>> {
    Ok(Json(state.services.movies.add_genres(id, &ids).await?))
}

async fn remove_genres(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(ids): ApiJson<Vec<i64>>,
) -> ApiResult<Json<Movie>> {
    Ok(Json(state.services.movies.remove_genres(id, &ids).await?))
}

async fn add_actors(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(ids): ApiJson<Vec<i64>>,
) -> ApiResult<Json<Movie>> {
    Ok(Json(state.services.movies.add_actors(id, &ids).await?))
}

async fn remove_actors(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(ids): ApiJson<Vec<i64>>,
) -> ApiResult<Json<Movie>> {
    Ok(Json(state.services.movies.remove_actors(id, &ids).await?))
}

async fn delete_movie(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    Query(params): Query<QueryParams>,
) -> ApiResult<StatusCode> {
    let force = params.parse_or("force", "boolean", false)?;
    state.services.movies.delete(id, force).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn movies_with_actor_count(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Page<WithActorCount<Movie>>>> {
    let page = PageRequest::from_params(&params)?;
    let slice = state.services.movies.with_actor_count(page.window()).await?;
    Ok(Json(Page::new(slice, page)))
}

async fn latest_movies(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Page<Movie>>> {
    let page = PageRequest::from_params(&params)?;
    let slice = state.services.movies.latest(page.window()).await?;
    Ok(Json(Page::new(slice, page)))
}

async fn movies_by_duration(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Vec<Movie>>> {
    let min = params.required("minDuration", "Integer")?;
    let max = params.required("maxDuration", "Integer")?;
    Ok(Json(state.services.movies.by_duration(min, max).await?))
}

async fn movies_without_genres(State(state): State<AppState>) -> ApiResult<Json<Vec<Movie>>> {
    Ok(Json(state.services.movies.without_genres().await?))
}

async fn movies_without_actors(State(state): State<AppState>) -> ApiResult<Json<Vec<Movie>>> {
    Ok(Json(state.services.movies.without_actors().await?))
}

async fn movie_exists(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> ApiResult<Json<bool>> {
    Ok(Json(state.services.movies.exists(id).await?))
}
