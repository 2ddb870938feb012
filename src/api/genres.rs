use axum::{
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};

use super::{ApiError, ApiJson, ApiPath, ApiResult, Page, PageRequest, QueryParams};
use crate::db::{Genre, Movie, WithMovieCount};
use crate::server::AppState;
use crate::service::GenreRequest;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/api/genres", get(list_genres).post(create_genre))
        .route("/api/genres/bulk", post(create_genres))
        .route("/api/genres/paged", get(list_genres_paged))
        .route("/api/genres/search", get(search_genres))
        .route("/api/genres/by-name/:name", get(genre_by_name))
        .route("/api/genres/stats/with-movie-count", get(genres_with_movie_count))
        .route("/api/genres/stats/top-by-movies", get(top_genres))
        .route("/api/genres/stats/no-movies", get(genres_without_movies))
        .route("/api/genres/stats/min-movies", get(genres_with_min_movies))
        .route(
            "/api/genres/:id",
            get(get_genre).patch(update_genre).delete(delete_genre),
        )
        .route("/api/genres/:id/movies", get(genre_movies))
        .route("/api/genres/:id/exists", get(genre_exists))
}

async fn list_genres(State(state): State<AppState>) -> ApiResult<Json<Vec<Genre>>> {
    Ok(Json(state.services.genres.list().await?))
}

async fn create_genre(
    State(state): State<AppState>,
    ApiJson(req): ApiJson<GenreRequest>,
) -> ApiResult<(StatusCode, Json<Genre>)> {
    let genre = state.services.genres.create(req).await?;
    Ok((StatusCode::CREATED, Json(genre)))
}

async fn create_genres(
    State(state): State<AppState>,
    ApiJson(reqs): ApiJson<Vec<GenreRequest>>,
) -> ApiResult<(StatusCode, Json<Vec<Genre>>)> {
    let genres = state.services.genres.create_bulk(reqs).await?;
    Ok((StatusCode::CREATED, Json(genres)))
}

async fn list_genres_paged(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Page<Genre>>> {
    let page = PageRequest::from_params(&params)?;
    let slice = state.services.genres.page(page.window()).await?;
    Ok(Json(Page::new(slice, page)))
}

async fn get_genre(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> ApiResult<Json<Genre>> {
    Ok(Json(state.services.genres.get(id).await?))
}

async fn genre_by_name(
    State(state): State<AppState>,
    ApiPath(name): ApiPath<String>,
) -> ApiResult<Json<Genre>> {
    state
        .services
        .genres
        .by_name(&name)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Genre not found with name: {}", name)))
}

async fn genre_movies(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> ApiResult<Json<Vec<Movie>>> {
    Ok(Json(state.services.genres.movies_of(id).await?))
}

async fn search_genres(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Page<Genre>>> {
    let name = params.required_str("name")?;
    let page = PageRequest::from_params(&params)?;
    let slice = state.services.genres.search(name, page.window()).await?;
    Ok(Json(Page::new(slice, page)))
}

async fn genres_with_movie_count(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Page<WithMovieCount<Genre>>>> {
    let page = PageRequest::from_params(&params)?;
    let slice = state.services.genres.with_movie_count(page.window()).await?;
    Ok(Json(Page::new(slice, page)))
}

async fn top_genres(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Page<WithMovieCount<Genre>>>> {
    let page = PageRequest::from_params(&params)?;
    let slice = state.services.genres.top_by_movie_count(page.window()).await?;
    Ok(Json(Page::new(slice, page)))
}

async fn genres_without_movies(State(state): State<AppState>) -> ApiResult<Json<Vec<Genre>>> {
    Ok(Json(state.services.genres.without_movies().await?))
}

async fn genres_with_min_movies(
    State(state): State<AppState>,
    Query(params): Query<QueryParams>,
) -> ApiResult<Json<Vec<Genre>>> {
    let min_movies = params.required("minMovies", "int")?;
    Ok(Json(state.services.genres.with_min_movies(min_movies).await?))
}

async fn update_genre(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    ApiJson(req): ApiJson<GenreRequest>,
) -> ApiResult<Json<Genre>> {
    Ok(Json(state.services.genres.update(id, req).await?))
}

async fn delete_genre(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<i64>,
    Query(params): Query<QueryParams>,
) -> ApiResult<StatusCode> {
    let force = params.parse_or("force", "boolean", false)?;
    state.services.genres.delete(id, force).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn genre_exists(State(state): State<AppState>, ApiPath(id): ApiPath<i64>) -> ApiResult<Json<bool>> {
    Ok(Json(state.services.genres.exists(id).await?))
}
