use async_trait::async_trait;
use chrono::NaiveDate;

use super::model::*;

#[async_trait]
pub trait MovieRepo: Send + Sync {
    async fn list_movies(&self) -> DbResult<Vec<Movie>>;
    async fn get_movie(&self, id: i64) -> DbResult<Movie>;
    async fn movie_exists(&self, id: i64) -> DbResult<bool>;
    async fn movie_exists_by_title_and_year(&self, title: &str, release_year: i32) -> DbResult<bool>;
    async fn find_movies_by_titles(&self, titles: &[&str]) -> DbResult<Vec<Movie>>;
    async fn search_movies(&self, filter: &MovieFilter, window: Window) -> DbResult<Slice<Movie>>;
    async fn movies_by_genre(&self, genre_id: i64, window: Option<Window>) -> DbResult<Slice<Movie>>;
    async fn movies_by_actor(&self, actor_id: i64, window: Option<Window>) -> DbResult<Slice<Movie>>;
    async fn latest_movies(&self, window: Window) -> DbResult<Slice<Movie>>;
    async fn movies_by_duration(&self, min: i32, max: i32) -> DbResult<Vec<Movie>>;
    async fn movies_without(&self, relation: Relation) -> DbResult<Vec<Movie>>;
    async fn movies_with_actor_count(&self, window: Window) -> DbResult<Slice<WithActorCount<Movie>>>;
    async fn insert_movie(&self, movie: &NewMovie) -> DbResult<i64>;
    /// Inserts the movie and its links in one transaction.
    async fn insert_movie_with_links(&self, movie: &NewMovie, genre_ids: &[i64], actor_ids: &[i64]) -> DbResult<i64>;
    async fn update_movie(&self, id: i64, movie: &NewMovie) -> DbResult<()>;
    /// Detaches every relationship of the movie and deletes it.
    async fn delete_movie(&self, id: i64) -> DbResult<()>;
}

#[async_trait]
pub trait GenreRepo: Send + Sync {
    async fn list_genres(&self, window: Option<Window>) -> DbResult<Slice<Genre>>;
    async fn get_genre(&self, id: i64) -> DbResult<Genre>;
    async fn get_genres_by_ids(&self, ids: &[i64]) -> DbResult<Vec<Genre>>;
    async fn find_genre_by_name(&self, name: &str) -> DbResult<Option<Genre>>;
    async fn find_genres_by_names(&self, names: &[String]) -> DbResult<Vec<Genre>>;
    async fn genre_exists(&self, id: i64) -> DbResult<bool>;
    async fn search_genres(&self, name: &str, window: Window) -> DbResult<Slice<Genre>>;
    async fn genres_with_movie_count(&self, order: CountOrder, window: Window) -> DbResult<Slice<WithMovieCount<Genre>>>;
    async fn genres_with_min_movies(&self, min_movies: i64) -> DbResult<Vec<Genre>>;
    async fn genres_without_movies(&self) -> DbResult<Vec<Genre>>;
    async fn insert_genres(&self, names: &[String]) -> DbResult<Vec<Genre>>;
    async fn rename_genre(&self, id: i64, name: &str) -> DbResult<()>;
    async fn delete_genre(&self, id: i64) -> DbResult<()>;
}

#[async_trait]
pub trait ActorRepo: Send + Sync {
    async fn list_actors(&self, window: Option<Window>) -> DbResult<Slice<Actor>>;
    async fn get_actor(&self, id: i64) -> DbResult<Actor>;
    async fn get_actors_by_ids(&self, ids: &[i64]) -> DbResult<Vec<Actor>>;
    async fn actor_exists(&self, id: i64) -> DbResult<bool>;
    async fn actor_exists_by_name_and_birth_date(&self, name: &str, birth_date: NaiveDate) -> DbResult<bool>;
    async fn search_actors(&self, filter: &ActorFilter, window: Window) -> DbResult<Slice<Actor>>;
    async fn actors_by_birth_date(&self, start: NaiveDate, end: NaiveDate) -> DbResult<Vec<Actor>>;
    async fn actors_by_movie(&self, movie_id: i64) -> DbResult<Vec<Actor>>;
    async fn actors_with_movie_count(&self, order: CountOrder, window: Window) -> DbResult<Slice<WithMovieCount<Actor>>>;
    async fn actors_with_min_movies(&self, min_movies: i64) -> DbResult<Vec<Actor>>;
    async fn actors_without_movies(&self) -> DbResult<Vec<Actor>>;
    async fn insert_actor(&self, actor: &NewActor) -> DbResult<Actor>;
    async fn update_actor(&self, id: i64, actor: &NewActor) -> DbResult<()>;
    async fn delete_actor(&self, id: i64) -> DbResult<()>;
}

/// Edits of the movie side of a relationship. Both sides read the same join
/// table, so one edit is visible from the movie, the genre and the actor.
#[async_trait]
pub trait LinkRepo: Send + Sync {
    async fn link(&self, relation: Relation, movie_id: i64, ids: &[i64]) -> DbResult<()>;
    async fn unlink(&self, relation: Relation, movie_id: i64, ids: &[i64]) -> DbResult<()>;
    async fn replace_links(&self, relation: Relation, movie_id: i64, ids: &[i64]) -> DbResult<()>;
    /// Movie ids linked to the given genre or actor.
    async fn linked_movie_ids(&self, relation: Relation, other_id: i64) -> DbResult<Vec<i64>>;
}

pub trait Repository: MovieRepo + GenreRepo + ActorRepo + LinkRepo + Send + Sync {}
