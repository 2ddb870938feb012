use std::sync::Arc;

use chrono::Datelike;
use serde::Deserialize;
use tracing::{debug, info};

use super::error::{FieldErrors, ServiceError, ServiceResult};
use super::{distinct_ids, invalidate_movies, movie_key, CacheValue, MovieCache, ALL_MOVIES_KEY};
use crate::db::{
    Actor, Genre, Movie, MovieFilter, NewMovie, Relation, Repository, Slice, Window, WithActorCount,
};

pub const MIN_RELEASE_YEAR: i32 = 1888;

/// Latest accepted release year: next calendar year.
pub fn max_release_year() -> i32 {
    chrono::Local::now().year() + 1
}

/// Body of movie create and update calls. On update every field is optional.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MovieRequest {
    pub title: Option<String>,
    pub release_year: Option<i32>,
    pub duration: Option<i32>,
}

impl MovieRequest {
    fn validate(&self, partial: bool) -> ServiceResult<()> {
        let mut errors = FieldErrors::default();
        errors.text("title", self.title.as_deref(), !partial, 255, "Movie title");
        match self.release_year {
            None if !partial => errors.add("releaseYear", "Release year is required"),
            Some(year) if year < MIN_RELEASE_YEAR => {
                errors.add("releaseYear", "Release year must be 1888 or later")
            }
            _ => {}
        }
        match self.duration {
            None if !partial => errors.add("duration", "Duration is required"),
            Some(d) if d < 1 => errors.add("duration", "Duration must be at least 1 minute"),
            Some(d) if d > 500 => errors.add("duration", "Duration must not exceed 500 minutes"),
            _ => {}
        }
        errors.into_result()
    }
}

fn check_release_year(year: i32) -> ServiceResult<()> {
    let max = max_release_year();
    if !(MIN_RELEASE_YEAR..=max).contains(&year) {
        return Err(ServiceError::invalid_release_year(year, max));
    }
    Ok(())
}

pub struct MovieService {
    repo: Arc<dyn Repository>,
    cache: Arc<MovieCache>,
}

impl MovieService {
    pub fn new(repo: Arc<dyn Repository>, cache: Arc<MovieCache>) -> Self {
        Self { repo, cache }
    }

    pub async fn create(&self, req: MovieRequest) -> ServiceResult<Movie> {
        let movie = self.checked_new_movie(req).await?;
        let id = self.repo.insert_movie(&movie).await?;
        invalidate_movies(&self.cache, &[]);
        info!("Created movie {} '{}'", id, movie.title);
        self.get(id).await
    }

    /// Creates a movie and links it in one go. Unknown genre or actor ids
    /// are rejected before anything is written.
    pub async fn create_with_relations(
        &self,
        req: MovieRequest,
        genre_ids: &[i64],
        actor_ids: &[i64],
    ) -> ServiceResult<Movie> {
        let movie = self.checked_new_movie(req).await?;
        let genre_ids = self.existing_genres(genre_ids).await?;
        let actor_ids = self.existing_actors(actor_ids).await?;

        let id = self
            .repo
            .insert_movie_with_links(&movie, &genre_ids, &actor_ids)
            .await?;
        invalidate_movies(&self.cache, &[id]);
        info!(
            "Created movie {} '{}' with {} genre(s) and {} actor(s)",
            id,
            movie.title,
            genre_ids.len(),
            actor_ids.len()
        );
        self.get(id).await
    }

    async fn checked_new_movie(&self, req: MovieRequest) -> ServiceResult<NewMovie> {
        req.validate(false)?;
        let movie = NewMovie {
            title: req.title.unwrap_or_default(),
            release_year: req.release_year.unwrap_or_default(),
            duration: req.duration.unwrap_or_default(),
        };
        if self
            .repo
            .movie_exists_by_title_and_year(&movie.title, movie.release_year)
            .await?
        {
            return Err(ServiceError::duplicate_movie(&movie.title, movie.release_year));
        }
        check_release_year(movie.release_year)?;
        Ok(movie)
    }

    pub async fn list(&self) -> ServiceResult<Vec<Movie>> {
        Ok(self.repo.list_movies().await?)
    }

    pub async fn list_cached(&self) -> ServiceResult<Arc<Vec<Movie>>> {
        if let Some(CacheValue::MovieList(movies)) = self.cache.get(ALL_MOVIES_KEY) {
            return Ok(movies);
        }
        debug!("Cache miss for {}", ALL_MOVIES_KEY);
        let movies = Arc::new(self.list().await?);
        self.cache.put(ALL_MOVIES_KEY, CacheValue::MovieList(movies.clone()));
        Ok(movies)
    }

    pub async fn page(&self, window: Window) -> ServiceResult<Slice<Movie>> {
        Ok(self.repo.search_movies(&MovieFilter::default(), window).await?)
    }

    pub async fn get(&self, id: i64) -> ServiceResult<Movie> {
        Ok(self.repo.get_movie(id).await?)
    }

    pub async fn get_cached(&self, id: i64) -> ServiceResult<Arc<Movie>> {
        let key = movie_key(id);
        if let Some(CacheValue::Movie(movie)) = self.cache.get(&key) {
            return Ok(movie);
        }
        debug!("Cache miss for {}", key);
        let movie = Arc::new(self.get(id).await?);
        self.cache.put(key, CacheValue::Movie(movie.clone()));
        Ok(movie)
    }

    pub async fn actors_of(&self, id: i64) -> ServiceResult<Vec<Actor>> {
        Ok(self.get(id).await?.actors)
    }

    pub async fn genres_of(&self, id: i64) -> ServiceResult<Vec<Genre>> {
        Ok(self.get(id).await?.genres)
    }

    pub async fn by_genre(&self, genre_id: i64, window: Window) -> ServiceResult<Slice<Movie>> {
        if !self.repo.genre_exists(genre_id).await? {
            return Err(ServiceError::not_found("Genre", genre_id));
        }
        Ok(self.repo.movies_by_genre(genre_id, Some(window)).await?)
    }

    pub async fn by_actor(&self, actor_id: i64, window: Window) -> ServiceResult<Slice<Movie>> {
        if !self.repo.actor_exists(actor_id).await? {
            return Err(ServiceError::not_found("Actor", actor_id));
        }
        Ok(self.repo.movies_by_actor(actor_id, Some(window)).await?)
    }

    pub async fn by_year(&self, year: i32, window: Window) -> ServiceResult<Slice<Movie>> {
        let filter = MovieFilter {
            release_year: Some(year),
            ..Default::default()
        };
        self.advanced_search(&filter, window).await
    }

    pub async fn search_title(&self, title: &str, window: Window) -> ServiceResult<Slice<Movie>> {
        let filter = MovieFilter {
            title: Some(title.to_string()),
            ..Default::default()
        };
        self.advanced_search(&filter, window).await
    }

    pub async fn advanced_search(&self, filter: &MovieFilter, window: Window) -> ServiceResult<Slice<Movie>> {
        Ok(self.repo.search_movies(filter, window).await?)
    }

    /// Applies the fields present in `req`.
    pub async fn update(&self, id: i64, req: MovieRequest) -> ServiceResult<Movie> {
        req.validate(true)?;
        let current = self.get(id).await?;

        let title_changed = req.title.as_ref().is_some_and(|t| *t != current.title);
        let year_changed = req.release_year.is_some_and(|y| y != current.release_year);

        let updated = NewMovie {
            title: req.title.unwrap_or(current.title),
            release_year: req.release_year.unwrap_or(current.release_year),
            duration: req.duration.unwrap_or(current.duration),
        };

        if (title_changed || year_changed)
            && self
                .repo
                .movie_exists_by_title_and_year(&updated.title, updated.release_year)
                .await?
        {
            return Err(ServiceError::duplicate_movie(&updated.title, updated.release_year));
        }
        if year_changed {
            check_release_year(updated.release_year)?;
        }

        self.repo.update_movie(id, &updated).await?;
        invalidate_movies(&self.cache, &[id]);
        self.get(id).await
    }

    pub async fn add_genres(&self, id: i64, genre_ids: &[i64]) -> ServiceResult<Movie> {
        self.ensure_exists(id).await?;
        let genre_ids = self.existing_genres(genre_ids).await?;
        self.repo.link(Relation::Genres, id, &genre_ids).await?;
        invalidate_movies(&self.cache, &[id]);
        self.get(id).await
    }

    /// Unknown genre ids are ignored.
    pub async fn remove_genres(&self, id: i64, genre_ids: &[i64]) -> ServiceResult<Movie> {
        self.ensure_exists(id).await?;
        self.repo.unlink(Relation::Genres, id, genre_ids).await?;
        invalidate_movies(&self.cache, &[id]);
        self.get(id).await
    }

    pub async fn add_actors(&self, id: i64, actor_ids: &[i64]) -> ServiceResult<Movie> {
        self.ensure_exists(id).await?;
        let actor_ids = self.existing_actors(actor_ids).await?;
        self.repo.link(Relation::Actors, id, &actor_ids).await?;
        invalidate_movies(&self.cache, &[id]);
        self.get(id).await
    }

    /// Unknown actor ids are ignored.
    pub async fn remove_actors(&self, id: i64, actor_ids: &[i64]) -> ServiceResult<Movie> {
        self.ensure_exists(id).await?;
        self.repo.unlink(Relation::Actors, id, actor_ids).await?;
        invalidate_movies(&self.cache, &[id]);
        self.get(id).await
    }

    /// Replaces whichever relationship lists are given. `None` leaves that
    /// relationship untouched, an empty list clears it.
    pub async fn replace_relations(
        &self,
        id: i64,
        genre_ids: Option<&[i64]>,
        actor_ids: Option<&[i64]>,
    ) -> ServiceResult<Movie> {
        self.ensure_exists(id).await?;
        let genre_ids = match genre_ids {
            Some(ids) => Some(self.existing_genres(ids).await?),
            None => None,
        };
        let actor_ids = match actor_ids {
            Some(ids) => Some(self.existing_actors(ids).await?),
            None => None,
        };

        if let Some(ids) = genre_ids {
            self.repo.replace_links(Relation::Genres, id, &ids).await?;
        }
        if let Some(ids) = actor_ids {
            self.repo.replace_links(Relation::Actors, id, &ids).await?;
        }
        invalidate_movies(&self.cache, &[id]);
        self.get(id).await
    }

    pub async fn delete(&self, id: i64, force: bool) -> ServiceResult<()> {
        let movie = self.get(id).await?;
        let genres = movie.genres.len();
        let actors = movie.actors.len();

        if !force && (genres > 0 || actors > 0) {
            return Err(ServiceError::has_relationships(format!(
                "Cannot delete movie '{}' because it has {} genre{} and {} actor{} associated. Use force=true to delete anyway.",
                movie.title,
                genres,
                plural(genres),
                actors,
                plural(actors)
            )));
        }

        self.repo.delete_movie(id).await?;
        invalidate_movies(&self.cache, &[id]);
        info!("Deleted movie {} '{}'", id, movie.title);
        Ok(())
    }

    pub async fn with_actor_count(&self, window: Window) -> ServiceResult<Slice<WithActorCount<Movie>>> {
        Ok(self.repo.movies_with_actor_count(window).await?)
    }

    pub async fn latest(&self, window: Window) -> ServiceResult<Slice<Movie>> {
        Ok(self.repo.latest_movies(window).await?)
    }

    pub async fn by_duration(&self, min: i32, max: i32) -> ServiceResult<Vec<Movie>> {
        Ok(self.repo.movies_by_duration(min, max).await?)
    }

    pub async fn without_genres(&self) -> ServiceResult<Vec<Movie>> {
        Ok(self.repo.movies_without(Relation::Genres).await?)
    }

    pub async fn without_actors(&self) -> ServiceResult<Vec<Movie>> {
        Ok(self.repo.movies_without(Relation::Actors).await?)
    }

    pub async fn exists(&self, id: i64) -> ServiceResult<bool> {
        Ok(self.repo.movie_exists(id).await?)
    }

    async fn ensure_exists(&self, id: i64) -> ServiceResult<()> {
        if !self.repo.movie_exists(id).await? {
            return Err(ServiceError::not_found("Movie", id));
        }
        Ok(())
    }

    async fn existing_genres(&self, ids: &[i64]) -> ServiceResult<Vec<i64>> {
        let ids = distinct_ids(ids);
        if self.repo.get_genres_by_ids(&ids).await?.len() != ids.len() {
            return Err(ServiceError::NotFound("Some genres not found".to_string()));
        }
        Ok(ids)
    }

    async fn existing_actors(&self, ids: &[i64]) -> ServiceResult<Vec<i64>> {
        let ids = distinct_ids(ids);
        if self.repo.get_actors_by_ids(&ids).await?.len() != ids.len() {
            return Err(ServiceError::NotFound("Some actors not found".to_string()));
        }
        Ok(ids)
    }
}

pub(crate) fn plural(n: usize) -> &'static str {
    if n > 1 {
        "s"
    } else {
        ""
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testutil::services;
    use crate::service::{ActorRequest, GenreRequest};
    use chrono::NaiveDate;

    fn request(title: &str, year: i32) -> MovieRequest {
        MovieRequest {
            title: Some(title.to_string()),
            release_year: Some(year),
            duration: Some(120),
        }
    }

    fn genre(name: &str) -> GenreRequest {
        GenreRequest {
            name: Some(name.to_string()),
        }
    }

    fn actor(name: &str) -> ActorRequest {
        ActorRequest {
            name: Some(name.to_string()),
            birth_date: NaiveDate::from_ymd_opt(1970, 1, 1),
        }
    }

    fn error_code(err: ServiceError) -> Option<&'static str> {
        match err {
            ServiceError::InvalidRequest { code, .. } => code,
            other => panic!("expected invalid request, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_create_validates_fields() {
        let (services, _) = services().await;
        let err = services
            .movies
            .create(MovieRequest {
                title: Some(" ".to_string()),
                release_year: Some(1700),
                duration: None,
            })
            .await
            .unwrap_err();
        match err {
            ServiceError::Validation(errors) => {
                assert_eq!(errors["title"], "Movie title is required");
                assert_eq!(errors["releaseYear"], "Release year must be 1888 or later");
                assert_eq!(errors["duration"], "Duration is required");
            }
            other => panic!("unexpected {:?}", other),
        }

        let err = services
            .movies
            .create(request("Future", max_release_year() + 1))
            .await
            .unwrap_err();
        assert_eq!(error_code(err), Some("INVALID_RELEASE_YEAR"));
    }

    #[tokio::test]
    async fn test_duplicate_title_and_year() {
        let (services, _) = services().await;
        services.movies.create(request("Heat", 1995)).await.unwrap();
        let err = services.movies.create(request("Heat", 1995)).await.unwrap_err();
        assert_eq!(error_code(err), Some("DUPLICATE_MOVIE"));

        // Same title, different year is fine.
        let other = services.movies.create(request("Heat", 1986)).await.unwrap();
        let err = services
            .movies
            .update(
                other.id,
                MovieRequest {
                    release_year: Some(1995),
                    ..Default::default()
                },
            )
            .await
            .unwrap_err();
        assert_eq!(error_code(err), Some("DUPLICATE_MOVIE"));
    }

    #[tokio::test]
    async fn test_patch_only_changes_given_fields() {
        let (services, _) = services().await;
        let movie = services.movies.create(request("Alien", 1979)).await.unwrap();
        let updated = services
            .movies
            .update(
                movie.id,
                MovieRequest {
                    duration: Some(117),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.title, "Alien");
        assert_eq!(updated.release_year, 1979);
        assert_eq!(updated.duration, 117);
    }

    #[tokio::test]
    async fn test_cached_reads_reflect_updates() {
        let (services, cache) = services().await;
        let movie = services.movies.create(request("Jaws", 1975)).await.unwrap();

        assert_eq!(services.movies.list_cached().await.unwrap().len(), 1);
        assert_eq!(services.movies.get_cached(movie.id).await.unwrap().title, "Jaws");
        assert!(cache.contains(ALL_MOVIES_KEY));
        assert!(cache.contains(&movie_key(movie.id)));

        services
            .movies
            .update(
                movie.id,
                MovieRequest {
                    title: Some("Jaws 2".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(services.movies.get_cached(movie.id).await.unwrap().title, "Jaws 2");
        assert_eq!(services.movies.list_cached().await.unwrap()[0].title, "Jaws 2");

        services.movies.create(request("Jaws 3", 1983)).await.unwrap();
        assert_eq!(services.movies.list_cached().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_relationship_edits() {
        let (services, cache) = services().await;
        let movie = services.movies.create(request("Heat", 1995)).await.unwrap();
        let drama = services.genres.create(genre("Drama")).await.unwrap();
        let crime = services.genres.create(genre("Crime")).await.unwrap();
        let pacino = services.actors.create(actor("Al Pacino")).await.unwrap();

        services.movies.get_cached(movie.id).await.unwrap();
        let updated = services
            .movies
            .add_genres(movie.id, &[drama.id, crime.id, drama.id])
            .await
            .unwrap();
        assert_eq!(updated.genres.len(), 2);
        assert!(!cache.contains(&movie_key(movie.id)));

        let err = services.movies.add_actors(movie.id, &[pacino.id, 999]).await.unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(ref m) if m == "Some actors not found"));

        let updated = services.movies.remove_genres(movie.id, &[crime.id, 999]).await.unwrap();
        assert_eq!(updated.genres, vec![drama.clone()]);

        let updated = services
            .movies
            .replace_relations(movie.id, Some(&[crime.id][..]), Some(&[pacino.id][..]))
            .await
            .unwrap();
        assert_eq!(updated.genres, vec![crime.clone()]);
        assert_eq!(updated.actors, vec![pacino.clone()]);

        // None leaves genres alone.
        let updated = services
            .movies
            .replace_relations(movie.id, None, Some(&[][..]))
            .await
            .unwrap();
        assert_eq!(updated.genres, vec![crime]);
        assert!(updated.actors.is_empty());
    }

    #[tokio::test]
    async fn test_create_with_relations_rejects_unknown_ids() {
        let (services, _) = services().await;
        let drama = services.genres.create(genre("Drama")).await.unwrap();

        let err = services
            .movies
            .create_with_relations(request("Heat", 1995), &[drama.id], &[42])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::NotFound(_)));
        assert!(services.movies.list().await.unwrap().is_empty());

        let movie = services
            .movies
            .create_with_relations(request("Heat", 1995), &[drama.id], &[])
            .await
            .unwrap();
        assert_eq!(movie.genres, vec![drama]);
    }

    #[tokio::test]
    async fn test_delete_requires_force_when_linked() {
        let (services, _) = services().await;
        let movie = services.movies.create(request("Heat", 1995)).await.unwrap();
        let drama = services.genres.create(genre("Drama")).await.unwrap();
        services.movies.add_genres(movie.id, &[drama.id]).await.unwrap();

        let err = services.movies.delete(movie.id, false).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot delete movie 'Heat' because it has 1 genre and 0 actor associated. Use force=true to delete anyway."
        );

        services.movies.delete(movie.id, true).await.unwrap();
        assert!(!services.movies.exists(movie.id).await.unwrap());
        assert!(services.genres.movies_of(drama.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_by_genre_requires_existing_genre() {
        let (services, _) = services().await;
        let err = services
            .movies
            .by_genre(7, Window { offset: 0, limit: 10 })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Genre not found with id: 7");
    }
}
