use std::collections::HashSet;
use std::sync::Arc;

use serde::Deserialize;
use tracing::info;

use super::error::{FieldErrors, ServiceError, ServiceResult};
use super::movie::plural;
use super::{invalidate_movies, MovieCache};
use crate::db::{CountOrder, Genre, Movie, Relation, Repository, Slice, Window, WithMovieCount};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct GenreRequest {
    pub name: Option<String>,
}

impl GenreRequest {
    fn field_errors(&self, partial: bool) -> FieldErrors {
        let mut errors = FieldErrors::default();
        errors.text("name", self.name.as_deref(), !partial, 100, "Genre name");
        errors
    }
}

pub struct GenreService {
    repo: Arc<dyn Repository>,
    cache: Arc<MovieCache>,
}

impl GenreService {
    pub fn new(repo: Arc<dyn Repository>, cache: Arc<MovieCache>) -> Self {
        Self { repo, cache }
    }

    pub async fn create(&self, req: GenreRequest) -> ServiceResult<Genre> {
        req.field_errors(false).into_result()?;
        let name = req.name.unwrap_or_default();
        if self.repo.find_genre_by_name(&name).await?.is_some() {
            return Err(ServiceError::duplicate_genre(&name));
        }
        let mut genres = self.repo.insert_genres(&[name]).await?;
        let genre = genres
            .pop()
            .ok_or_else(|| ServiceError::invalid("Genre was not created"))?;
        info!("Created genre {} '{}'", genre.id, genre.name);
        Ok(genre)
    }

    /// Creates all genres or none. Names must be unique within the request
    /// and must not exist yet, both ignoring case.
    pub async fn create_bulk(&self, reqs: Vec<GenreRequest>) -> ServiceResult<Vec<Genre>> {
        let mut errors = FieldErrors::default();
        for (i, req) in reqs.iter().enumerate() {
            errors.merge_prefixed(&format!("[{}]", i), req.field_errors(false));
        }
        errors.into_result()?;

        let names: Vec<String> = reqs.into_iter().map(|r| r.name.unwrap_or_default()).collect();

        let distinct: HashSet<String> = names.iter().map(|n| n.to_lowercase()).collect();
        if distinct.len() != names.len() {
            return Err(ServiceError::invalid("Duplicate genre names in the request"));
        }

        let existing = self.repo.find_genres_by_names(&names).await?;
        if !existing.is_empty() {
            let existing: Vec<&str> = existing.iter().map(|g| g.name.as_str()).collect();
            return Err(ServiceError::invalid(format!(
                "Some genres already exist: [{}]",
                existing.join(", ")
            )));
        }

        let genres = self.repo.insert_genres(&names).await?;
        info!("Created {} genre(s)", genres.len());
        Ok(genres)
    }

    pub async fn list(&self) -> ServiceResult<Vec<Genre>> {
        Ok(self.repo.list_genres(None).await?.items)
    }

    pub async fn page(&self, window: Window) -> ServiceResult<Slice<Genre>> {
        Ok(self.repo.list_genres(Some(window)).await?)
    }

    pub async fn get(&self, id: i64) -> ServiceResult<Genre> {
        Ok(self.repo.get_genre(id).await?)
    }

    pub async fn by_name(&self, name: &str) -> ServiceResult<Option<Genre>> {
        Ok(self.repo.find_genre_by_name(name).await?)
    }

    pub async fn movies_of(&self, id: i64) -> ServiceResult<Vec<Movie>> {
        self.get(id).await?;
        Ok(self.repo.movies_by_genre(id, None).await?.items)
    }

    pub async fn search(&self, name: &str, window: Window) -> ServiceResult<Slice<Genre>> {
        Ok(self.repo.search_genres(name, window).await?)
    }

    pub async fn with_movie_count(&self, window: Window) -> ServiceResult<Slice<WithMovieCount<Genre>>> {
        Ok(self.repo.genres_with_movie_count(CountOrder::ByName, window).await?)
    }

    pub async fn top_by_movie_count(&self, window: Window) -> ServiceResult<Slice<WithMovieCount<Genre>>> {
        Ok(self.repo.genres_with_movie_count(CountOrder::ByCountDesc, window).await?)
    }

    pub async fn without_movies(&self) -> ServiceResult<Vec<Genre>> {
        Ok(self.repo.genres_without_movies().await?)
    }

    pub async fn with_min_movies(&self, min_movies: i64) -> ServiceResult<Vec<Genre>> {
        Ok(self.repo.genres_with_min_movies(min_movies).await?)
    }

    pub async fn update(&self, id: i64, req: GenreRequest) -> ServiceResult<Genre> {
        req.field_errors(true).into_result()?;
        let genre = self.get(id).await?;

        let Some(name) = req.name else {
            return Ok(genre);
        };
        let renamed = genre.name.to_lowercase() != name.to_lowercase();
        if renamed && self.repo.find_genre_by_name(&name).await?.is_some() {
            return Err(ServiceError::duplicate_genre(&name));
        }

        self.repo.rename_genre(id, &name).await?;
        let linked = self.repo.linked_movie_ids(Relation::Genres, id).await?;
        invalidate_movies(&self.cache, &linked);
        self.get(id).await
    }

    pub async fn delete(&self, id: i64, force: bool) -> ServiceResult<()> {
        let genre = self.get(id).await?;
        let linked = self.repo.linked_movie_ids(Relation::Genres, id).await?;

        if !force && !linked.is_empty() {
            return Err(ServiceError::has_relationships(format!(
                "Cannot delete genre '{}' because it has {} associated movie{}",
                genre.name,
                linked.len(),
                plural(linked.len())
            )));
        }

        self.repo.delete_genre(id).await?;
        invalidate_movies(&self.cache, &linked);
        info!("Deleted genre {} '{}'", id, genre.name);
        Ok(())
    }

    pub async fn exists(&self, id: i64) -> ServiceResult<bool> {
        Ok(self.repo.genre_exists(id).await?)
    }

    pub async fn exists_by_name(&self, name: &str) -> ServiceResult<bool> {
        Ok(self.by_name(name).await?.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::testutil::services;
    use crate::service::{movie_key, MovieRequest};

    fn genre(name: &str) -> GenreRequest {
        GenreRequest {
            name: Some(name.to_string()),
        }
    }

    async fn movie(services: &crate::service::Services, title: &str) -> Movie {
        services
            .movies
            .create(MovieRequest {
                title: Some(title.to_string()),
                release_year: Some(2000),
                duration: Some(100),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_names_are_unique_ignoring_case() {
        let (services, _) = services().await;
        services.genres.create(genre("Drama")).await.unwrap();

        let err = services.genres.create(genre("DRAMA")).await.unwrap_err();
        match err {
            ServiceError::InvalidRequest { code, message, .. } => {
                assert_eq!(code, Some("DUPLICATE_GENRE"));
                assert_eq!(message, "Genre with name 'DRAMA' already exists");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(services.genres.exists_by_name("drama").await.unwrap());
        assert_eq!(services.genres.by_name("dRaMa").await.unwrap().unwrap().name, "Drama");
    }

    #[tokio::test]
    async fn test_bulk_create() {
        let (services, _) = services().await;
        let err = services
            .genres
            .create_bulk(vec![genre("Action"), genre("action")])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Duplicate genre names in the request");

        let created = services
            .genres
            .create_bulk(vec![genre("Action"), genre("Comedy")])
            .await
            .unwrap();
        assert_eq!(created.len(), 2);

        let err = services
            .genres
            .create_bulk(vec![genre("Horror"), genre("comedy")])
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Some genres already exist: [Comedy]");
        assert_eq!(services.genres.list().await.unwrap().len(), 2);

        let err = services
            .genres
            .create_bulk(vec![genre("Horror"), GenreRequest { name: None }])
            .await
            .unwrap_err();
        match err {
            ServiceError::Validation(errors) => assert_eq!(errors["[1].name"], "Genre name is required"),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_delete_linked_genre_needs_force() {
        let (services, _) = services().await;
        let heat = movie(&services, "Heat").await;
        let drama = services.genres.create(genre("Drama")).await.unwrap();
        services.movies.add_genres(heat.id, &[drama.id]).await.unwrap();

        let err = services.genres.delete(drama.id, false).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Cannot delete genre 'Drama' because it has 1 associated movie"
        );

        services.genres.delete(drama.id, true).await.unwrap();
        assert!(!services.genres.exists(drama.id).await.unwrap());
        assert!(services.movies.get(heat.id).await.unwrap().genres.is_empty());
    }

    #[tokio::test]
    async fn test_rename_invalidates_linked_movies() {
        let (services, cache) = services().await;
        let heat = movie(&services, "Heat").await;
        let drama = services.genres.create(genre("Drama")).await.unwrap();
        services.genres.create(genre("Crime")).await.unwrap();
        services.movies.add_genres(heat.id, &[drama.id]).await.unwrap();

        services.movies.get_cached(heat.id).await.unwrap();
        assert!(cache.contains(&movie_key(heat.id)));

        let err = services.genres.update(drama.id, genre("crime")).await.unwrap_err();
        assert!(matches!(err, ServiceError::InvalidRequest { .. }));

        // Changing only the case of its own name is allowed.
        let renamed = services.genres.update(drama.id, genre("DRAMA")).await.unwrap();
        assert_eq!(renamed.name, "DRAMA");
        assert!(!cache.contains(&movie_key(heat.id)));
        assert_eq!(services.movies.get_cached(heat.id).await.unwrap().genres[0].name, "DRAMA");
    }

    #[tokio::test]
    async fn test_movie_count_statistics() {
        let (services, _) = services().await;
        let a = movie(&services, "A").await;
        let b = movie(&services, "B").await;
        let drama = services.genres.create(genre("Drama")).await.unwrap();
        let action = services.genres.create(genre("Action")).await.unwrap();
        let empty = services.genres.create(genre("Western")).await.unwrap();
        services.movies.add_genres(a.id, &[drama.id, action.id]).await.unwrap();
        services.movies.add_genres(b.id, &[drama.id]).await.unwrap();

        let window = Window { offset: 0, limit: 10 };
        let by_name = services.genres.with_movie_count(window).await.unwrap();
        let names: Vec<&str> = by_name.items.iter().map(|g| g.item.name.as_str()).collect();
        assert_eq!(names, vec!["Action", "Drama", "Western"]);

        let top = services.genres.top_by_movie_count(window).await.unwrap();
        assert_eq!(top.items[0].item, drama);
        assert_eq!(top.items[0].movie_count, 2);

        assert_eq!(services.genres.without_movies().await.unwrap(), vec![empty]);
        assert_eq!(services.genres.with_min_movies(2).await.unwrap(), vec![drama.clone()]);
        assert_eq!(services.genres.movies_of(drama.id).await.unwrap().len(), 2);
    }
}
