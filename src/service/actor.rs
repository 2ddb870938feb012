use std::sync::Arc;

use chrono::NaiveDate;
use serde::Deserialize;
use tracing::info;

use super::error::{FieldErrors, ServiceError, ServiceResult};
use super::movie::plural;
use super::{distinct_ids, invalidate_movies, MovieCache};
use crate::db::{
    Actor, ActorFilter, CountOrder, Movie, NewActor, Relation, Repository, Slice, Window, WithMovieCount,
    DATE_FORMAT,
};

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActorRequest {
    pub name: Option<String>,
    pub birth_date: Option<NaiveDate>,
}

impl ActorRequest {
    fn validate(&self, partial: bool) -> ServiceResult<()> {
        let mut errors = FieldErrors::default();
        errors.text("name", self.name.as_deref(), !partial, 255, "Actor name");
        if self.birth_date.is_none() && !partial {
            errors.add("birthDate", "Birth date is required");
        }
        errors.into_result()
    }
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

pub struct ActorService {
    repo: Arc<dyn Repository>,
    cache: Arc<MovieCache>,
}

impl ActorService {
    pub fn new(repo: Arc<dyn Repository>, cache: Arc<MovieCache>) -> Self {
        Self { repo, cache }
    }

    pub async fn create(&self, req: ActorRequest) -> ServiceResult<Actor> {
        req.validate(false)?;
        let actor = NewActor {
            name: req.name.unwrap_or_default(),
            birth_date: req.birth_date.unwrap_or_default(),
        };
        if actor.birth_date > today() {
            return Err(ServiceError::future_birth_date());
        }
        if self
            .repo
            .actor_exists_by_name_and_birth_date(&actor.name, actor.birth_date)
            .await?
        {
            return Err(ServiceError::duplicate_actor(
                &actor.name,
                &actor.birth_date.format(DATE_FORMAT).to_string(),
            ));
        }

        let actor = self.repo.insert_actor(&actor).await?;
        info!("Created actor {} '{}'", actor.id, actor.name);
        Ok(actor)
    }

    pub async fn list(&self) -> ServiceResult<Vec<Actor>> {
        Ok(self.repo.list_actors(None).await?.items)
    }

    pub async fn page(&self, window: Window) -> ServiceResult<Slice<Actor>> {
        Ok(self.repo.list_actors(Some(window)).await?)
    }

    pub async fn get(&self, id: i64) -> ServiceResult<Actor> {
        Ok(self.repo.get_actor(id).await?)
    }

    pub async fn movies_of(&self, id: i64) -> ServiceResult<Vec<Movie>> {
        self.get(id).await?;
        Ok(self.repo.movies_by_actor(id, None).await?.items)
    }

    pub async fn search(&self, name: &str, window: Window) -> ServiceResult<Slice<Actor>> {
        let filter = ActorFilter {
            name: Some(name.to_string()),
            ..Default::default()
        };
        self.advanced_search(&filter, window).await
    }

    pub async fn advanced_search(&self, filter: &ActorFilter, window: Window) -> ServiceResult<Slice<Actor>> {
        Ok(self.repo.search_actors(filter, window).await?)
    }

    /// Actors born in `start..=end`, oldest first.
    pub async fn by_birth_date_range(&self, start: NaiveDate, end: NaiveDate) -> ServiceResult<Vec<Actor>> {
        Ok(self.repo.actors_by_birth_date(start, end).await?)
    }

    pub async fn with_movie_count(&self, window: Window) -> ServiceResult<Slice<WithMovieCount<Actor>>> {
        Ok(self.repo.actors_with_movie_count(CountOrder::ByName, window).await?)
    }

    pub async fn top_by_movie_count(&self, window: Window) -> ServiceResult<Slice<WithMovieCount<Actor>>> {
        Ok(self.repo.actors_with_movie_count(CountOrder::ByCountDesc, window).await?)
    }

    pub async fn without_movies(&self) -> ServiceResult<Vec<Actor>> {
        Ok(self.repo.actors_without_movies().await?)
    }

    pub async fn with_min_movies(&self, min_movies: i64) -> ServiceResult<Vec<Actor>> {
        Ok(self.repo.actors_with_min_movies(min_movies).await?)
    }

    pub async fn update(&self, id: i64, req: ActorRequest) -> ServiceResult<Actor> {
        req.validate(true)?;
        let current = self.get(id).await?;

        if req.birth_date.is_some_and(|d| d > today()) {
            return Err(ServiceError::future_birth_date());
        }

        let changed = req.name.as_ref().is_some_and(|n| *n != current.name)
            || req.birth_date.is_some_and(|d| d != current.birth_date);

        let updated = NewActor {
            name: req.name.unwrap_or(current.name),
            birth_date: req.birth_date.unwrap_or(current.birth_date),
        };

        if changed
            && self
                .repo
                .actor_exists_by_name_and_birth_date(&updated.name, updated.birth_date)
                .await?
        {
            return Err(ServiceError::duplicate_actor(
                &updated.name,
                &updated.birth_date.format(DATE_FORMAT).to_string(),
            ));
        }

        self.repo.update_actor(id, &updated).await?;
        if changed {
            let linked = self.repo.linked_movie_ids(Relation::Actors, id).await?;
            invalidate_movies(&self.cache, &linked);
        }
        self.get(id).await
    }

    pub async fn delete(&self, id: i64, force: bool) -> ServiceResult<()> {
        let actor = self.get(id).await?;
        let linked = self.repo.linked_movie_ids(Relation::Actors, id).await?;

        if !force && !linked.is_empty() {
            return Err(ServiceError::has_relationships(format!(
                "Cannot delete actor '{}' because they are associated with {} movie{}",
                actor.name,
                linked.len(),
                plural(linked.len())
            )));
        }

        self.repo.delete_actor(id).await?;
        invalidate_movies(&self.cache, &linked);
        info!("Deleted actor {} '{}'", id, actor.name);
        Ok(())
    }

    /// All requested actors, or NotFound naming the ids that do not exist.
    pub async fn get_many(&self, ids: &[i64]) -> ServiceResult<Vec<Actor>> {
        let wanted = distinct_ids(ids);
        let actors = self.repo.get_actors_by_ids(&wanted).await?;
        if actors.len() != wanted.len() {
            let missing: Vec<String> = wanted
                .iter()
                .filter(|id| !actors.iter().any(|a| a.id == **id))
                .map(|id| id.to_string())
                .collect();
            return Err(ServiceError::NotFound(format!(
                "Actors not found with ids: [{}]",
                missing.join(", ")
            )));
        }
        Ok(actors)
    }

    pub async fn exists(&self, id: i64) -> ServiceResult<bool> {
        Ok(self.repo.actor_exists(id).await?)
    }

    pub async fn by_movie(&self, movie_id: i64) -> ServiceResult<Vec<Actor>> {
        Ok(self.repo.actors_by_movie(movie_id).await?)
    }
}
