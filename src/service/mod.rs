pub mod actor;
pub mod error;
pub mod genre;
pub mod movie;
pub mod recommendation;

use std::sync::Arc;

use crate::cache::TtlCache;
use crate::db::{Movie, Repository};

pub use actor::{ActorRequest, ActorService};
pub use error::{ServiceError, ServiceResult};
pub use genre::{GenreRequest, GenreService};
pub use movie::{MovieRequest, MovieService};
pub use recommendation::RecommendationService;

pub const ALL_MOVIES_KEY: &str = "all_movies_cached";

pub fn movie_key(id: i64) -> String {
    format!("movie_{}", id)
}

/// Values memoized by the movie read paths.
#[derive(Debug, Clone)]
pub enum CacheValue {
    MovieList(Arc<Vec<Movie>>),
    Movie(Arc<Movie>),
}

pub type MovieCache = TtlCache<CacheValue>;

/// Drops the list entry and the entries of every given movie.
pub(crate) fn invalidate_movies(cache: &MovieCache, ids: &[i64]) {
    cache.remove(ALL_MOVIES_KEY);
    for id in ids {
        cache.remove(&movie_key(*id));
    }
}

/// Sorted, duplicate-free copy of a list of ids.
pub(crate) fn distinct_ids(ids: &[i64]) -> Vec<i64> {
    let mut ids = ids.to_vec();
    ids.sort_unstable();
    ids.dedup();
    ids
}

#[derive(Clone)]
pub struct Services {
    pub movies: Arc<MovieService>,
    pub genres: Arc<GenreService>,
    pub actors: Arc<ActorService>,
    pub recommendations: Arc<RecommendationService>,
}

impl Services {
    pub fn new(repo: Arc<dyn Repository>, cache: Arc<MovieCache>) -> Self {
        Self {
            movies: Arc::new(MovieService::new(repo.clone(), cache.clone())),
            genres: Arc::new(GenreService::new(repo.clone(), cache.clone())),
            actors: Arc::new(ActorService::new(repo.clone(), cache)),
            recommendations: Arc::new(RecommendationService::new(repo)),
        }
    }
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::*;
    use crate::db::SqliteRepository;

    pub async fn services() -> (Services, Arc<MovieCache>) {
        let repo: Arc<dyn Repository> = Arc::new(SqliteRepository::new(":memory:").await.unwrap());
        let cache = Arc::new(MovieCache::new());
        (Services::new(repo, cache.clone()), cache)
    }
}
