use std::sync::Arc;

use super::error::ServiceResult;
use crate::db::{DbError, Movie, Repository};
use crate::recommend;

/// Loads the whole corpus per call and hands it to the scoring functions.
pub struct RecommendationService {
    repo: Arc<dyn Repository>,
}

fn owned(movies: Vec<&Movie>) -> Vec<Movie> {
    movies.into_iter().cloned().collect()
}

impl RecommendationService {
    pub fn new(repo: Arc<dyn Repository>) -> Self {
        Self { repo }
    }

    pub async fn by_movie(&self, movie_id: i64, limit: usize) -> ServiceResult<Vec<Movie>> {
        let corpus = self.repo.list_movies().await?;
        Ok(owned(recommend::recommendations_by_movie(&corpus, movie_id, limit)))
    }

    pub async fn trending(&self, limit: usize) -> ServiceResult<Vec<Movie>> {
        let corpus = self.repo.list_movies().await?;
        Ok(owned(recommend::trending(&corpus, limit)))
    }

    pub async fn by_mood(&self, mood: &str, limit: usize) -> ServiceResult<Vec<Movie>> {
        let corpus = self.repo.list_movies().await?;
        Ok(owned(recommend::by_mood(&corpus, mood, limit)))
    }

    /// Movies listed in the style table for the given movie, in id order.
    /// The table bounds the result, so `limit` is not applied.
    pub async fn similar_style(&self, movie_id: i64, _limit: usize) -> ServiceResult<Vec<Movie>> {
        let reference = match self.repo.get_movie(movie_id).await {
            Ok(movie) => movie,
            Err(DbError::NotFound(_)) => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let titles = recommend::style_titles(&reference.title);
        Ok(self.repo.find_movies_by_titles(titles).await?)
    }

    pub fn available_moods(&self) -> Vec<&'static str> {
        recommend::available_moods()
    }
}
