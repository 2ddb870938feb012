//! Rule-based movie recommendations.
//!
//! The ranking functions are pure scans over the full corpus. Results
//! borrow from the corpus; callers clone what they return.

use std::cmp::Reverse;
use std::collections::HashSet;

use crate::db::Movie;

pub const DEFAULT_LIMIT: usize = 5;
pub const DEFAULT_STYLE_LIMIT: usize = 3;

pub const MOODS: &[&str] = &["action", "comedy", "drama", "sci-fi", "horror", "family"];

const MOOD_GENRES: &[(&str, &[&str])] = &[
    ("action", &["Action", "Adventure", "Thriller"]),
    ("comedy", &["Comedy", "Romance"]),
    ("drama", &["Drama", "Romance"]),
    ("sci-fi", &["Sci-Fi", "Fantasy"]),
    ("horror", &["Horror", "Thriller"]),
    ("family", &["Adventure", "Fantasy", "Comedy"]),
];

const FALLBACK_MOOD_GENRES: &[&str] = &["Drama"];

const STYLE_TABLE: &[(&str, &[&str])] = &[
    ("The Matrix", &["Inception", "The Dark Knight", "Interstellar"]),
    ("Forrest Gump", &["The Shawshank Redemption", "Pulp Fiction", "Goodfellas"]),
    ("The Avengers", &["Black Panther", "The Dark Knight", "Inception"]),
    ("Inception", &["The Matrix", "Interstellar", "The Dark Knight"]),
];

const DEFAULT_STYLE_TITLES: &[&str] = &["The Shawshank Redemption", "Pulp Fiction", "The Dark Knight"];

/// Target genres for a mood. Unknown moods map to drama-only.
pub fn mood_genres(mood: &str) -> &'static [&'static str] {
    let mood = mood.to_lowercase();
    MOOD_GENRES
        .iter()
        .find(|(name, _)| *name == mood)
        .map(|(_, genres)| *genres)
        .unwrap_or(FALLBACK_MOOD_GENRES)
}

pub fn available_moods() -> Vec<&'static str> {
    MOODS.to_vec()
}

fn decade(year: i32) -> i32 {
    year.div_euclid(10)
}

fn genre_names(movie: &Movie) -> HashSet<&str> {
    movie.genres.iter().map(|g| g.name.as_str()).collect()
}

fn actor_names(movie: &Movie) -> HashSet<&str> {
    movie.actors.iter().map(|a| a.name.as_str()).collect()
}

/// Shared names count once each, even when two distinct actors share a name.
fn similarity(reference: &Movie, candidate: &Movie) -> u32 {
    let shared_genres = genre_names(reference)
        .intersection(&genre_names(candidate))
        .count() as u32;
    let shared_actors = actor_names(reference)
        .intersection(&actor_names(candidate))
        .count() as u32;
    let same_decade = u32::from(decade(reference.release_year) == decade(candidate.release_year));

    2 * shared_genres + 3 * shared_actors + same_decade
}

/// Movies most similar to `movie_id`, best first. Ties keep corpus order.
pub fn recommendations_by_movie(corpus: &[Movie], movie_id: i64, limit: usize) -> Vec<&Movie> {
    let Some(reference) = corpus.iter().find(|m| m.id == movie_id) else {
        return Vec::new();
    };

    let mut scored: Vec<(u32, &Movie)> = corpus
        .iter()
        .filter(|m| m.id != movie_id)
        .map(|m| (similarity(reference, m), m))
        .collect();
    scored.sort_by_key(|(score, _)| Reverse(*score));

    scored.into_iter().take(limit).map(|(_, m)| m).collect()
}

fn trending_score(movie: &Movie) -> i64 {
    movie.actors.len() as i64 + i64::from((movie.release_year - 2000).div_euclid(10))
}

pub fn trending(corpus: &[Movie], limit: usize) -> Vec<&Movie> {
    let mut movies: Vec<&Movie> = corpus.iter().collect();
    movies.sort_by_key(|m| Reverse(trending_score(m)));
    movies.truncate(limit);
    movies
}

/// Movies with at least one of the mood's genres, newest first.
pub fn by_mood<'a>(corpus: &'a [Movie], mood: &str, limit: usize) -> Vec<&'a Movie> {
    let targets = mood_genres(mood);
    let mut movies: Vec<&Movie> = corpus
        .iter()
        .filter(|m| m.genres.iter().any(|g| targets.contains(&g.name.as_str())))
        .collect();
    movies.sort_by_key(|m| Reverse(m.release_year));
    movies.truncate(limit);
    movies
}

/// Titles in the same style as `title`, or the default list when the
/// table has no entry for it.
pub fn style_titles(title: &str) -> &'static [&'static str] {
    STYLE_TABLE
        .iter()
        .find(|(known, _)| *known == title)
        .map(|(_, similar)| *similar)
        .unwrap_or(DEFAULT_STYLE_TITLES)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{Actor, Genre};
    use chrono::NaiveDate;

    fn genre(id: i64, name: &str) -> Genre {
        Genre { id, name: name.to_string() }
    }

    fn actor(id: i64, name: &str) -> Actor {
        Actor {
            id,
            name: name.to_string(),
            birth_date: NaiveDate::from_ymd_opt(1970, 1, 1).unwrap(),
        }
    }

    fn movie(id: i64, title: &str, year: i32, genres: Vec<Genre>, actors: Vec<Actor>) -> Movie {
        Movie {
            id,
            title: title.to_string(),
            release_year: year,
            duration: 100,
            genres,
            actors,
        }
    }

    fn ids(movies: &[&Movie]) -> Vec<i64> {
        movies.iter().map(|m| m.id).collect()
    }

    #[test]
    fn test_shared_genres_outrank_shared_actor() {
        let a = genre(1, "A");
        let b = genre(2, "B");
        let x = actor(1, "X");
        let corpus = vec![
            movie(1, "R", 2000, vec![a.clone(), b.clone()], vec![x.clone()]),
            movie(2, "C2", 1980, vec![], vec![x.clone()]),
            movie(3, "C1", 1980, vec![a, b], vec![]),
        ];
        assert_eq!(ids(&recommendations_by_movie(&corpus, 1, 5)), vec![3, 2]);
    }

    #[test]
    fn test_same_decade_breaks_ties_and_limit_applies() {
        let corpus = vec![
            movie(1, "R", 1995, vec![], vec![]),
            movie(2, "Old", 1975, vec![], vec![]),
            movie(3, "Near", 1991, vec![], vec![]),
            movie(4, "Other", 2020, vec![], vec![]),
        ];
        let recs = recommendations_by_movie(&corpus, 1, 2);
        assert_eq!(ids(&recs), vec![3, 2]);
    }

    #[test]
    fn test_unknown_movie_has_no_recommendations() {
        let corpus = vec![movie(1, "R", 1995, vec![], vec![])];
        assert!(recommendations_by_movie(&corpus, 99, 5).is_empty());
            }

    #[test]
    fn test_trending_scores_actors_and_recency() {
        let corpus = vec![
            movie(1, "Old", 1985, vec![], vec![actor(1, "P"), actor(2, "Q")]),
            movie(2, "New", 2021, vec![], vec![actor(3, "R")]),
            movie(3, "Mid", 2005, vec![], vec![]),
        ];
        // Scores: 2 + (-2) = 0, 1 + 2 = 3, 0 + 0 = 0.
        assert_eq!(ids(&trending(&corpus, 5)), vec![2, 1, 3]);
        assert_eq!(ids(&trending(&corpus, 1)), vec![2]);
    }

    #[test]
    fn test_mood_filters_and_orders_by_year() {
        let corpus = vec![
            movie(1, "M1", 1999, vec![genre(1, "Action")], vec![]),
            movie(2, "M2", 2001, vec![genre(1, "Action"), genre(2, "Drama")], vec![]),
            movie(3, "M3", 2010, vec![genre(3, "Comedy")], vec![]),
        ];
        assert_eq!(ids(&by_mood(&corpus, "action", 10)), vec![2, 1]);
        assert_eq!(ids(&by_mood(&corpus, "ACTION", 1)), vec![2]);
    }

    #[test]
    fn test_horror_mood() {
        let corpus = vec![
            movie(1, "Slasher", 1980, vec![genre(1, "Horror")], vec![]),
            movie(2, "Chase", 2015, vec![genre(2, "Thriller")], vec![]),
            movie(3, "Laughs", 2020, vec![genre(3, "Comedy")], vec![]),
        ];
        let movies = by_mood(&corpus, "horror", 5);
        assert_eq!(ids(&movies), vec![2, 1]);
    }

    #[test]
    fn test_unknown_mood_falls_back_to_drama() {
        let corpus = vec![
            movie(1, "Tears", 1990, vec![genre(1, "Drama")], vec![]),
            movie(2, "Love", 2000, vec![genre(2, "Romance")], vec![]),
        ];
        assert_eq!(mood_genres("unknown-mood"), &["Drama"]);
        assert_eq!(ids(&by_mood(&corpus, "unknown-mood", 5)), vec![1]);
    }

    #[test]
    fn test_style_titles() {
        assert_eq!(style_titles("The Matrix"), &["Inception", "The Dark Knight", "Interstellar"]);
        assert_eq!(style_titles("Forrest Gump")[2], "Goodfellas");
        // Lookup is exact; anything else gets the default list.
        assert_eq!(style_titles("the matrix"), DEFAULT_STYLE_TITLES);
        assert_eq!(style_titles("Heat"), DEFAULT_STYLE_TITLES);
    }

    #[test]
    fn test_namesakes_count_once() {
        let evans = Actor {
            id: 1,
            name: "Chris Evans".to_string(),
            birth_date: NaiveDate::from_ymd_opt(1981, 6, 13).unwrap(),
        };
        let other_evans = Actor {
            id: 2,
            name: "Chris Evans".to_string(),
            birth_date: NaiveDate::from_ymd_opt(1960, 1, 1).unwrap(),
        };
        let drama = genre(1, "Drama");
        let reference = movie(1, "R", 2012, vec![drama.clone()], vec![evans.clone()]);
        let candidate = movie(2, "C", 1990, vec![drama.clone(), drama], vec![evans, other_evans]);
        assert_eq!(similarity(&reference, &candidate), 2 + 3);
    }

    #[test]
    fn test_mood_ties_keep_corpus_order() {
        let corpus = vec![
            movie(1, "First", 2001, vec![genre(1, "Comedy")], vec![]),
            movie(2, "Newer", 2010, vec![genre(2, "Romance")], vec![]),
            movie(3, "Second", 2001, vec![genre(2, "Romance")], vec![]),
            movie(4, "Third", 2001, vec![genre(1, "Comedy")], vec![]),
        ];
        assert_eq!(ids(&by_mood(&corpus, "comedy", 10)), vec![2, 1, 3, 4]);
        assert_eq!(ids(&by_mood(&corpus, "comedy", 2)), vec![2, 1]);
    }

    #[test]
    fn test_available_moods() {
        let moods = available_moods();
        assert_eq!(moods.len(), 6);
        assert!(moods.contains(&"sci-fi"));
    }
}
