use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Genre {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub id: i64,
    pub name: String,
    pub birth_date: NaiveDate,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Movie {
    pub id: i64,
    pub title: String,
    pub release_year: i32,
    pub duration: i32,
    pub genres: Vec<Genre>,
    pub actors: Vec<Actor>,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MovieRow {
    pub id: i64,
    pub title: String,
    pub release_year: i32,
    pub duration: i32,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ActorRow {
    pub id: i64,
    pub name: String,
    pub birth_date: String,
}

#[derive(Debug, Clone)]
pub struct NewMovie {
    pub title: String,
    pub release_year: i32,
    pub duration: i32,
}

#[derive(Debug, Clone)]
pub struct NewActor {
    pub name: String,
    pub birth_date: NaiveDate,
}

/// A limit/offset window into an ordered result.
#[derive(Debug, Clone, Copy)]
pub struct Window {
    pub offset: i64,
    pub limit: i64,
}

/// One page of rows plus the size of the whole result.
#[derive(Debug, Clone)]
pub struct Slice<T> {
    pub items: Vec<T>,
    pub total: i64,
}

#[derive(Debug, Clone, Default)]
pub struct MovieFilter {
    pub title: Option<String>,
    pub release_year: Option<i32>,
    pub min_year: Option<i32>,
    pub max_year: Option<i32>,
    pub min_duration: Option<i32>,
    pub max_duration: Option<i32>,
}

#[derive(Debug, Clone, Default)]
pub struct ActorFilter {
    pub name: Option<String>,
    pub min_birth_date: Option<NaiveDate>,
    pub max_birth_date: Option<NaiveDate>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CountOrder {
    ByName,
    ByCountDesc,
}

#[derive(Debug, Clone, Serialize)]
pub struct WithMovieCount<T> {
    #[serde(flatten)]
    pub item: T,
    #[serde(rename = "movieCount")]
    pub movie_count: i64,
}

#[derive(Debug, Clone, Serialize)]
pub struct WithActorCount<T> {
    #[serde(flatten)]
    pub item: T,
    #[serde(rename = "actorCount")]
    pub actor_count: i64,
}

/// The two movie relationships, each backed by its own join table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Relation {
    Genres,
    Actors,
}

impl Relation {
    pub fn table(self) -> &'static str {
        match self {
            Relation::Genres => "movie_genres",
            Relation::Actors => "movie_actors",
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            Relation::Genres => "genre_id",
            Relation::Actors => "actor_id",
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DbError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Already exists: {0}")]
    AlreadyExists(String),
    #[error("Corrupt row: {0}")]
    Corrupt(String),
}

pub type DbResult<T> = Result<T, DbError>;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

impl TryFrom<ActorRow> for Actor {
    type Error = DbError;

    fn try_from(row: ActorRow) -> DbResult<Self> {
        let birth_date = NaiveDate::parse_from_str(&row.birth_date, DATE_FORMAT)
            .map_err(|e| DbError::Corrupt(format!("actor {} birth_date {:?}: {}", row.id, row.birth_date, e)))?;
        Ok(Actor {
            id: row.id,
            name: row.name,
            birth_date,
        })
    }
}
