use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use sqlx::{QueryBuilder, Sqlite};
use tracing::info;

use super::model::*;
use super::repo::*;

pub struct SqliteRepository {
    pool: SqlitePool,
}

enum MovieScope<'a> {
    Filter(&'a MovieFilter),
    Genre(i64),
    Actor(i64),
    Titles(&'a [&'a str]),
    Without(Relation),
}

impl SqliteRepository {
    pub async fn new(db_path: &str) -> DbResult<Self> {
        let options = SqliteConnectOptions::from_str(db_path)?
            .create_if_missing(true)
            .foreign_keys(true);

        // An in-memory database lives exactly as long as its connection.
        let pool_options = if is_in_memory(db_path) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(5)
        };

        let pool = pool_options.connect_with(options).await?;

        let repo = Self { pool };

        repo.init_schema().await?;

        info!("Database initialized at {}", db_path);

        Ok(repo)
    }

    async fn init_schema(&self) -> DbResult<()> {
        let schema = include_str!("schema.sql");
        sqlx::raw_sql(schema).execute(&self.pool).await?;
        Ok(())
    }

    /// Attaches genres and actors to bare movie rows, keeping row order.
    async fn hydrate(&self, rows: Vec<MovieRow>) -> DbResult<Vec<Movie>> {
        if rows.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();

        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT l.movie_id, g.id, g.name FROM movie_genres l JOIN genres g ON g.id = l.genre_id WHERE l.movie_id IN (",
        );
        push_id_list(&mut qb, &ids);
        qb.push(" ORDER BY g.id");
        let genre_rows: Vec<(i64, i64, String)> = qb.build_query_as().fetch_all(&self.pool).await?;

        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT l.movie_id, a.id, a.name, a.birth_date FROM movie_actors l JOIN actors a ON a.id = l.actor_id WHERE l.movie_id IN (",
        );
        push_id_list(&mut qb, &ids);
        qb.push(" ORDER BY a.id");
        let actor_rows: Vec<(i64, i64, String, String)> = qb.build_query_as().fetch_all(&self.pool).await?;

        let mut genres: HashMap<i64, Vec<Genre>> = HashMap::new();
        for (movie_id, id, name) in genre_rows {
            genres.entry(movie_id).or_default().push(Genre { id, name });
        }

        let mut actors: HashMap<i64, Vec<Actor>> = HashMap::new();
        for (movie_id, id, name, birth_date) in actor_rows {
            let actor = Actor::try_from(ActorRow { id, name, birth_date })?;
            actors.entry(movie_id).or_default().push(actor);
        }

        Ok(rows
            .into_iter()
            .map(|row| Movie {
                genres: genres.remove(&row.id).unwrap_or_default(),
                actors: actors.remove(&row.id).unwrap_or_default(),
                id: row.id,
                title: row.title,
                release_year: row.release_year,
                duration: row.duration,
            })
            .collect())
    }

    async fn movie_slice(
        &self,
        scope: MovieScope<'_>,
        order: &str,
        window: Option<Window>,
    ) -> DbResult<Slice<Movie>> {
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*)");
        push_movie_scope(&mut qb, &scope);
        let (total,): (i64,) = qb.build_query_as().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT m.id, m.title, m.release_year, m.duration");
        push_movie_scope(&mut qb, &scope);
        qb.push(" ORDER BY ").push(order);
        push_window(&mut qb, window);
        let rows: Vec<MovieRow> = qb.build_query_as().fetch_all(&self.pool).await?;

        Ok(Slice {
            items: self.hydrate(rows).await?,
            total,
        })
    }

    async fn actor_list(&self, qb: &mut QueryBuilder<'_, Sqlite>) -> DbResult<Vec<Actor>> {
        let rows: Vec<ActorRow> = qb.build_query_as().fetch_all(&self.pool).await?;
        rows.into_iter().map(Actor::try_from).collect()
    }

    async fn count(&self, sql: &str) -> DbResult<i64> {
        let (n,): (i64,) = sqlx::query_as(sql).fetch_one(&self.pool).await?;
        Ok(n)
    }
}

fn is_in_memory(db_path: &str) -> bool {
    let path = db_path
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    path.starts_with(":memory:") || path.contains("mode=memory")
}

fn like_pattern(needle: &str) -> String {
    format!("%{}%", needle.to_lowercase())
}

fn push_id_list(qb: &mut QueryBuilder<'_, Sqlite>, ids: &[i64]) {
    let mut sep = qb.separated(", ");
    for id in ids {
        sep.push_bind(*id);
    }
    sep.push_unseparated(")");
}

fn push_window(qb: &mut QueryBuilder<'_, Sqlite>, window: Option<Window>) {
    if let Some(window) = window {
        qb.push(" LIMIT ")
            .push_bind(window.limit)
            .push(" OFFSET ")
            .push_bind(window.offset);
    }
}

fn push_movie_scope(qb: &mut QueryBuilder<'_, Sqlite>, scope: &MovieScope<'_>) {
    match scope {
        MovieScope::Filter(filter) => {
            qb.push(" FROM movies m WHERE 1 = 1");
            if let Some(title) = &filter.title {
                qb.push(" AND LOWER(m.title) LIKE ").push_bind(like_pattern(title));
            }
            if let Some(year) = filter.release_year {
                qb.push(" AND m.release_year = ").push_bind(year);
            }
            if let Some(year) = filter.min_year {
                qb.push(" AND m.release_year >= ").push_bind(year);
            }
            if let Some(year) = filter.max_year {
                qb.push(" AND m.release_year <= ").push_bind(year);
            }
            if let Some(duration) = filter.min_duration {
                qb.push(" AND m.duration >= ").push_bind(duration);
            }
            if let Some(duration) = filter.max_duration {
                qb.push(" AND m.duration <= ").push_bind(duration);
            }
        }
        MovieScope::Genre(id) => {
            qb.push(" FROM movies m JOIN movie_genres l ON l.movie_id = m.id WHERE l.genre_id = ")
                .push_bind(*id);
        }
        MovieScope::Actor(id) => {
            qb.push(" FROM movies m JOIN movie_actors l ON l.movie_id = m.id WHERE l.actor_id = ")
                .push_bind(*id);
        }
        MovieScope::Titles(titles) => {
            qb.push(" FROM movies m WHERE m.title IN (");
            let mut sep = qb.separated(", ");
            for title in titles.iter() {
                sep.push_bind(title.to_string());
            }
            sep.push_unseparated(")");
        }
        MovieScope::Without(relation) => {
            qb.push(format!(
                " FROM movies m WHERE NOT EXISTS (SELECT 1 FROM {} l WHERE l.movie_id = m.id)",
                relation.table()
            ));
        }
    }
}

fn map_unique(e: sqlx::Error, what: String) -> DbError {
    let unique = e
        .as_database_error()
        .map_or(false, |db| db.is_unique_violation());
    if unique {
        DbError::AlreadyExists(what)
    } else {
        DbError::Sqlx(e)
    }
}

#[async_trait]
impl MovieRepo for SqliteRepository {
    async fn list_movies(&self) -> DbResult<Vec<Movie>> {
        let filter = MovieFilter::default();
        let slice = self.movie_slice(MovieScope::Filter(&filter), "m.id", None).await?;
        Ok(slice.items)
    }

    async fn get_movie(&self, id: i64) -> DbResult<Movie> {
        let row = sqlx::query_as::<_, MovieRow>(
            "SELECT id, title, release_year, duration FROM movies WHERE id = ?",
        )
        .bind(id)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => DbError::NotFound(format!("Movie not found with id: {}", id)),
            _ => DbError::Sqlx(e),
        })?;

        let mut movies = self.hydrate(vec![row]).await?;
        movies
            .pop()
            .ok_or_else(|| DbError::NotFound(format!("Movie not found with id: {}", id)))
    }

    async fn movie_exists(&self, id: i64) -> DbResult<bool> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM movies WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(n > 0)
    }

    async fn movie_exists_by_title_and_year(&self, title: &str, release_year: i32) -> DbResult<bool> {
        let (n,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM movies WHERE title = ? AND release_year = ?")
                .bind(title)
                .bind(release_year)
                .fetch_one(&self.pool)
                .await?;
        Ok(n > 0)
    }

    async fn find_movies_by_titles(&self, titles: &[&str]) -> DbResult<Vec<Movie>> {
        if titles.is_empty() {
            return Ok(Vec::new());
        }
        let slice = self.movie_slice(MovieScope::Titles(titles), "m.id", None).await?;
        Ok(slice.items)
    }

    async fn search_movies(&self, filter: &MovieFilter, window: Window) -> DbResult<Slice<Movie>> {
        self.movie_slice(MovieScope::Filter(filter), "m.id", Some(window)).await
    }

    async fn movies_by_genre(&self, genre_id: i64, window: Option<Window>) -> DbResult<Slice<Movie>> {
        self.movie_slice(MovieScope::Genre(genre_id), "m.id", window).await
    }

    async fn movies_by_actor(&self, actor_id: i64, window: Option<Window>) -> DbResult<Slice<Movie>> {
        self.movie_slice(MovieScope::Actor(actor_id), "m.id", window).await
    }

    async fn latest_movies(&self, window: Window) -> DbResult<Slice<Movie>> {
        let filter = MovieFilter::default();
        self.movie_slice(MovieScope::Filter(&filter), "m.release_year DESC, m.id", Some(window))
            .await
    }

    async fn movies_by_duration(&self, min: i32, max: i32) -> DbResult<Vec<Movie>> {
        let filter = MovieFilter {
            min_duration: Some(min),
            max_duration: Some(max),
            ..Default::default()
        };
        let slice = self.movie_slice(MovieScope::Filter(&filter), "m.id", None).await?;
        Ok(slice.items)
    }

    async fn movies_without(&self, relation: Relation) -> DbResult<Vec<Movie>> {
        let slice = self.movie_slice(MovieScope::Without(relation), "m.id", None).await?;
        Ok(slice.items)
    }

    async fn movies_with_actor_count(&self, window: Window) -> DbResult<Slice<WithActorCount<Movie>>> {
        let total = self.count("SELECT COUNT(*) FROM movies").await?;

        let results = sqlx::query_as::<_, (i64, String, i32, i32, i64)>(
            "SELECT m.id, m.title, m.release_year, m.duration,
                    (SELECT COUNT(*) FROM movie_actors l WHERE l.movie_id = m.id) AS actor_count
             FROM movies m ORDER BY m.title, m.id LIMIT ? OFFSET ?",
        )
        .bind(window.limit)
        .bind(window.offset)
        .fetch_all(&self.pool)
        .await?;

        let counts: Vec<i64> = results.iter().map(|r| r.4).collect();
        let rows = results
            .into_iter()
            .map(|r| MovieRow {
                id: r.0,
                title: r.1,
                release_year: r.2,
                duration: r.3,
            })
            .collect();

        let items = self
            .hydrate(rows)
            .await?
            .into_iter()
            .zip(counts)
            .map(|(item, actor_count)| WithActorCount { item, actor_count })
            .collect();

        Ok(Slice { items, total })
    }

    async fn insert_movie(&self, movie: &NewMovie) -> DbResult<i64> {
        self.insert_movie_with_links(movie, &[], &[]).await
    }

    async fn insert_movie_with_links(
        &self,
        movie: &NewMovie,
        genre_ids: &[i64],
        actor_ids: &[i64],
    ) -> DbResult<i64> {
        let mut tx = self.pool.begin().await?;
        let id = sqlx::query("INSERT INTO movies (title, release_year, duration) VALUES (?, ?, ?)")
            .bind(&movie.title)
            .bind(movie.release_year)
            .bind(movie.duration)
            .execute(&mut *tx)
            .await
            .map_err(|e| map_unique(e, format!("Movie {} ({})", movie.title, movie.release_year)))?
            .last_insert_rowid();

        for (relation, ids) in [(Relation::Genres, genre_ids), (Relation::Actors, actor_ids)] {
            let sql = format!(
                "INSERT OR IGNORE INTO {} (movie_id, {}) VALUES (?, ?)",
                relation.table(),
                relation.column()
            );
            for other in ids {
                sqlx::query(&sql).bind(id).bind(*other).execute(&mut *tx).await?;
            }
        }

        tx.commit().await?;
        Ok(id)
    }

    async fn update_movie(&self, id: i64, movie: &NewMovie) -> DbResult<()> {
        let result = sqlx::query("UPDATE movies SET title = ?, release_year = ?, duration = ? WHERE id = ?")
            .bind(&movie.title)
            .bind(movie.release_year)
            .bind(movie.duration)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_unique(e, format!("Movie {} ({})", movie.title, movie.release_year)))?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("Movie not found with id: {}", id)));
        }
        Ok(())
    }

    async fn delete_movie(&self, id: i64) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM movie_genres WHERE movie_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM movie_actors WHERE movie_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM movies WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("Movie not found with id: {}", id)));
        }
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl GenreRepo for SqliteRepository {
    async fn list_genres(&self, window: Option<Window>) -> DbResult<Slice<Genre>> {
        let total = self.count("SELECT COUNT(*) FROM genres").await?;
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT id, name FROM genres ORDER BY id");
        push_window(&mut qb, window);
        let items = qb.build_query_as::<Genre>().fetch_all(&self.pool).await?;
        Ok(Slice { items, total })
    }

    async fn get_genre(&self, id: i64) -> DbResult<Genre> {
        sqlx::query_as::<_, Genre>("SELECT id, name FROM genres WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => DbError::NotFound(format!("Genre not found with id: {}", id)),
                _ => DbError::Sqlx(e),
            })
    }

    async fn get_genres_by_ids(&self, ids: &[i64]) -> DbResult<Vec<Genre>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT id, name FROM genres WHERE id IN (");
        push_id_list(&mut qb, ids);
        qb.push(" ORDER BY id");
        Ok(qb.build_query_as::<Genre>().fetch_all(&self.pool).await?)
    }

    async fn find_genre_by_name(&self, name: &str) -> DbResult<Option<Genre>> {
        Ok(
            sqlx::query_as::<_, Genre>("SELECT id, name FROM genres WHERE LOWER(name) = LOWER(?)")
                .bind(name)
                .fetch_optional(&self.pool)
                .await?,
        )
    }

    async fn find_genres_by_names(&self, names: &[String]) -> DbResult<Vec<Genre>> {
        if names.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT id, name FROM genres WHERE LOWER(name) IN (");
        let mut sep = qb.separated(", ");
        for name in names {
            sep.push_bind(name.to_lowercase());
        }
        sep.push_unseparated(") ORDER BY id");
        Ok(qb.build_query_as::<Genre>().fetch_all(&self.pool).await?)
    }

    async fn genre_exists(&self, id: i64) -> DbResult<bool> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM genres WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(n > 0)
    }

    async fn search_genres(&self, name: &str, window: Window) -> DbResult<Slice<Genre>> {
        let pattern = like_pattern(name);
        let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM genres WHERE LOWER(name) LIKE ?")
            .bind(&pattern)
            .fetch_one(&self.pool)
            .await?;
        let items = sqlx::query_as::<_, Genre>(
            "SELECT id, name FROM genres WHERE LOWER(name) LIKE ? ORDER BY id LIMIT ? OFFSET ?",
        )
        .bind(&pattern)
        .bind(window.limit)
        .bind(window.offset)
        .fetch_all(&self.pool)
        .await?;
        Ok(Slice { items, total })
    }

    async fn genres_with_movie_count(
        &self,
        order: CountOrder,
        window: Window,
    ) -> DbResult<Slice<WithMovieCount<Genre>>> {
        let total = self.count("SELECT COUNT(*) FROM genres").await?;
        let order_by = match order {
            CountOrder::ByName => "g.name, g.id",
            CountOrder::ByCountDesc => "movie_count DESC, g.name, g.id",
        };
        let sql = format!(
            "SELECT g.id, g.name, COUNT(l.movie_id) AS movie_count
             FROM genres g LEFT JOIN movie_genres l ON l.genre_id = g.id
             GROUP BY g.id, g.name ORDER BY {} LIMIT ? OFFSET ?",
            order_by
        );
        let results = sqlx::query_as::<_, (i64, String, i64)>(&sql)
            .bind(window.limit)
            .bind(window.offset)
            .fetch_all(&self.pool)
            .await?;

        let items = results
            .into_iter()
            .map(|(id, name, movie_count)| WithMovieCount {
                item: Genre { id, name },
                movie_count,
            })
            .collect();
        Ok(Slice { items, total })
    }

    async fn genres_with_min_movies(&self, min_movies: i64) -> DbResult<Vec<Genre>> {
        Ok(sqlx::query_as::<_, Genre>(
            "SELECT g.id, g.name FROM genres g LEFT JOIN movie_genres l ON l.genre_id = g.id
             GROUP BY g.id, g.name HAVING COUNT(l.movie_id) >= ? ORDER BY g.name, g.id",
        )
        .bind(min_movies)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn genres_without_movies(&self) -> DbResult<Vec<Genre>> {
        Ok(sqlx::query_as::<_, Genre>(
            "SELECT g.id, g.name FROM genres g
             WHERE NOT EXISTS (SELECT 1 FROM movie_genres l WHERE l.genre_id = g.id) ORDER BY g.id",
        )
        .fetch_all(&self.pool)
        .await?)
    }

    async fn insert_genres(&self, names: &[String]) -> DbResult<Vec<Genre>> {
        let mut tx = self.pool.begin().await?;
        let mut genres = Vec::with_capacity(names.len());
        for name in names {
            let result = sqlx::query("INSERT INTO genres (name) VALUES (?)")
                .bind(name)
                .execute(&mut *tx)
                .await
                .map_err(|e| map_unique(e, format!("Genre {}", name)))?;
            genres.push(Genre {
                id: result.last_insert_rowid(),
                name: name.clone(),
            });
        }
        tx.commit().await?;
        Ok(genres)
    }

    async fn rename_genre(&self, id: i64, name: &str) -> DbResult<()> {
        let result = sqlx::query("UPDATE genres SET name = ? WHERE id = ?")
            .bind(name)
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_unique(e, format!("Genre {}", name)))?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("Genre not found with id: {}", id)));
        }
        Ok(())
    }

    async fn delete_genre(&self, id: i64) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM movie_genres WHERE genre_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM genres WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("Genre not found with id: {}", id)));
        }
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl ActorRepo for SqliteRepository {
    async fn list_actors(&self, window: Option<Window>) -> DbResult<Slice<Actor>> {
        let total = self.count("SELECT COUNT(*) FROM actors").await?;
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT id, name, birth_date FROM actors ORDER BY id");
        push_window(&mut qb, window);
        let items = self.actor_list(&mut qb).await?;
        Ok(Slice { items, total })
    }

    async fn get_actor(&self, id: i64) -> DbResult<Actor> {
        let row = sqlx::query_as::<_, ActorRow>("SELECT id, name, birth_date FROM actors WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => DbError::NotFound(format!("Actor not found with id: {}", id)),
                _ => DbError::Sqlx(e),
            })?;
        Actor::try_from(row)
    }

    async fn get_actors_by_ids(&self, ids: &[i64]) -> DbResult<Vec<Actor>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let mut qb = QueryBuilder::<Sqlite>::new("SELECT id, name, birth_date FROM actors WHERE id IN (");
        push_id_list(&mut qb, ids);
        qb.push(" ORDER BY id");
        self.actor_list(&mut qb).await
    }

    async fn actor_exists(&self, id: i64) -> DbResult<bool> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM actors WHERE id = ?")
            .bind(id)
            .fetch_one(&self.pool)
            .await?;
        Ok(n > 0)
    }

    async fn actor_exists_by_name_and_birth_date(&self, name: &str, birth_date: NaiveDate) -> DbResult<bool> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM actors WHERE name = ? AND birth_date = ?")
            .bind(name)
            .bind(birth_date.format(DATE_FORMAT).to_string())
            .fetch_one(&self.pool)
            .await?;
        Ok(n > 0)
    }

    async fn search_actors(&self, filter: &ActorFilter, window: Window) -> DbResult<Slice<Actor>> {
        fn push_filter(qb: &mut QueryBuilder<'_, Sqlite>, filter: &ActorFilter) {
            qb.push(" FROM actors WHERE 1 = 1");
            if let Some(name) = &filter.name {
                qb.push(" AND LOWER(name) LIKE ").push_bind(like_pattern(name));
            }
            if let Some(date) = filter.min_birth_date {
                qb.push(" AND birth_date >= ").push_bind(date.format(DATE_FORMAT).to_string());
            }
            if let Some(date) = filter.max_birth_date {
                qb.push(" AND birth_date <= ").push_bind(date.format(DATE_FORMAT).to_string());
            }
        }

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*)");
        push_filter(&mut qb, filter);
        let (total,): (i64,) = qb.build_query_as().fetch_one(&self.pool).await?;

        let mut qb = QueryBuilder::<Sqlite>::new("SELECT id, name, birth_date");
        push_filter(&mut qb, filter);
        qb.push(" ORDER BY id");
        push_window(&mut qb, Some(window));
        let items = self.actor_list(&mut qb).await?;

        Ok(Slice { items, total })
    }

    async fn actors_by_birth_date(&self, start: NaiveDate, end: NaiveDate) -> DbResult<Vec<Actor>> {
        let rows = sqlx::query_as::<_, ActorRow>(
            "SELECT id, name, birth_date FROM actors WHERE birth_date BETWEEN ? AND ? ORDER BY birth_date, id",
        )
        .bind(start.format(DATE_FORMAT).to_string())
        .bind(end.format(DATE_FORMAT).to_string())
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Actor::try_from).collect()
    }

    async fn actors_by_movie(&self, movie_id: i64) -> DbResult<Vec<Actor>> {
        let rows = sqlx::query_as::<_, ActorRow>(
            "SELECT a.id, a.name, a.birth_date FROM actors a
             JOIN movie_actors l ON l.actor_id = a.id WHERE l.movie_id = ? ORDER BY a.id",
        )
        .bind(movie_id)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Actor::try_from).collect()
    }

    async fn actors_with_movie_count(
        &self,
        order: CountOrder,
        window: Window,
    ) -> DbResult<Slice<WithMovieCount<Actor>>> {
        let total = self.count("SELECT COUNT(*) FROM actors").await?;
        let order_by = match order {
            CountOrder::ByName => "a.name, a.id",
            CountOrder::ByCountDesc => "movie_count DESC, a.name, a.id",
        };
        let sql = format!(
            "SELECT a.id, a.name, a.birth_date, COUNT(l.movie_id) AS movie_count
             FROM actors a LEFT JOIN movie_actors l ON l.actor_id = a.id
             GROUP BY a.id, a.name, a.birth_date ORDER BY {} LIMIT ? OFFSET ?",
            order_by
        );
        let results = sqlx::query_as::<_, (i64, String, String, i64)>(&sql)
            .bind(window.limit)
            .bind(window.offset)
            .fetch_all(&self.pool)
            .await?;

        let mut items = Vec::with_capacity(results.len());
        for (id, name, birth_date, movie_count) in results {
            items.push(WithMovieCount {
                item: Actor::try_from(ActorRow { id, name, birth_date })?,
                movie_count,
            });
        }
        Ok(Slice { items, total })
    }

    async fn actors_with_min_movies(&self, min_movies: i64) -> DbResult<Vec<Actor>> {
        let rows = sqlx::query_as::<_, ActorRow>(
            "SELECT a.id, a.name, a.birth_date FROM actors a LEFT JOIN movie_actors l ON l.actor_id = a.id
             GROUP BY a.id, a.name, a.birth_date HAVING COUNT(l.movie_id) >= ? ORDER BY a.name, a.id",
        )
        .bind(min_movies)
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Actor::try_from).collect()
    }

    async fn actors_without_movies(&self) -> DbResult<Vec<Actor>> {
        let rows = sqlx::query_as::<_, ActorRow>(
            "SELECT a.id, a.name, a.birth_date FROM actors a
             WHERE NOT EXISTS (SELECT 1 FROM movie_actors l WHERE l.actor_id = a.id) ORDER BY a.id",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.into_iter().map(Actor::try_from).collect()
    }

    async fn insert_actor(&self, actor: &NewActor) -> DbResult<Actor> {
        let result = sqlx::query("INSERT INTO actors (name, birth_date) VALUES (?, ?)")
            .bind(&actor.name)
            .bind(actor.birth_date.format(DATE_FORMAT).to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| map_unique(e, format!("Actor {} ({})", actor.name, actor.birth_date)))?;
        Ok(Actor {
            id: result.last_insert_rowid(),
            name: actor.name.clone(),
            birth_date: actor.birth_date,
        })
    }

    async fn update_actor(&self, id: i64, actor: &NewActor) -> DbResult<()> {
        let result = sqlx::query("UPDATE actors SET name = ?, birth_date = ? WHERE id = ?")
            .bind(&actor.name)
            .bind(actor.birth_date.format(DATE_FORMAT).to_string())
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| map_unique(e, format!("Actor {} ({})", actor.name, actor.birth_date)))?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("Actor not found with id: {}", id)));
        }
        Ok(())
    }

    async fn delete_actor(&self, id: i64) -> DbResult<()> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM movie_actors WHERE actor_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM actors WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        if result.rows_affected() == 0 {
            return Err(DbError::NotFound(format!("Actor not found with id: {}", id)));
        }
        tx.commit().await?;
        Ok(())
    }
}

#[async_trait]
impl LinkRepo for SqliteRepository {
    async fn link(&self, relation: Relation, movie_id: i64, ids: &[i64]) -> DbResult<()> {
        let sql = format!(
            "INSERT OR IGNORE INTO {} (movie_id, {}) VALUES (?, ?)",
            relation.table(),
            relation.column()
        );
        let mut tx = self.pool.begin().await?;
        for id in ids {
            sqlx::query(&sql).bind(movie_id).bind(*id).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn unlink(&self, relation: Relation, movie_id: i64, ids: &[i64]) -> DbResult<()> {
        let sql = format!(
            "DELETE FROM {} WHERE movie_id = ? AND {} = ?",
            relation.table(),
            relation.column()
        );
        let mut tx = self.pool.begin().await?;
        for id in ids {
            sqlx::query(&sql).bind(movie_id).bind(*id).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn replace_links(&self, relation: Relation, movie_id: i64, ids: &[i64]) -> DbResult<()> {
        let clear = format!("DELETE FROM {} WHERE movie_id = ?", relation.table());
        let insert = format!(
            "INSERT OR IGNORE INTO {} (movie_id, {}) VALUES (?, ?)",
            relation.table(),
            relation.column()
        );
        let mut tx = self.pool.begin().await?;
        sqlx::query(&clear).bind(movie_id).execute(&mut *tx).await?;
        for id in ids {
            sqlx::query(&insert).bind(movie_id).bind(*id).execute(&mut *tx).await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn linked_movie_ids(&self, relation: Relation, other_id: i64) -> DbResult<Vec<i64>> {
        let sql = format!(
            "SELECT movie_id FROM {} WHERE {} = ? ORDER BY movie_id",
            relation.table(),
            relation.column()
        );
        let results = sqlx::query_as::<_, (i64,)>(&sql)
            .bind(other_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(results.into_iter().map(|r| r.0).collect())
    }
}

impl Repository for SqliteRepository {}

#[cfg(test)]
mod tests {
    use super::*;

    async fn repo() -> SqliteRepository {
        SqliteRepository::new(":memory:").await.unwrap()
    }

    fn new_movie(title: &str, year: i32) -> NewMovie {
        NewMovie {
            title: title.to_string(),
            release_year: year,
            duration: 120,
        }
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, DATE_FORMAT).unwrap()
    }

    #[test]
    fn test_is_in_memory() {
        assert!(is_in_memory(":memory:"));
        assert!(is_in_memory("sqlite::memory:"));
        assert!(!is_in_memory("movies.db"));
        assert!(!is_in_memory("sqlite://movies.db"));
    }

    #[tokio::test]
    async fn test_movie_roundtrip_with_links() {
        let repo = repo().await;
        let id = repo.insert_movie(&new_movie("The Matrix", 1999)).await.unwrap();
        let genres = repo
            .insert_genres(&["Sci-Fi".to_string(), "Action".to_string()])
            .await
            .unwrap();
        let actor = repo
            .insert_actor(&NewActor {
                name: "Keanu Reeves".to_string(),
                birth_date: date("1964-09-02"),
            })
            .await
            .unwrap();

        let genre_ids: Vec<i64> = genres.iter().map(|g| g.id).collect();
        repo.link(Relation::Genres, id, &genre_ids).await.unwrap();
        repo.link(Relation::Actors, id, &[actor.id]).await.unwrap();
        // Linking twice is a no-op.
        repo.link(Relation::Actors, id, &[actor.id]).await.unwrap();

        let movie = repo.get_movie(id).await.unwrap();
        assert_eq!(movie.title, "The Matrix");
        assert_eq!(movie.genres, genres);
        assert_eq!(movie.actors, vec![actor.clone()]);

        // The other side of the relationship sees the same edit.
        let by_actor = repo.movies_by_actor(actor.id, None).await.unwrap();
        assert_eq!(by_actor.total, 1);
        assert_eq!(by_actor.items[0].id, id);
        assert_eq!(repo.linked_movie_ids(Relation::Genres, genres[0].id).await.unwrap(), vec![id]);

        repo.unlink(Relation::Genres, id, &[genres[0].id]).await.unwrap();
        let movie = repo.get_movie(id).await.unwrap();
        assert_eq!(movie.genres, vec![genres[1].clone()]);
        assert!(repo.linked_movie_ids(Relation::Genres, genres[0].id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_rows_are_not_found() {
        let repo = repo().await;
        assert!(matches!(repo.get_movie(42).await, Err(DbError::NotFound(_))));
        assert!(matches!(repo.get_genre(42).await, Err(DbError::NotFound(_))));
        assert!(matches!(repo.get_actor(42).await, Err(DbError::NotFound(_))));
        assert!(matches!(repo.delete_movie(42).await, Err(DbError::NotFound(_))));
        assert!(!repo.movie_exists(42).await.unwrap());
    }

    #[tokio::test]
    async fn test_unique_constraints() {
        let repo = repo().await;
        repo.insert_genres(&["Drama".to_string()]).await.unwrap();
        let err = repo.insert_genres(&["drama".to_string()]).await.unwrap_err();
        assert!(matches!(err, DbError::AlreadyExists(_)));

        repo.insert_movie(&new_movie("Heat", 1995)).await.unwrap();
        assert!(repo.movie_exists_by_title_and_year("Heat", 1995).await.unwrap());
        assert!(!repo.movie_exists_by_title_and_year("Heat", 1996).await.unwrap());
        let err = repo.insert_movie(&new_movie("Heat", 1995)).await.unwrap_err();
        assert!(matches!(err, DbError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_delete_detaches_links() {
        let repo = repo().await;
        let id = repo.insert_movie(&new_movie("Alien", 1979)).await.unwrap();
        let genres = repo.insert_genres(&["Horror".to_string()]).await.unwrap();
        repo.link(Relation::Genres, id, &[genres[0].id]).await.unwrap();

        repo.delete_genre(genres[0].id).await.unwrap();
        assert!(repo.get_movie(id).await.unwrap().genres.is_empty());

        repo.delete_movie(id).await.unwrap();
        assert!(repo.list_movies().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_search_and_windows() {
        let repo = repo().await;
        for (title, year) in [("Alpha", 1990), ("Beta", 2005), ("Alphabet", 2010)] {
            repo.insert_movie(&new_movie(title, year)).await.unwrap();
        }

        let filter = MovieFilter {
            title: Some("ALPHA".to_string()),
            ..Default::default()
        };
        let slice = repo
            .search_movies(&filter, Window { offset: 0, limit: 1 })
            .await
            .unwrap();
        assert_eq!(slice.total, 2);
        assert_eq!(slice.items.len(), 1);
        assert_eq!(slice.items[0].title, "Alpha");

        let latest = repo.latest_movies(Window { offset: 0, limit: 10 }).await.unwrap();
        let years: Vec<i32> = latest.items.iter().map(|m| m.release_year).collect();
        assert_eq!(years, vec![2010, 2005, 1990]);

        let found = repo.find_movies_by_titles(&["Beta", "Nope"]).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].title, "Beta");

        assert_eq!(repo.movies_without(Relation::Actors).await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn test_insert_with_links_is_atomic() {
        let repo = repo().await;
        let genres = repo.insert_genres(&["Drama".to_string()]).await.unwrap();

        let id = repo
            .insert_movie_with_links(&new_movie("Heat", 1995), &[genres[0].id], &[])
            .await
            .unwrap();
        assert_eq!(repo.get_movie(id).await.unwrap().genres, genres);

        // The foreign key rejects the unknown actor and the movie row goes too.
        let err = repo
            .insert_movie_with_links(&new_movie("Ronin", 1998), &[genres[0].id], &[404])
            .await
            .unwrap_err();
        assert!(matches!(err, DbError::Sqlx(_)));
        assert!(!repo.movie_exists_by_title_and_year("Ronin", 1998).await.unwrap());
        assert_eq!(repo.list_movies().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_counts_and_replace_links() {
        let repo = repo().await;
        let m1 = repo.insert_movie(&new_movie("One", 2001)).await.unwrap();
        let m2 = repo.insert_movie(&new_movie("Two", 2002)).await.unwrap();
        let genres = repo
            .insert_genres(&["Comedy".to_string(), "Action".to_string()])
            .await
            .unwrap();
        repo.link(Relation::Genres, m1, &[genres[0].id]).await.unwrap();
        repo.link(Relation::Genres, m2, &[genres[0].id]).await.unwrap();

        let top = repo
            .genres_with_movie_count(CountOrder::ByCountDesc, Window { offset: 0, limit: 10 })
            .await
            .unwrap();
        assert_eq!(top.items[0].item.name, "Comedy");
        assert_eq!(top.items[0].movie_count, 2);
        assert_eq!(top.items[1].movie_count, 0);

        assert_eq!(repo.genres_without_movies().await.unwrap(), vec![genres[1].clone()]);
        assert_eq!(repo.genres_with_min_movies(2).await.unwrap(), vec![genres[0].clone()]);

        repo.replace_links(Relation::Genres, m1, &[genres[1].id]).await.unwrap();
        let movie = repo.get_movie(m1).await.unwrap();
        assert_eq!(movie.genres, vec![genres[1].clone()]);
    }

    #[tokio::test]
    async fn test_actor_queries() {
        let repo = repo().await;
        let a = repo
            .insert_actor(&NewActor { name: "Ann Example".to_string(), birth_date: date("1970-05-01") })
            .await
            .unwrap();
        let b = repo
            .insert_actor(&NewActor { name: "Bob Sample".to_string(), birth_date: date("1985-11-20") })
            .await
            .unwrap();

        let range = repo
            .actors_by_birth_date(date("1980-01-01"), date("1990-01-01"))
            .await
            .unwrap();
        assert_eq!(range, vec![b.clone()]);

        let filter = ActorFilter {
            name: Some("ann".to_string()),
            ..Default::default()
        };
        let slice = repo.search_actors(&filter, Window { offset: 0, limit: 10 }).await.unwrap();
        assert_eq!(slice.items, vec![a.clone()]);

        assert!(repo
            .actor_exists_by_name_and_birth_date("Ann Example", date("1970-05-01"))
            .await
            .unwrap());
        assert_eq!(repo.get_actors_by_ids(&[b.id, a.id, 999]).await.unwrap().len(), 2);
    }
}
