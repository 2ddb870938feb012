use std::collections::BTreeMap;

use serde_json::Value;

use crate::db::DbError;

pub type ServiceResult<T> = Result<T, ServiceError>;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),
    #[error("{message}")]
    InvalidRequest {
        message: String,
        code: Option<&'static str>,
        field: Option<&'static str>,
        rejected: Option<Value>,
    },
    #[error("Validation failed for {} field(s)", .0.len())]
    Validation(BTreeMap<String, String>),
    #[error(transparent)]
    Database(DbError),
}

impl From<DbError> for ServiceError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::NotFound(msg) => ServiceError::NotFound(msg),
            // Lost a race against the explicit duplicate check.
            DbError::AlreadyExists(what) => ServiceError::invalid(format!("{} already exists", what)),
            e => ServiceError::Database(e),
        }
    }
}

impl ServiceError {
    pub fn invalid(message: impl Into<String>) -> Self {
        ServiceError::InvalidRequest {
            message: message.into(),
            code: None,
            field: None,
            rejected: None,
        }
    }

    pub fn not_found(kind: &str, id: i64) -> Self {
        ServiceError::NotFound(format!("{} not found with id: {}", kind, id))
    }

    pub fn duplicate_genre(name: &str) -> Self {
        ServiceError::InvalidRequest {
            message: format!("Genre with name '{}' already exists", name),
            code: Some("DUPLICATE_GENRE"),
            field: Some("name"),
            rejected: Some(Value::from(name)),
        }
    }

    pub fn duplicate_movie(title: &str, release_year: i32) -> Self {
        ServiceError::InvalidRequest {
            message: format!(
                "Movie with title '{}' and release year '{}' already exists",
                title, release_year
            ),
            code: Some("DUPLICATE_MOVIE"),
            field: Some("title"),
            rejected: Some(Value::from(title)),
        }
    }

    pub fn duplicate_actor(name: &str, birth_date: &str) -> Self {
        ServiceError::InvalidRequest {
            message: format!(
                "Actor with name '{}' and birth date '{}' already exists",
                name, birth_date
            ),
            code: Some("DUPLICATE_ACTOR"),
            field: Some("name"),
            rejected: Some(Value::from(name)),
        }
    }

    pub fn future_birth_date() -> Self {
        ServiceError::InvalidRequest {
            message: "Birth date cannot be in the future".to_string(),
            code: Some("FUTURE_BIRTH_DATE"),
            field: Some("birthDate"),
            rejected: None,
        }
    }

    pub fn invalid_release_year(year: i32, max_year: i32) -> Self {
        ServiceError::InvalidRequest {
            message: format!("Release year must be between 1888 and {}", max_year),
            code: Some("INVALID_RELEASE_YEAR"),
            field: Some("releaseYear"),
            rejected: Some(Value::from(year)),
        }
    }

    pub fn has_relationships(message: String) -> Self {
        ServiceError::InvalidRequest {
            message,
            code: Some("HAS_RELATIONSHIPS"),
            field: None,
            rejected: None,
        }
    }

    pub fn invalid_pagination(page: i64, size: i64) -> Self {
        ServiceError::InvalidRequest {
            message: format!(
                "Invalid pagination parameters: page={}, size={}. Page must be >= 0 and size between 1 and 100",
                page, size
            ),
            code: Some("INVALID_PAGINATION"),
            field: Some("page/size"),
            rejected: Some(Value::from(format!("page={}, size={}", page, size))),
        }
    }
}

/// Field-level validation failures, keyed by the JSON field name.
#[derive(Debug, Default)]
pub(crate) struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        // First failure per field wins.
        self.0.entry(field.into()).or_insert_with(|| message.into());
    }

    /// Non-blank text of at most `max` characters. `None` is only an error
    /// when the field is required.
    pub fn text(&mut self, field: &str, value: Option<&str>, required: bool, max: usize, label: &str) {
        match value {
            None if required => self.add(field, format!("{} is required", label)),
            None => {}
            Some(v) if v.trim().is_empty() => self.add(field, format!("{} is required", label)),
            Some(v) if v.chars().count() > max => {
                self.add(field, format!("{} must not exceed {} characters", label, max))
            }
            Some(_) => {}
        }
    }

    pub fn merge_prefixed(&mut self, prefix: &str, other: FieldErrors) {
        for (field, message) in other.0 {
            self.add(format!("{}.{}", prefix, field), message);
        }
    }

    pub fn into_result(self) -> ServiceResult<()> {
        if self.0.is_empty() {
            Ok(())
        } else {
            Err(ServiceError::Validation(self.0))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_errors_map_to_service_errors() {
        let err: ServiceError = DbError::NotFound("Movie not found with id: 3".into()).into();
        assert!(matches!(err, ServiceError::NotFound(ref m) if m == "Movie not found with id: 3"));

        let err: ServiceError = DbError::AlreadyExists("Genre Drama".into()).into();
        assert_eq!(err.to_string(), "Genre Drama already exists");

        let err: ServiceError = DbError::Corrupt("bad".into()).into();
        assert!(matches!(err, ServiceError::Database(_)));
    }

    #[test]
    fn test_field_errors() {
        let mut errors = FieldErrors::default();
        errors.text("name", Some("   "), true, 10, "Genre name");
        errors.text("name", None, true, 10, "Genre name");
        errors.text("title", Some("abcdefghijk"), false, 10, "Movie title");
        errors.text("other", None, false, 10, "Other");

        match errors.into_result() {
            Err(ServiceError::Validation(map)) => {
                assert_eq!(map.len(), 2);
                assert_eq!(map["name"], "Genre name is required");
                assert_eq!(map["title"], "Movie title must not exceed 10 characters");
            }
            other => panic!("unexpected {:?}", other),
        }
        assert!(FieldErrors::default().into_result().is_ok());
    }

    #[test]
    fn test_pagination_error_message() {
        let err = ServiceError::invalid_pagination(-1, 10);
        assert_eq!(
            err.to_string(),
            "Invalid pagination parameters: page=-1, size=10. Page must be >= 0 and size between 1 and 100"
        );
    }
}
