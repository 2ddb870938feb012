use std::collections::HashMap;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Deserializer};

use super::error::ApiError;
use crate::db::DATE_FORMAT;

/// Raw query string parameters with typed, error-reporting accessors.
#[derive(Debug, Default)]
pub struct QueryParams {
    map: HashMap<String, String>,
}

impl<'de> Deserialize<'de> for QueryParams {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let map = HashMap::<String, String>::deserialize(deserializer)?;
        Ok(QueryParams { map })
    }
}

impl QueryParams {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(|v| v.as_str())
    }

    /// Parses an optional parameter. An empty value counts as absent.
    pub fn parse<T: FromStr>(&self, key: &str, type_name: &str) -> Result<Option<T>, ApiError> {
        match self.get(key).map(str::trim) {
            None | Some("") => Ok(None),
            Some(v) => v
                .parse()
                .map(Some)
                .map_err(|_| ApiError::type_mismatch(key, v, type_name)),
        }
    }

    pub fn parse_or<T: FromStr>(&self, key: &str, type_name: &str, default: T) -> Result<T, ApiError> {
        Ok(self.parse(key, type_name)?.unwrap_or(default))
    }

    pub fn required<T: FromStr>(&self, key: &str, type_name: &str) -> Result<T, ApiError> {
        self.parse(key, type_name)?.ok_or_else(|| ApiError::missing_param(key))
    }

    pub fn required_str(&self, key: &str) -> Result<&str, ApiError> {
        self.get(key).ok_or_else(|| ApiError::missing_param(key))
    }

    pub fn date(&self, key: &str) -> Result<Option<NaiveDate>, ApiError> {
        match self.get(key).map(str::trim) {
            None | Some("") => Ok(None),
            Some(v) => NaiveDate::parse_from_str(v, DATE_FORMAT)
                .map(Some)
                .map_err(|_| ApiError::type_mismatch(key, v, "LocalDate")),
        }
    }

    /// A comma separated id list such as `genreIds=1,2,3`. `None` when the
    /// parameter is absent; present but empty is an empty list.
    pub fn ids(&self, key: &str) -> Result<Option<Vec<i64>>, ApiError> {
        let Some(raw) = self.get(key) else {
            return Ok(None);
        };
        raw.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| s.parse::<i64>().map_err(|_| ApiError::type_mismatch(key, raw, "List<Long>")))
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> QueryParams {
        QueryParams {
            map: pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect(),
        }
    }

    #[test]
    fn test_parse() {
        let p = params(&[("minYear", "1990"), ("maxYear", ""), ("size", "ten")]);
        assert_eq!(p.parse::<i32>("minYear", "Integer").unwrap(), Some(1990));
        assert_eq!(p.parse::<i32>("maxYear", "Integer").unwrap(), None);
        assert_eq!(p.parse::<i32>("other", "Integer").unwrap(), None);
        assert_eq!(p.parse_or("page", "int", 0i64).unwrap(), 0);
        assert!(p.parse::<i64>("size", "int").is_err());
        assert!(p.required::<i32>("minDuration", "Integer").is_err());
    }

    #[test]
    fn test_ids() {
        let p = params(&[("genreIds", "1, 2,3"), ("actorIds", ""), ("bad", "1,x")]);
        assert_eq!(p.ids("genreIds").unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(p.ids("actorIds").unwrap(), Some(vec![]));
        assert_eq!(p.ids("missing").unwrap(), None);
        assert!(p.ids("bad").is_err());
    }

    #[test]
    fn test_date() {
        let p = params(&[("startDate", "1980-02-29"), ("endDate", "29/02/1980")]);
        assert_eq!(
            p.date("startDate").unwrap(),
            NaiveDate::from_ymd_opt(1980, 2, 29)
        );
        assert!(p.date("endDate").is_err());
    }
}
