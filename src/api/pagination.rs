use serde::Serialize;

use super::error::ApiError;
use super::query::QueryParams;
use crate::db::{Slice, Window};
use crate::service::ServiceError;

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

/// Zero-based `page` and `size` from the query string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub page: i64,
    pub size: i64,
}

impl PageRequest {
    pub fn from_params(params: &QueryParams) -> Result<Self, ApiError> {
        let page = params.parse_or("page", "int", 0i64)?;
        let size = params.parse_or("size", "int", DEFAULT_PAGE_SIZE)?;
        if page < 0 || !(1..=MAX_PAGE_SIZE).contains(&size) {
            return Err(ServiceError::invalid_pagination(page, size).into());
        }
        Ok(Self { page, size })
    }

    pub fn window(&self) -> Window {
        Window {
            offset: self.page.saturating_mul(self.size),
            limit: self.size,
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub content: Vec<T>,
    pub total_elements: i64,
    pub total_pages: i64,
    pub number: i64,
    pub size: i64,
    pub number_of_elements: usize,
    pub first: bool,
    pub last: bool,
    pub empty: bool,
}

impl<T> Page<T> {
    pub fn new(slice: Slice<T>, req: PageRequest) -> Self {
        let total_pages = (slice.total + req.size - 1) / req.size;
        Self {
            number_of_elements: slice.items.len(),
            empty: slice.items.is_empty(),
            content: slice.items,
            total_elements: slice.total,
            total_pages,
            number: req.page,
            size: req.size,
            first: req.page == 0,
            last: req.page + 1 >= total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(query: &str) -> QueryParams {
        let map: serde_json::Map<String, serde_json::Value> = query
            .split('&')
            .filter(|kv| !kv.is_empty())
            .filter_map(|kv| kv.split_once('='))
            .map(|(k, v)| (k.to_string(), serde_json::Value::String(v.to_string())))
            .collect();
        serde_json::from_value(serde_json::Value::Object(map)).unwrap()
    }

    #[test]
    fn test_defaults_and_bounds() {
        assert_eq!(
            PageRequest::from_params(&params("")).unwrap(),
            PageRequest { page: 0, size: 10 }
        );
        assert!(PageRequest::from_params(&params("page=-1")).is_err());
        assert!(PageRequest::from_params(&params("size=0")).is_err());
        assert!(PageRequest::from_params(&params("size=101")).is_err());
        assert!(PageRequest::from_params(&params("size=100")).is_ok());

        let req = PageRequest::from_params(&params("page=2&size=5")).unwrap();
        assert_eq!(req.window().offset, 10);
        assert_eq!(req.window().limit, 5);
    }

    #[test]
    fn test_page_metadata() {
        let req = PageRequest { page: 1, size: 2 };
        let page = Page::new(
            Slice {
                items: vec![3, 4],
                total: 5,
            },
            req,
        );
        assert_eq!(page.total_pages, 3);
        assert_eq!(page.number_of_elements, 2);
        assert!(!page.first);
        assert!(!page.last);
        assert!(!page.empty);

        let page: Page<i32> = Page::new(Slice { items: vec![], total: 0 }, PageRequest { page: 0, size: 10 });
        assert_eq!(page.total_pages, 0);
        assert!(page.first && page.last && page.empty);
    }
}
