pub mod actors;
pub mod error;
pub mod genres;
pub mod movies;
pub mod pagination;
pub mod query;
pub mod recommendations;
pub mod system;

pub use error::{ApiError, ApiJson, ApiPath, ErrorBody};
pub use pagination::{Page, PageRequest};
pub use query::QueryParams;

pub type ApiResult<T> = Result<T, ApiError>;
