use std::collections::BTreeMap;

use async_trait::async_trait;
use axum::{
    extract::{
        path::ErrorKind,
        rejection::{JsonRejection, PathRejection},
        FromRequest, FromRequestParts, Path, Request,
    },
    http::{request::Parts, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{de::DeserializeOwned, Serialize};
use serde_json::Value;
use tracing::error;

use crate::service::ServiceError;

const INTERNAL_MESSAGE: &str = "An unexpected error occurred. Please try again later.";

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error(transparent)]
    Service(#[from] ServiceError),
    #[error("Parameter '{name}' should be of type '{expected}'")]
    TypeMismatch {
        name: String,
        value: String,
        expected: String,
    },
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
}

impl ApiError {
    pub fn type_mismatch(name: &str, value: &str, expected: &str) -> Self {
        ApiError::TypeMismatch {
            name: name.to_string(),
            value: value.to_string(),
            expected: expected.to_string(),
        }
    }

    pub fn missing_param(name: &str) -> Self {
        ApiError::BadRequest(format!("Required request parameter '{}' is not present", name))
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status: u16,
    pub error: &'static str,
    pub message: String,
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected_value: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_errors: Option<BTreeMap<String, String>>,
}

impl ErrorBody {
    fn new(status: StatusCode, error: &'static str, message: String) -> Self {
        Self {
            status: status.as_u16(),
            error,
            message,
            timestamp: chrono::Utc::now().to_rfc3339(),
            error_code: None,
            field_name: None,
            rejected_value: None,
            validation_errors: None,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, body) = match self {
            ApiError::Service(ServiceError::NotFound(_)) | ApiError::NotFound(_) => {
                let status = StatusCode::NOT_FOUND;
                (status, ErrorBody::new(status, "Resource Not Found", message))
            }
            ApiError::Service(ServiceError::InvalidRequest {
                code, field, rejected, ..
            }) => {
                let status = StatusCode::BAD_REQUEST;
                let mut body = ErrorBody::new(status, "Invalid Request", message);
                body.error_code = code;
                body.field_name = field.map(str::to_string);
                body.rejected_value = rejected;
                (status, body)
            }
            ApiError::Service(ServiceError::Validation(errors)) => {
                let status = StatusCode::BAD_REQUEST;
                let mut body = ErrorBody::new(status, "Validation Failed", message);
                body.error_code = Some("VALIDATION_ERROR");
                body.validation_errors = Some(errors);
                (status, body)
            }
            ApiError::Service(ServiceError::Database(e)) => {
                error!("Database error: {}", e);
                let status = StatusCode::INTERNAL_SERVER_ERROR;
                (
                    status,
                    ErrorBody::new(status, "Internal Server Error", INTERNAL_MESSAGE.to_string()),
                )
            }
            ApiError::TypeMismatch { name, value, .. } => {
                let status = StatusCode::BAD_REQUEST;
                let mut body = ErrorBody::new(status, "Type Mismatch", message);
                body.error_code = Some("TYPE_MISMATCH");
                body.field_name = Some(name);
                body.rejected_value = Some(Value::String(value));
                (status, body)
            }
            ApiError::BadRequest(_) => {
                let status = StatusCode::BAD_REQUEST;
                (status, ErrorBody::new(status, "Invalid Argument", message))
            }
        };
        (status, Json(body)).into_response()
    }
}

/// `Path` with parse failures reported as `TYPE_MISMATCH`.
pub struct ApiPath<T>(pub T);

#[async_trait]
impl<S, T> FromRequestParts<S> for ApiPath<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        match Path::<T>::from_request_parts(parts, state).await {
            Ok(Path(value)) => Ok(ApiPath(value)),
            Err(PathRejection::FailedToDeserializePathParams(e)) => Err(match e.kind() {
                ErrorKind::ParseErrorAtKey {
                    key,
                    value,
                    expected_type,
                } => ApiError::type_mismatch(key, value, expected_type),
                ErrorKind::ParseError { value, expected_type }
                | ErrorKind::ParseErrorAtIndex {
                    value, expected_type, ..
                } => ApiError::type_mismatch("path", value, expected_type),
                _ => ApiError::BadRequest(e.body_text()),
            }),
            Err(rejection) => Err(ApiError::BadRequest(rejection.body_text())),
        }
    }
}

/// `Json` with every rejection reported through the common error body.
pub struct ApiJson<T>(pub T);

#[async_trait]
impl<S, T> FromRequest<S> for ApiJson<T>
where
    T: DeserializeOwned + Send,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ApiJson(value)),
            Err(rejection) => Err(json_rejection(rejection)),
        }
    }
}

fn json_rejection(rejection: JsonRejection) -> ApiError {
    ApiError::BadRequest(format!("Malformed request body: {}", rejection.body_text()))
}
