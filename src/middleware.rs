use std::time::Instant;

use axum::{
    extract::{Request, State},
    http::{header, uri::PathAndQuery, Uri},
    middleware::Next,
    response::Response,
};
use tracing::info;

use crate::server::AppState;

/// Requests below this prefix are not counted.
const METRICS_PREFIX: &str = "/api/metrics";

/// `//api//movies/` becomes `/api/movies`; the root stays `/`.
fn clean_path(path: &str) -> String {
    let segments: Vec<&str> = path.split('/').filter(|s| !s.is_empty()).collect();
    format!("/{}", segments.join("/"))
}

fn with_path(uri: &Uri, path: &str) -> Option<Uri> {
    let path_and_query = match uri.query() {
        Some(query) => PathAndQuery::try_from(format!("{}?{}", path, query)),
        None => PathAndQuery::try_from(path),
    }
    .ok()?;
    let mut parts = uri.clone().into_parts();
    parts.path_and_query = Some(path_and_query);
    Uri::from_parts(parts).ok()
}

/// Rewrites the request path to its clean form. It has to wrap the router
/// from the outside to affect routing.
pub async fn normalize_path(mut req: Request, next: Next) -> Response {
    let path = clean_path(req.uri().path());
    if path != req.uri().path() {
        if let Some(uri) = with_path(req.uri(), &path) {
            *req.uri_mut() = uri;
        }
    }
    next.run(req).await
}

pub async fn log_request(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let uri = req.uri().clone();
    let started = Instant::now();

    let response = next.run(req).await;

    let length = response
        .headers()
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<u64>().ok())
        .unwrap_or(0);
    info!(
        method = %method,
        url = %uri,
        status = response.status().as_u16(),
        length,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "HTTP request"
    );

    response
}

/// Counts every request by path, except the metrics endpoints themselves.
pub async fn record_metrics(State(state): State<AppState>, req: Request, next: Next) -> Response {
    let path = req.uri().path();
    if !path.starts_with(METRICS_PREFIX) {
        state.metrics.record(path);
    }
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_path() {
        assert_eq!(clean_path("/"), "/");
        assert_eq!(clean_path(""), "/");
        assert_eq!(clean_path("//api//movies/"), "/api/movies");
        assert_eq!(clean_path("/api/movies/7"), "/api/movies/7");
    }

    #[test]
    fn test_with_path_keeps_query() {
        let uri: Uri = "//api//movies/?page=2&size=5".parse().unwrap();
        let uri = with_path(&uri, &clean_path(uri.path())).unwrap();
        assert_eq!(uri.to_string(), "/api/movies?page=2&size=5");
    }
}
