//! HTTP server for the Distribution Service (spec.md §4.3).

use std::path::PathBuf;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Path as AxumPath, State};
use axum::http::{header, HeaderMap, Method, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::any;
use axum::Router;
use ring_model::RingKind;
use tokio_util::io::ReaderStream;
use tower_http::trace::TraceLayer;
use tracing::{error, instrument};

use crate::distribution::cache::RingCache;

#[derive(Clone)]
pub struct DistributionState {
    inner: Arc<DistributionStateInner>,
}

struct DistributionStateInner {
    swiftdir: PathBuf,
    cache: RingCache,
}

impl DistributionState {
    pub fn new(swiftdir: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(DistributionStateInner {
                swiftdir: swiftdir.into(),
                cache: RingCache::new(),
            }),
        }
    }
}

/// Build the `/ring/<name>` router (spec.md §4.3, §6 default bind `0.0.0.0:8090`).
pub fn router(state: DistributionState) -> Router {
    // Routed through `any` rather than `get(...).head(...)`: axum's
    // method router answers unmatched methods with its own 405 before the
    // handler ever runs, which would preempt the "other method -> 501"
    // requirement below. Dispatching every method into `serve_ring` lets
    // it decide GET/HEAD vs not-implemented itself.
    Router::new()
        .route("/ring/:name", any(serve_ring))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn not_found() -> impl IntoResponse {
    (
        StatusCode::NOT_FOUND,
        [(header::CONTENT_TYPE, "text/plain")],
        "Not Found\r\n",
    )
}

fn resolve_kind(name: &str) -> Option<RingKind> {
    RingKind::ALL
        .into_iter()
        .find(|kind| kind.ring_filename() == name)
}

#[instrument(skip(state))]
async fn serve_ring(
    State(state): State<DistributionState>,
    AxumPath(name): AxumPath<String>,
    method: Method,
    headers: HeaderMap,
) -> Response {
    if method != Method::GET && method != Method::HEAD {
        return StatusCode::NOT_IMPLEMENTED.into_response();
    }

    let Some(kind) = resolve_kind(&name) else {
        return not_found().into_response();
    };

    let path = state.inner.swiftdir.join(&name);
    let current_digest = match state.inner.cache.digest_for(kind, &path) {
        Ok(d) => d,
        Err(err) => {
            error!(%kind, error = %err, "failed to stat/digest ring file");
            return StatusCode::SERVICE_UNAVAILABLE.into_response();
        }
    };

    if let Some(if_none_match) = headers.get(header::IF_NONE_MATCH) {
        if if_none_match.to_str().ok() == Some(current_digest.as_str()) {
            return (
                StatusCode::NOT_MODIFIED,
                [(header::CONTENT_TYPE, "application/octet-stream")],
                "Not Modified\r\n",
            )
                .into_response();
        }
    }

    if method == Method::HEAD {
        return (
            StatusCode::OK,
            [
                (header::CONTENT_TYPE, "application/octet-stream".to_string()),
                (header::ETAG, current_digest),
            ],
        )
            .into_response();
    }

    match tokio::fs::File::open(&path).await {
        Ok(file) => {
            let stream = ReaderStream::with_capacity(file, 4096);
            let body = Body::from_stream(stream);
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "application/octet-stream".to_string()),
                    (header::ETAG, current_digest),
                ],
                body,
            )
                .into_response()
        }
        Err(err) => {
            error!(%kind, error = %err, "failed to open ring file for streaming");
            StatusCode::SERVICE_UNAVAILABLE.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;
    use tower::ServiceExt;

    async fn body_string(response: Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn unknown_name_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(DistributionState::new(dir.path()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/ring/bogus.ring.gz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn unsupported_method_is_not_implemented() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("account.ring.gz"), b"ring-bytes").unwrap();
        let app = router(DistributionState::new(dir.path()));

        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::POST)
                    .uri("/ring/account.ring.gz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_IMPLEMENTED);
    }

    #[tokio::test]
    async fn fresh_fetch_then_conditional_refetch_is_not_modified() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("account.ring.gz"), b"ring-bytes").unwrap();
        let app = router(DistributionState::new(dir.path()));

        let first = app
            .clone()
            .oneshot(
                Request::builder()
                    .uri("/ring/account.ring.gz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        let etag = first
            .headers()
            .get(header::ETAG)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();

        let second = app
            .oneshot(
                Request::builder()
                    .uri("/ring/account.ring.gz")
                    .header(header::IF_NONE_MATCH, &etag)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::NOT_MODIFIED);
        assert!(second.headers().get(header::ETAG).is_none());
        assert_eq!(body_string(second).await, "Not Modified\r\n");
    }

    #[tokio::test]
    async fn missing_file_is_service_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let app = router(DistributionState::new(dir.path()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/ring/account.ring.gz")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
