//! HTTP surface: `POST /echoAtTime` and `GET /healthz`.
//!
//! Bodies are accepted as `application/x-www-form-urlencoded` (default) or JSON.
//! - 200 `Queued`
//! - 400 with the validation message
//! - 500 `Temporary error, retry` when the store could not take the task

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use echoat_core::app::Submitter;
use echoat_core::domain::Submission;
use serde_json::json;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

#[derive(Clone)]
pub struct AppState {
    pub submitter: Arc<Submitter>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/echoAtTime", post(echo_at_time))
        .route("/healthz", get(healthz))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({ "status": "ok" })))
}

async fn echo_at_time(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let submission = match decode(&headers, &body) {
        Ok(submission) => submission,
        Err(message) => return (StatusCode::BAD_REQUEST, message).into_response(),
    };

    match state.submitter.submit(&submission).await {
        Ok(key) => {
            info!(key = %key, "accepted echo request");
            (StatusCode::OK, "Queued").into_response()
        }
        Err(err) if err.is_retryable() => {
            error!(error = %err, "error when trying to add a task");
            (StatusCode::INTERNAL_SERVER_ERROR, "Temporary error, retry").into_response()
        }
        Err(err) => (StatusCode::BAD_REQUEST, err.to_string()).into_response(),
    }
}

fn decode(headers: &HeaderMap, body: &[u8]) -> Result<Submission, String> {
    let is_json = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("application/json"));

    if is_json {
        serde_json::from_slice(body).map_err(|e| format!("malformed JSON body: {e}"))
    } else {
        serde_urlencoded::from_bytes(body).map_err(|e| format!("malformed form body: {e}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use echoat_core::config::SubmitConfig;
    use echoat_core::impls::InMemoryTaskStore;
    use echoat_core::ports::{RandomKeyGenerator, SystemClock};
    use tower::ServiceExt;

    fn app(store: &InMemoryTaskStore) -> Router {
        let submitter = Submitter::new(
            Arc::new(store.clone()),
            Arc::new(RandomKeyGenerator),
            Arc::new(SystemClock),
            SubmitConfig::default(),
        );
        router(AppState {
            submitter: Arc::new(submitter),
        })
    }

    fn future_ms() -> i64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap()
            .as_millis() as i64
            + 60_000
    }

    fn post(content_type: &str, body: String) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/echoAtTime")
            .header(header::CONTENT_TYPE, content_type)
            .body(Body::from(body))
            .unwrap()
    }

    async fn send(app: Router, req: Request<Body>) -> (StatusCode, String) {
        let res = app.oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
        (status, String::from_utf8(bytes.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn form_request_is_queued() {
        let store = InMemoryTaskStore::default();
        let body = format!("time={}&message=hello+there", future_ms());

        let (status, text) = send(
            app(&store),
            post("application/x-www-form-urlencoded", body),
        )
        .await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(text, "Queued");
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn json_request_is_queued() {
        let store = InMemoryTaskStore::default();
        let body = json!({ "time": future_ms(), "message": "hi" }).to_string();

        let (status, _) = send(app(&store), post("application/json", body)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(store.len().await, 1);
    }

    #[tokio::test]
    async fn past_time_is_rejected() {
        let store = InMemoryTaskStore::default();
        let body = format!("time={}&message=late", future_ms() - 120_000);

        let (status, text) = send(
            app(&store),
            post("application/x-www-form-urlencoded", body),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!text.is_empty());
        assert!(store.is_empty().await);
    }

    #[tokio::test]
    async fn missing_message_is_rejected() {
        let store = InMemoryTaskStore::default();
        let body = format!("time={}", future_ms());

        let (status, text) = send(
            app(&store),
            post("application/x-www-form-urlencoded", body),
        )
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(text, "no message provided");
    }

    #[tokio::test]
    async fn malformed_json_is_rejected() {
        let store = InMemoryTaskStore::default();
        let (status, text) = send(app(&store), post("application/json", "{".into())).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(text.starts_with("malformed JSON body"));
    }

    #[tokio::test]
    async fn store_failure_asks_client_to_retry() {
        let store = InMemoryTaskStore::default();
        store.inject_failures(1);
        let body = format!("time={}&message=hi", future_ms());

        let (status, text) = send(
            app(&store),
            post("application/x-www-form-urlencoded", body),
        )
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(text, "Temporary error, retry");
    }

    #[tokio::test]
    async fn healthz_reports_ok() {
        let store = InMemoryTaskStore::default();
        let req = Request::builder()
            .uri("/healthz")
            .body(Body::empty())
            .unwrap();

        let (status, text) = send(app(&store), req).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(text, r#"{"status":"ok"}"#);
    }
}
