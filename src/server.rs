use crate::error::Error;
use crate::reconciler::Context;
use crate::run;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router, http::StatusCode};
use serde_json::{Value, json};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Mutex;

#[derive(Clone)]
struct AppState {
    ctx: Arc<Context>,
    /// Runs are serialised: two triggers never reconcile at the same time.
    running: Arc<Mutex<()>>,
}

/// Liveness probe - is the process alive?
/// Always returns 200 OK.
async fn healthz() -> StatusCode {
    StatusCode::OK
}

/// Readiness probe - can this instance handle traffic?
async fn readyz() -> StatusCode {
    StatusCode::OK
}

/// Prometheus metrics endpoint
async fn metrics() -> (StatusCode, String) {
    let encoder = prometheus::TextEncoder::new();
    match encoder.encode_to_string(&prometheus::gather()) {
        Ok(s) => (StatusCode::OK, s),
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
    }
}

/// One full indexer run per request.
async fn invoke(State(state): State<AppState>) -> (StatusCode, Json<Value>) {
    let _running = state.running.lock().await;
    tracing::info!("Run triggered");

    match run::run(&state.ctx).await {
        Ok(summary) => (
            StatusCode::OK,
            Json(json!({ "status": "ok", "summary": summary })),
        ),
        Err(err) => {
            let body = match &err {
                Error::PartialFailure { failures } => json!({
                    "status": "partial_failure",
                    "failures": failures,
                    "error": err.to_string(),
                }),
                _ => json!({ "status": "error", "error": err.to_string() }),
            };
            (StatusCode::INTERNAL_SERVER_ERROR, Json(body))
        }
    }
}

fn router(ctx: Arc<Context>) -> Router {
    let state = AppState {
        ctx,
        running: Arc::new(Mutex::new(())),
    };

    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .route("/run", post(invoke))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, ctx: Arc<Context>) -> anyhow::Result<()> {
    let listener = TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Invocation server listening");
    axum::serve(listener, router(ctx)).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::mock::{Harness, MockDialer, MockDirectory, MockStore, fake_chain};
    use crate::config::RunConfig;
    use axum::body::{Body, to_bytes};
    use axum::http::Request;
    use tower::ServiceExt;

    fn app(dialer: MockDialer) -> (Harness, Router) {
        let h = Harness::new(
            MockDirectory::new(&[("a", "https://a.issuer.example/")]),
            MockStore::default(),
            dialer,
        );
        let router = router(Arc::new(h.context(RunConfig::default())));
        (h, router)
    }

    async fn call(router: Router, method: &str, uri: &str) -> (StatusCode, Vec<u8>) {
        let request = Request::builder()
            .method(method)
            .uri(uri)
            .body(Body::empty())
            .unwrap();
        let response = router.oneshot(request).await.unwrap();
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, body.to_vec())
    }

    #[tokio::test]
    async fn probes_are_ok() {
        let (_h, router) = app(MockDialer::default());
        assert_eq!(call(router.clone(), "GET", "/healthz").await.0, StatusCode::OK);
        assert_eq!(call(router, "GET", "/readyz").await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn successful_run() {
        let (h, router) = app(MockDialer::new(&[("a.issuer.example", fake_chain("a", 1))]));

        let (status, body) = call(router, "POST", "/run").await;

        assert_eq!(status, StatusCode::OK);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["summary"]["published"], 1);
        assert!(h.store.get("/eks_cluster_oidc_fingerprints/a").is_some());
    }

    #[tokio::test]
    async fn partial_failure_is_an_error_response() {
        let (_h, router) = app(MockDialer::default());

        let (status, body) = call(router, "POST", "/run").await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["status"], "partial_failure");
        assert_eq!(body["failures"], 1);
    }

    #[tokio::test]
    async fn run_requires_post() {
        let (h, router) = app(MockDialer::default());

        let (status, _) = call(router, "GET", "/run").await;

        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert!(h.directory.calls().is_empty());
    }
}
