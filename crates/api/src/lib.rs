//! # Turbine HTTP API
//!
//! JSON over HTTP in front of the broker.
//!
//! ## Routes
//! - `GET /health` - store liveness
//! - `GET|POST /api/v1/pipelines` - list / create
//! - `GET|PUT|DELETE /api/v1/pipelines/{id}` - read / update / delete
//! - `GET /api/v1/pipelines/{id}/statistics` - intake statistics
//! - `GET /api/v1/pipelines/{id}/datapoints?consumer=c&limit=n` - pop
//! - `POST /api/v1/pipelines/{id}/datapoints` - push raw body

mod error;
pub mod handlers;

use std::future::Future;

use axum::http::Request;
use axum::routing::get;
use axum::Router;
use broker::Broker;
use contracts::KvStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::Level;

pub use error::ApiError;
pub use handlers::AppState;

/// Build the API router
pub fn router<S: KvStore + Sync + 'static>(broker: Broker<S>) -> Router {
    let pipelines = Router::new()
        .route(
            "/",
            get(handlers::list_pipelines::<S>).post(handlers::create_pipeline::<S>),
        )
        .route(
            "/{id}",
            get(handlers::get_pipeline::<S>)
                .put(handlers::update_pipeline::<S>)
                .delete(handlers::delete_pipeline::<S>),
        )
        .route("/{id}/statistics", get(handlers::get_statistics::<S>))
        .route(
            "/{id}/datapoints",
            get(handlers::pop_datapoints::<S>).post(handlers::push_datapoint::<S>),
        );

    Router::new()
        .route("/health", get(handlers::health::<S>))
        .nest("/api/v1/pipelines", pipelines)
        .with_state(AppState { broker })
}

/// Serve until `shutdown` resolves, with request tracing
pub async fn serve<S, F>(listener: TcpListener, broker: Broker<S>, shutdown: F) -> std::io::Result<()>
where
    S: KvStore + Sync + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let app = router(broker).layer(TraceLayer::new_for_http().make_span_with(
        |request: &Request<_>| {
            tracing::span!(
                Level::INFO,
                "http_request",
                method = %request.method(),
                path = %request.uri().path(),
                query = request.uri().query().unwrap_or("")
            )
        },
    ));

    if let Ok(addr) = listener.local_addr() {
        tracing::info!(addr = %addr, "HTTP server listening");
    }
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{header, Method, StatusCode};
    use axum::response::Response;
    use contracts::TurbineConfig;
    use kv_store::MemoryStore;
    use log_engine::SystemClock;
    use serde_json::Value;
    use std::sync::Arc;
    use tower::ServiceExt;

    fn test_app() -> (Broker<MemoryStore>, Router) {
        let mut config = TurbineConfig::default();
        config.ingestion.writers = 2;
        let broker = Broker::start(Arc::new(MemoryStore::new()), Arc::new(SystemClock), &config);
        (broker.clone(), router(broker))
    }

    fn request(method: Method, uri: &str, body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.into())
            .unwrap()
    }

    async fn json_body(response: Response) -> Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (_, app) = test_app();
        let response = app
            .oneshot(request(Method::GET, "/health", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "ok");
    }

    #[tokio::test]
    async fn test_create_get_update_delete() {
        let (_, app) = test_app();

        let response = app
            .clone()
            .oneshot(request(
                Method::POST,
                "/api/v1/pipelines",
                r#"{"id":"p1","name":"orders","description":"all orders"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::CREATED);
        let created = json_body(response).await;
        assert_eq!(created["id"], "p1");
        assert_eq!(created["statistic"]["statistics"].as_array().unwrap().len(), 10);

        let response = app
            .clone()
            .oneshot(request(
                Method::PUT,
                "/api/v1/pipelines/p1",
                r#"{"name":"orders-v2"}"#,
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let updated = json_body(response).await;
        assert_eq!(updated["name"], "orders-v2");
        assert_eq!(updated["description"], "all orders");

        let response = app
            .clone()
            .oneshot(request(Method::DELETE, "/api/v1/pipelines/p1", Body::empty()))
            .await
            .unwrap();
        assert_eq!(json_body(response).await["deleted"], true);

        let response = app
            .clone()
            .oneshot(request(Method::DELETE, "/api/v1/pipelines/p1", Body::empty()))
            .await
            .unwrap();
        assert_eq!(json_body(response).await["deleted"], false);

        let response = app
            .oneshot(request(Method::GET, "/api/v1/pipelines/p1", Body::empty()))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        let body = json_body(response).await;
        assert_eq!(body["status"], "error");
        assert_eq!(body["message"], "pipeline not found: p1");
    }

    #[tokio::test]
    async fn test_push_then_pop() {
        let (broker, app) = test_app();

        for value in ["a", "b", "c"] {
            let response = app
                .clone()
                .oneshot(request(Method::POST, "/api/v1/pipelines/p1/datapoints", value))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::ACCEPTED);
            assert_eq!(
                response.headers()[header::LOCATION],
                "/api/v1/pipelines/p1/datapoints"
            );
        }
        broker.shutdown().await;

        let response = app
            .clone()
            .oneshot(request(
                Method::GET,
                "/api/v1/pipelines/p1/datapoints?consumer=c1&limit=2",
                Body::empty(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await.as_array().unwrap().len(), 2);

        let response = app
            .clone()
            .oneshot(request(Method::GET, "/api/v1/pipelines", Body::empty()))
            .await
            .unwrap();
        let list = json_body(response).await;
        assert_eq!(list[0]["id"], "p1");
        assert_eq!(list[0]["consumers"][0]["unread_elements"], 1);

        let response = app
            .oneshot(request(
                Method::GET,
                "/api/v1/pipelines/p1/statistics",
                Body::empty(),
            ))
            .await
            .unwrap();
        let stats = json_body(response).await;
        assert_eq!(stats["today"], 3);
        assert_eq!(stats["change_rate"], 0.0);
    }

    #[tokio::test]
    async fn test_bad_requests() {
        let (_, app) = test_app();

        let response = app
            .clone()
            .oneshot(request(
                Method::GET,
                "/api/v1/pipelines/p1/datapoints",
                Body::empty(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(request(
                Method::GET,
                "/api/v1/pipelines/p1/datapoints?consumer=c1&limit=0",
                Body::empty(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = app
            .clone()
            .oneshot(request(Method::POST, "/api/v1/pipelines", "{not json"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["status"], "error");

        let response = app
            .oneshot(request(
                Method::GET,
                "/api/v1/pipelines/ghost/statistics",
                Body::empty(),
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_push_after_shutdown_is_server_error() {
        let (broker, app) = test_app();
        broker.shutdown().await;
        let response = app
            .oneshot(request(Method::POST, "/api/v1/pipelines/p1/datapoints", "x"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
