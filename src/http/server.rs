use super::health::{liveness, readiness};
use super::state::HttpServerState;
use super::status::collector_status;
use super::websocket::device_updates;
use crate::config;
use anyhow::Result;
use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::header;
use axum::routing::get;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::trace;
use tower_http::{ServiceBuilderExt, timeout::TimeoutLayer, trace::TraceLayer};
use tracing::Level;

pub fn build_app(state: HttpServerState) -> Router {
    Router::new()
        .route("/", get(frontpage))
        .route("/health/live", get(liveness))
        .route("/health/ready", get(readiness))
        .route("/api/collector/status", get(collector_status))
        .route("/api/ws/devices/{device_id}", get(device_updates))
        .with_state(state)
}

pub async fn run_http_server(
    state: HttpServerState,
    address: SocketAddr,
    shutdown: CancellationToken,
) -> Result<()> {
    let config = config::get()?;
    let timeout_seconds = config.http_server_timeout_seconds;

    // List of headers that shouldn't be logged
    let sensitive_headers: Arc<[_]> = vec![header::AUTHORIZATION, header::COOKIE].into();

    // The timeout does not apply to upgraded WebSocket connections.
    let middleware = ServiceBuilder::new()
        .sensitive_request_headers(sensitive_headers.clone())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(trace::DefaultMakeSpan::new().level(Level::INFO))
                .on_response(trace::DefaultOnResponse::new().level(Level::INFO)),
        )
        .sensitive_response_headers(sensitive_headers)
        .layer(TimeoutLayer::new(Duration::from_secs(timeout_seconds)))
        .into_inner();

    let app = build_app(state).layer(middleware);

    let listener = tokio::net::TcpListener::bind(address).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await?;

    Ok(())
}

async fn frontpage(State(state): State<HttpServerState>) -> Json<String> {
    Json((*state.name).clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::FanoutRegistry;
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode};
    use tower::ServiceExt;

    #[tokio::test]
    async fn test_frontpage() {
        let state = HttpServerState::new("pv3 test", Arc::new(FanoutRegistry::new()));
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();

        let response = build_app(state).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let body = to_bytes(response.into_body(), 128).await.unwrap();
        assert_eq!(body, "\"pv3 test\"");
    }

    #[tokio::test]
    async fn test_status_without_collector() {
        let state = HttpServerState::new("pv3 test", Arc::new(FanoutRegistry::new()));
        let request = Request::builder()
            .uri("/api/collector/status")
            .body(Body::empty())
            .unwrap();

        let response = build_app(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
