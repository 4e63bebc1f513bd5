use std::net::SocketAddr;

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use serde::Serialize;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{auth, state::AppState};

pub fn build_app(state: AppState) -> Router {
    Router::new()
        .nest(
            "/api",
            Router::new()
                .merge(auth::router(&state))
                .route("/status", get(status)),
        )
        .with_state(state)
        // Mirrors the request origin and allows credentials so the session
        // cookie works cross-origin.
        .layer(CorsLayer::very_permissive())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    let method = req.method().clone();
                    let uri = req.uri().clone();
                    tracing::info_span!("http_request", %method, uri = %uri, status = tracing::field::Empty)
                })
                .on_response(
                    |res: &axum::http::Response<_>,
                     latency: std::time::Duration,
                     span: &tracing::Span| {
                        let status = res.status();
                        span.record("status", tracing::field::display(status));
                        if status.is_server_error() {
                            tracing::error!(%status, ?latency, "response");
                        } else {
                            tracing::info!(%status, ?latency, "response");
                        }
                    },
                ),
        )
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub server: &'static str,
    pub database: &'static str,
}

/// Liveness plus a storage round trip. 503 when storage is unreachable.
async fn status(State(state): State<AppState>) -> (StatusCode, Json<StatusResponse>) {
    match state.credentials.ping().await {
        Ok(()) => (
            StatusCode::OK,
            Json(StatusResponse {
                server: "running",
                database: "connected",
            }),
        ),
        Err(e) => {
            tracing::error!(error = %e, "storage ping failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(StatusResponse {
                    server: "running",
                    database: "unreachable",
                }),
            )
        }
    }
}

pub async fn serve(app: Router, addr: SocketAddr) -> anyhow::Result<()> {
    tracing::info!("listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
