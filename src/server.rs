//! Stateless HTTP API over [`Scout`](crate::tools::session::Scout).

use axum::{
    extract::State,
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::core::error::{AnswerError, ExtractionError};
use crate::core::types::{
    AnswerBody, AnswerResponse, ErrorResponse, ExtractBody, ExtractResponse, FetchBody,
    FetchResponse,
};
use crate::tools::session::OpenError;
use crate::AppState;

type ApiError = (StatusCode, Json<ErrorResponse>);

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .route("/v1/fetch", post(fetch_handler))
        .route("/v1/extract", post(extract_handler))
        .route("/v1/answer", post(answer_handler))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind `0.0.0.0:{port}` and serve until Ctrl-C / SIGTERM.
pub async fn serve(state: Arc<AppState>, port: u16) -> std::io::Result<()> {
    let bind_addr = format!("0.0.0.0:{}", port);
    let listener = match tokio::net::TcpListener::bind(&bind_addr).await {
        Ok(l) => l,
        Err(e) if e.kind() == std::io::ErrorKind::AddrInUse => {
            return Err(std::io::Error::new(
                std::io::ErrorKind::AddrInUse,
                port_in_use_hint(&bind_addr, port),
            ))
        }
        Err(e) => return Err(e),
    };
    info!("page-scout listening on http://{}", bind_addr);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("page-scout stopped");
    Ok(())
}

fn port_in_use_hint(bind_addr: &str, port: u16) -> String {
    format!(
        "Address already in use: {}. Stop the existing process or run with --port {} (or set PAGE_SCOUT_PORT).",
        bind_addr,
        port.saturating_add(1)
    )
}

async fn shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).ok();

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {},
            _ = async {
                if let Some(ref mut s) = sigterm {
                    s.recv().await;
                } else {
                    futures::future::pending::<()>().await;
                }
            } => {},
        }
    }

    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "service": "page-scout",
        "version": env!("CARGO_PKG_VERSION")
    }))
}

async fn fetch_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<FetchBody>,
) -> Result<Json<FetchResponse>, ApiError> {
    match state.scout.fetch(&request.url).await {
        Ok(page) => Ok(Json(page.into())),
        Err(e) => Err(open_error(e)),
    }
}

async fn extract_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<ExtractBody>,
) -> Result<Json<ExtractResponse>, ApiError> {
    match state.scout.extract(&request.text).await {
        Ok(extraction) => Ok(Json(ExtractResponse {
            extraction: extraction.into_value(),
        })),
        Err(e) => {
            let status = match &e {
                ExtractionError::InsufficientContent { .. }
                | ExtractionError::MalformedExtraction { .. } => StatusCode::UNPROCESSABLE_ENTITY,
                ExtractionError::RemoteServiceError(_) => StatusCode::BAD_GATEWAY,
            };
            warn!("Extract error: {}", e);
            Err(api_error(status, e.to_string(), e.kind(), None))
        }
    }
}

async fn answer_handler(
    State(state): State<Arc<AppState>>,
    Json(request): Json<AnswerBody>,
) -> Result<Json<AnswerResponse>, ApiError> {
    match state.scout.answer(&request.text, &request.question).await {
        Ok(answer) => Ok(Json(AnswerResponse { answer })),
        Err(e) => {
            let status = match &e {
                AnswerError::EmptyQuestion | AnswerError::NoContent => StatusCode::BAD_REQUEST,
                AnswerError::RemoteServiceError(_) => StatusCode::BAD_GATEWAY,
            };
            warn!("Answer error: {}", e);
            Err(api_error(status, e.to_string(), e.kind(), None))
        }
    }
}

fn open_error(e: OpenError) -> ApiError {
    match &e {
        OpenError::Rejected(_) | OpenError::InvalidRequest(_) => {
            warn!("Fetch rejected: {}", e);
            api_error(StatusCode::BAD_REQUEST, e.to_string(), e.kind(), None)
        }
        OpenError::Fetch(f) => {
            error!("Fetch error: {}", e);
            api_error(
                StatusCode::BAD_GATEWAY,
                e.to_string(),
                e.kind(),
                Some(f.attempts_made),
            )
        }
    }
}

fn api_error(status: StatusCode, error: String, kind: &str, attempts: Option<u32>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error,
            kind: kind.to_string(),
            attempts,
        }),
    )
}
