use crate::core::{ApiRequest, CoreStatus, DaemonEvent};
use crate::logging::LogBuffer;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use segskip_core::config::{ConfigStore, ConfigValue};
use segskip_core::error::ConfigError;
use segskip_core::segments::Segment;
use serde::Deserialize;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{mpsc, oneshot};
use tower_http::cors::CorsLayer;
use tracing::{error, info};

#[derive(Clone)]
pub struct HttpState {
    config: Arc<ConfigStore>,
    logs: LogBuffer,
    event_tx: mpsc::Sender<DaemonEvent>,
}

impl HttpState {
    pub fn new(config: Arc<ConfigStore>, logs: LogBuffer, event_tx: mpsc::Sender<DaemonEvent>) -> Self {
        Self {
            config,
            logs,
            event_tx,
        }
    }
}

#[derive(Deserialize)]
struct OpenRequest {
    url: String,
}

type ApiError = (StatusCode, String);

pub fn router(state: HttpState) -> Router {
    Router::new()
        .route("/api/state", get(get_state))
        .route("/api/skip", post(skip))
        .route("/api/config/:key", get(get_config).post(set_config))
        .route("/api/logs", get(get_logs))
        .route("/api/open", post(open))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

pub fn start_server(bind_address: String, port: u16, state: HttpState) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let addr = format!("{}:{}", bind_address, port);
        let listener = match TcpListener::bind(&addr).await {
            Ok(l) => l,
            Err(e) => {
                error!("Failed to bind HTTP server to {}: {}", addr, e);
                return;
            }
        };

        info!("HTTP API server listening on http://{}", addr);

        if let Err(e) = axum::serve(listener, router(state)).await {
            error!("HTTP server error: {}", e);
        }
    })
}

/// Hand a request to the core loop and wait for its answer.
async fn ask<T>(
    state: &HttpState,
    make: impl FnOnce(oneshot::Sender<T>) -> ApiRequest,
) -> Result<T, ApiError> {
    let (tx, rx) = oneshot::channel();
    let unavailable = || {
        (
            StatusCode::SERVICE_UNAVAILABLE,
            "daemon is shutting down".to_string(),
        )
    };
    state
        .event_tx
        .send(DaemonEvent::Api(make(tx)))
        .await
        .map_err(|_| unavailable())?;
    rx.await.map_err(|_| unavailable())
}

async fn get_state(State(state): State<HttpState>) -> Result<Json<CoreStatus>, ApiError> {
    ask(&state, ApiRequest::Status).await.map(Json)
}

async fn skip(State(state): State<HttpState>) -> Result<Json<Segment>, ApiError> {
    info!("HTTP API: manual skip");
    match ask(&state, ApiRequest::Skip).await? {
        Some(segment) => Ok(Json(segment)),
        None => Err((
            StatusCode::NOT_FOUND,
            "no segment at the current position".to_string(),
        )),
    }
}

fn config_error(e: ConfigError) -> ApiError {
    let status = match e {
        ConfigError::UnknownKey(_) => StatusCode::NOT_FOUND,
        ConfigError::TypeMismatch { .. } => StatusCode::BAD_REQUEST,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    };
    (status, e.to_string())
}

async fn get_config(
    State(state): State<HttpState>,
    Path(key): Path<String>,
) -> Result<Json<ConfigValue>, ApiError> {
    state.config.read(&key).map(Json).map_err(config_error)
}

async fn set_config(
    State(state): State<HttpState>,
    Path(key): Path<String>,
    Json(value): Json<ConfigValue>,
) -> Result<Json<ConfigValue>, ApiError> {
    info!("HTTP API: set {} = {:?}", key, value);
    state.config.write(&key, value).map_err(config_error)?;
    state.config.read(&key).map(Json).map_err(config_error)
}

async fn get_logs(State(state): State<HttpState>) -> Json<Vec<String>> {
    Json(state.logs.snapshot())
}

async fn open(
    State(state): State<HttpState>,
    Json(req): Json<OpenRequest>,
) -> Result<StatusCode, ApiError> {
    info!("HTTP API: open {}", req.url);
    let url = req.url;
    ask(&state, |reply| ApiRequest::Open { url, reply })
        .await?
        .map(|_| StatusCode::OK)
        .map_err(|e| (StatusCode::BAD_GATEWAY, e.to_string()))
}
