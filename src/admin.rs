use axum::{
    Json, Router,
    extract::{ConnectInfo, Path, Request, State, rejection::JsonRejection},
    http::StatusCode,
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get},
};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::{
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::{Instant, SystemTime},
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tower_http::cors::CorsLayer;
use tracing::{error, info, warn};

use crate::error::{Result, StoreError};
use crate::records::{Record, RecordStore};

/// Body of every records endpoint: the set after the request, plus an
/// error message when the request did not fully succeed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordsResponse {
    pub entries: Vec<Record>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// A missing field reads as empty and fails validation like any other bad value.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AddRecordRequest {
    pub name: String,
    pub ip: String,
}

/// Admin HTTP server: list, add and delete records
pub struct AdminServer {
    store: Arc<RecordStore>,
    server_name: String,
}

#[derive(Clone)]
struct AppState {
    store: Arc<RecordStore>,
    server_name: Arc<str>,
    startup_time: SystemTime,
}

impl AdminServer {
    pub fn new(store: Arc<RecordStore>, server_name: impl Into<String>) -> Self {
        Self {
            store,
            server_name: server_name.into(),
        }
    }

    pub fn router(&self) -> Router {
        let app_state = AppState {
            store: self.store.clone(),
            server_name: Arc::from(self.server_name.as_str()),
            startup_time: SystemTime::now(),
        };

        Router::new()
            .route("/health", get(health_check))
            .route("/records", get(list_records).post(add_record))
            .route("/records/{name}", delete(delete_record))
            .with_state(app_state)
            .layer(middleware::from_fn(log_request))
            .layer(CorsLayer::permissive())
    }

    /// Serve on `listener` until a shutdown signal arrives, then drain
    /// in-flight requests.
    pub async fn serve(
        self,
        listener: TcpListener,
        mut shutdown_rx: broadcast::Receiver<()>,
    ) -> Result<()> {
        info!("Admin HTTP server listening on {}", listener.local_addr()?);

        let app = self.router();
        axum::serve(
            listener,
            app.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .with_graceful_shutdown(async move {
            let _ = shutdown_rx.recv().await;
            info!("Admin HTTP server received shutdown signal");
        })
        .await?;

        Ok(())
    }
}

/// Access log line per request
async fn log_request(request: Request, next: Next) -> Response {
    let remote = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.to_string())
        .unwrap_or_else(|| "-".to_string());
    let method = request.method().clone();
    let path = request.uri().path().to_string();
    let version = request.version();
    let started = Instant::now();

    let response = next.run(request).await;

    info!(
        "{} \"{} {} {:?}\" {} {}ms",
        remote,
        method,
        path,
        version,
        response.status().as_u16(),
        started.elapsed().as_millis()
    );
    response
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "server": &*state.server_name,
            "version": env!("CARGO_PKG_VERSION"),
            "records": state.store.len(),
            "uptime_seconds": SystemTime::now()
                .duration_since(state.startup_time)
                .unwrap_or_default()
                .as_secs()
        })),
    )
}

async fn list_records(State(state): State<AppState>) -> impl IntoResponse {
    Json(RecordsResponse {
        entries: state.store.list(),
        error: None,
    })
}

async fn add_record(
    State(state): State<AppState>,
    request: std::result::Result<Json<AddRecordRequest>, JsonRejection>,
) -> impl IntoResponse {
    let request = match request {
        Ok(Json(request)) => request,
        Err(rejection) => {
            warn!("Rejected record request: {}", rejection.body_text());
            return failure(&state, StatusCode::BAD_REQUEST, rejection.body_text());
        }
    };

    let ip = match request.ip.trim().parse::<IpAddr>() {
        Ok(ip) => ip,
        Err(_) => {
            warn!("Rejected record {:?}: invalid IP {:?}", request.name, request.ip);
            return failure(
                &state,
                StatusCode::BAD_REQUEST,
                format!("invalid IP: {:?}", request.ip),
            );
        }
    };

    let store = state.store.clone();
    let name = request.name;
    let result = tokio::task::spawn_blocking(move || store.add(&name, ip)).await;
    mutation_response(&state, result)
}

async fn delete_record(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> impl IntoResponse {
    let store = state.store.clone();
    let result = tokio::task::spawn_blocking(move || store.delete(&name)).await;
    mutation_response(&state, result)
}

fn mutation_response(
    state: &AppState,
    result: std::result::Result<
        std::result::Result<Vec<Record>, StoreError>,
        tokio::task::JoinError,
    >,
) -> (StatusCode, Json<RecordsResponse>) {
    match result {
        Ok(Ok(entries)) => (
            StatusCode::OK,
            Json(RecordsResponse {
                entries,
                error: None,
            }),
        ),
        Ok(Err(e @ StoreError::Validation(_))) => {
            failure(state, StatusCode::BAD_REQUEST, e.to_string())
        }
        Ok(Err(e @ StoreError::Persist(_))) => {
            error!("Record change not persisted: {}", e);
            failure(state, StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        }
        Err(e) => {
            error!("Record mutation task failed: {}", e);
            failure(
                state,
                StatusCode::INTERNAL_SERVER_ERROR,
                "record change failed".to_string(),
            )
        }
    }
}

fn failure(
    state: &AppState,
    status: StatusCode,
    message: String,
) -> (StatusCode, Json<RecordsResponse>) {
    (
        status,
        Json(RecordsResponse {
            entries: state.store.list(),
            error: Some(message),
        }),
    )
}
