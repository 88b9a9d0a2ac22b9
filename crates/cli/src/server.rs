//! HTTP trigger layer
//!
//! `POST /sync` runs one reconciliation. Runs never overlap: a second
//! request waits until the running one finished, including runs whose
//! request was dropped mid-way.

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use tablesync_runner::{Reconciler, SourceClient, TargetClient};
use tokio::sync::Mutex;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

/// Shared state of all handlers.
pub struct AppState {
    source: Arc<dyn SourceClient>,
    target: Arc<dyn TargetClient>,
    reconciler: Reconciler,
    run_lock: Arc<Mutex<()>>,
}

impl AppState {
    pub fn new(
        source: Arc<dyn SourceClient>,
        target: Arc<dyn TargetClient>,
        reconciler: Reconciler,
    ) -> Self {
        Self {
            source,
            target,
            reconciler,
            run_lock: Arc::new(Mutex::new(())),
        }
    }
}

/// Error body `{"error": "..."}` with status 500.
struct ApiError(String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(json!({ "error": self.0 })),
        )
            .into_response()
    }
}

pub fn router(state: Arc<AppState>, cors: bool) -> Router {
    let router = Router::new()
        .route("/", get(banner))
        .route("/sync", post(trigger_sync))
        .route("/source/:collection", get(source_records))
        .route("/target/items", get(target_items))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if cors {
        router.layer(CorsLayer::permissive())
    } else {
        router
    }
}

/// Serves `router` until Ctrl-C.
pub async fn serve(router: Router, port: u16) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Listening");

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutting down");
}

async fn banner() -> &'static str {
    "tablesync is running. POST /sync to reconcile.\n"
}

async fn trigger_sync(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let running = Arc::clone(&state.run_lock).lock_owned().await;

    // The run owns the lock, so it stays held even when this request goes away
    let run_state = Arc::clone(&state);
    let handle = tokio::spawn(async move {
        let _running = running;
        run_state.reconciler.run().await
    });

    match handle.await {
        Ok(Ok(report)) => Ok(Json(json!({ "report": report }))),
        Ok(Err(e)) => Err(ApiError(e.to_string())),
        Err(e) => {
            tracing::error!(error = %e, "Sync task failed");
            Err(ApiError(format!("Sync task failed: {e}")))
        }
    }
}

async fn source_records(
    State(state): State<Arc<AppState>>,
    Path(collection): Path<String>,
) -> Result<Json<serde_json::Value>, ApiError> {
    match state.source.fetch_records(&collection).await {
        Ok(records) => Ok(Json(json!(records))),
        Err(e) => {
            tracing::error!(%collection, error = %e, "Failed to fetch source records");
            Err(ApiError(format!("Failed to fetch records from {collection}")))
        }
    }
}

async fn target_items(
    State(state): State<Arc<AppState>>,
) -> Result<Json<serde_json::Value>, ApiError> {
    match state.target.fetch_items().await {
        Ok(items) => Ok(Json(json!(items))),
        Err(e) => {
            tracing::error!(error = %e, "Failed to fetch target items");
            Err(ApiError("Failed to fetch target items".to_string()))
        }
    }
}
