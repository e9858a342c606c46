//! HTTP route handlers.

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::Json,
    routing::{get, post},
    Router,
};
use chrono::NaiveDate;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::llm::{CompletionClient, LlmError, YandexGptClient};
use crate::store::{self, StoreError, Task, TaskStore};
use crate::task::{TaskError, TaskExtractor, TaskSplitter};

use super::types::*;

/// Shared application state.
pub struct AppState {
    /// Task persistence
    pub store: Arc<dyn TaskStore>,
    /// Text -> tasks
    pub extractor: TaskExtractor,
    /// Task -> subtasks
    pub splitter: TaskSplitter,
}

impl AppState {
    /// Wire the services from `config` around an existing client and store.
    pub fn new(
        config: &Config,
        client: Arc<dyn CompletionClient>,
        store: Arc<dyn TaskStore>,
    ) -> Self {
        let extractor = TaskExtractor::new(Arc::clone(&client))
            .with_strategy(config.extract_parse)
            .with_policy(config.extract_policy);
        let splitter = TaskSplitter::new(client)
            .with_strategy(config.decompose_parse)
            .with_policy(config.decompose_policy);
        Self {
            store,
            extractor,
            splitter,
        }
    }
}

/// Build the application router.
pub fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/energy", get(energy))
        .route("/tasks", get(list_tasks))
        .route("/tasks/split", post(split_text))
        .route("/tasks/decompose", post(decompose))
        .route("/tasks/done", post(mark_done))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Start the HTTP server.
pub async fn serve(config: Config) -> anyhow::Result<()> {
    let client: Arc<dyn CompletionClient> =
        Arc::new(YandexGptClient::new(config.completion.clone())?);
    let store = store::open_store(&config.database).await?;
    tracing::info!("Task store ready (persistent: {})", store.is_persistent());

    let state = Arc::new(AppState::new(&config, client, store));
    let app = build_router(state);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!("Server listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

/// Wait for SIGINT/SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}

fn task_error(e: TaskError) -> (StatusCode, String) {
    match e {
        TaskError::Upstream(e) => upstream_error(e),
        TaskError::Malformed(e) => (
            StatusCode::BAD_GATEWAY,
            format!("Model returned an unusable reply: {}", e),
        ),
    }
}

fn upstream_error(e: LlmError) -> (StatusCode, String) {
    let status = if e.is_timeout() {
        StatusCode::GATEWAY_TIMEOUT
    } else {
        StatusCode::BAD_GATEWAY
    };
    (status, format!("Completion service failed: {}", e))
}

fn store_error(e: StoreError) -> (StatusCode, String) {
    tracing::error!("Task store failure: {}", e);
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "Task storage failed".to_string(),
    )
}

/// Health check endpoint.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        health: "ok".to_string(),
    })
}

/// Extract tasks from text, store them, and return what was extracted.
async fn split_text(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SplitTextRequest>,
) -> Result<Json<TasksResponse>, (StatusCode, String)> {
    if req.text.trim().is_empty() {
        return Err((StatusCode::BAD_REQUEST, "Text cannot be empty".to_string()));
    }

    let tasks = state
        .extractor
        .extract_tasks(&req.text)
        .await
        .map_err(task_error)?;

    state.store.add_tasks(&tasks).await.map_err(store_error)?;
    tracing::info!("Stored {} extracted tasks", tasks.len());

    Ok(Json(TasksResponse { tasks }))
}

/// Split each given task into subtasks.
async fn decompose(
    State(state): State<Arc<AppState>>,
    Json(req): Json<DecomposeRequest>,
) -> Result<Json<DecomposeResponse>, (StatusCode, String)> {
    let subtasks = state
        .splitter
        .split_all_tasks(&req.tasks)
        .await
        .map_err(task_error)?;
    Ok(Json(DecomposeResponse { subtasks }))
}

/// Number of tasks completed today.
async fn energy(
    State(state): State<Arc<AppState>>,
) -> Result<Json<EnergyResponse>, (StatusCode, String)> {
    let energy = state
        .store
        .count_completed_today()
        .await
        .map_err(store_error)?;
    Ok(Json(EnergyResponse { energy }))
}

/// Mark a task completed and return today's energy.
async fn mark_done(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MarkDoneRequest>,
) -> Result<Json<EnergyResponse>, (StatusCode, String)> {
    let found = state
        .store
        .set_completed(req.id)
        .await
        .map_err(store_error)?;
    if !found {
        return Err((
            StatusCode::NOT_FOUND,
            format!("Task {} not found", req.id),
        ));
    }

    let energy = state
        .store
        .count_completed_today()
        .await
        .map_err(store_error)?;
    Ok(Json(EnergyResponse { energy }))
}

/// List all tasks, or one day's tasks with `?date=YYYY-MM-DD`.
async fn list_tasks(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ListTasksQuery>,
) -> Result<Json<Vec<Task>>, (StatusCode, String)> {
    let tasks = match query.date.as_deref() {
        Some(raw) => {
            let date = NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| {
                (
                    StatusCode::BAD_REQUEST,
                    format!("Invalid date '{}': {}", raw, e),
                )
            })?;
            state.store.list_tasks_on(date).await
        }
        None => state.store.list_all_tasks().await,
    }
    .map_err(store_error)?;
    Ok(Json(tasks))
}
