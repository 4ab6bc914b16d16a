use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tower_http::trace::TraceLayer;

use common::{
    AckRequest, AckResponse, FetchTaskResponse, HeartbeatResponse, JobStatus,
    RegisterAggregateInputRequest, RegisterAggregateInputResponse, TaskKey,
};

use crate::{
    control::Coordinator,
    error::{CoordinatorError, Result},
};

pub fn build_router(coordinator: Coordinator) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/v1/tasks/fetch", post(fetch_task))
        .route("/api/v1/tasks/ack", post(acknowledge))
        .route("/api/v1/aggregate-inputs", post(register_aggregate_input))
        .route("/api/v1/heartbeat", get(heartbeat))
        .route("/api/v1/job", get(job_status))
        .layer(TraceLayer::new_for_http())
        .with_state(coordinator)
}

/* ---------------- handlers HTTP ---------------- */

async fn health() -> &'static str {
    "ok"
}

// Long poll: responde cuando hay una tarea
async fn fetch_task(State(coordinator): State<Coordinator>) -> Result<Json<FetchTaskResponse>> {
    // En una tarea aparte: si el worker corta la conexión después de que la
    // tarea salió de la cola, igual queda registrada y su lease la recupera.
    let task = tokio::spawn(async move { coordinator.fetch_task().await })
        .await
        .map_err(|e| CoordinatorError::Internal(e.to_string()))?;

    Ok(Json(FetchTaskResponse { task }))
}

async fn acknowledge(
    State(coordinator): State<Coordinator>,
    Json(req): Json<AckRequest>,
) -> Result<Json<AckResponse>> {
    coordinator.acknowledge(TaskKey::new(req.kind, req.id)).await?;
    Ok(Json(AckResponse { ok: true }))
}

async fn register_aggregate_input(
    State(coordinator): State<Coordinator>,
    Json(req): Json<RegisterAggregateInputRequest>,
) -> Result<Json<RegisterAggregateInputResponse>> {
    coordinator
        .register_aggregate_input(&req.source, req.bucket, req.location)
        .await?;
    Ok(Json(RegisterAggregateInputResponse { ok: true }))
}

async fn heartbeat(State(coordinator): State<Coordinator>) -> Json<HeartbeatResponse> {
    Json(HeartbeatResponse {
        healthy: coordinator.heartbeat().await,
    })
}

async fn job_status(State(coordinator): State<Coordinator>) -> Json<JobStatus> {
    Json(coordinator.status().await)
}
