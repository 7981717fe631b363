//! HTTP surface over the dispatcher.
//!
//! - `GET  /health`       liveness
//! - `GET  /agents`       allowlisted agent names
//! - `POST /run/{agent}`  queue a job; body is the payload
//! - `GET  /jobs/{id}`    poll a job

use axum::{
    Json, Router,
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;

use crate::dispatch::Dispatcher;
use crate::error::SubmitError;
use crate::job::{JobId, JobStatus};

pub const SERVICE_NAME: &str = "agent-gateway";

/// Body of a `202 Accepted` reply.
#[derive(Debug, Serialize)]
pub struct Accepted {
    pub job_id: JobId,
    pub agent: String,
    pub status: JobStatus,
}

pub fn router(dispatcher: Arc<Dispatcher>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/agents", get(list_agents))
        .route("/run/{agent}", post(run_agent))
        .route("/jobs/{id}", get(get_job))
        .with_state(dispatcher)
}

fn error(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "ok": true, "service": SERVICE_NAME }))
}

async fn list_agents(State(dispatcher): State<Arc<Dispatcher>>) -> Json<serde_json::Value> {
    Json(json!({ "agents": dispatcher.registry().names() }))
}

async fn run_agent(
    State(dispatcher): State<Arc<Dispatcher>>,
    Path(agent): Path<String>,
    body: Bytes,
) -> Response {
    match dispatcher.submit(&agent, body.to_vec()) {
        Ok(job) => (
            StatusCode::ACCEPTED,
            Json(Accepted {
                job_id: job.id,
                agent: job.agent,
                status: job.status,
            }),
        )
            .into_response(),
        Err(e @ SubmitError::EmptyPayload) => error(StatusCode::BAD_REQUEST, &e.to_string()),
    }
}

async fn get_job(State(dispatcher): State<Arc<Dispatcher>>, Path(id): Path<String>) -> Response {
    let Ok(id) = id.parse::<JobId>() else {
        return error(StatusCode::NOT_FOUND, "not found");
    };
    match dispatcher.job(id) {
        Some(job) => Json(job).into_response(),
        None => error(StatusCode::NOT_FOUND, "not found"),
    }
}
