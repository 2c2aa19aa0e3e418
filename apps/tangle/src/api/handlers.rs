//! # API Endpoint Handlers
//!
//! This module implements the actual HTTP endpoint handlers.
//!
//! Mutations and whole-graph computations hold the exclusive guard for the
//! whole call; point lookups share the read guard.

use super::{
    AppState,
    types::{
        AddNodeRequest, ApproveRequest, CheckpointRequest, CheckpointResponse, HealthResponse,
        NodeListResponse, NodeResponse, StatusResponse, TipSelectionQuery, TipsResponse,
        ValidationResponse,
    },
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use std::time::Instant;
use tangle_core::{Clock, ErrorKind, NodeId, NodeRepository, SystemClock, TangleError, WalkParams};

// =============================================================================
// ERROR MAPPING
// =============================================================================

/// HTTP status for an engine error.
pub fn error_status(err: &TangleError) -> StatusCode {
    match err.kind() {
        ErrorKind::Conflict => StatusCode::CONFLICT,
        ErrorKind::Validation => StatusCode::BAD_REQUEST,
        ErrorKind::NotFound | ErrorKind::EmptyGraph => StatusCode::NOT_FOUND,
        ErrorKind::ResourceExceeded => StatusCode::UNPROCESSABLE_ENTITY,
        ErrorKind::Storage => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn node_error(context: &str, err: &TangleError) -> (StatusCode, Json<NodeResponse>) {
    let status = error_status(err);
    if status.is_server_error() {
        tracing::error!("{}: {}", context, err);
    } else {
        tracing::debug!("{}: {}", context, err);
    }
    (status, Json(NodeResponse::error(err.to_string())))
}

/// Bare `{"error": ...}` body for endpoints without a response envelope.
fn error_body(err: &TangleError) -> Response {
    (
        error_status(err),
        Json(serde_json::json!({ "error": err.to_string() })),
    )
        .into_response()
}

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// STATUS HANDLER
// =============================================================================

/// Get graph status.
pub async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    let tangle = state.shared().await;

    let summary = tangle.node_count().and_then(|count| {
        let tips = tangle.tips()?.len();
        let latest = tangle.store().get_latest_checkpoint()?.map(|cp| cp.id);
        Ok((count, tips, latest))
    });

    match summary {
        Ok((node_count, tip_count, latest_checkpoint)) => (
            StatusCode::OK,
            Json(StatusResponse {
                backend: tangle.store().name().to_string(),
                node_count,
                tip_count,
                latest_checkpoint,
            }),
        )
            .into_response(),
        Err(e) => error_body(&e),
    }
}

// =============================================================================
// NODE MUTATION HANDLERS
// =============================================================================

/// Admit a record with no parents.
pub async fn add_node_handler(
    State(state): State<AppState>,
    Json(request): Json<AddNodeRequest>,
) -> impl IntoResponse {
    let mut tangle = state.exclusive().await;
    match tangle.add_node(NodeId::new(request.id)) {
        Ok(node) => {
            tracing::info!(node = %node.id, "Node added");
            (StatusCode::CREATED, Json(NodeResponse::success(&node)))
        }
        Err(e) => node_error("Add node failed", &e),
    }
}

/// Admit a record approving existing records.
pub async fn approve_node_handler(
    State(state): State<AppState>,
    Json(request): Json<ApproveRequest>,
) -> impl IntoResponse {
    let parents = request.parents.into_iter().map(NodeId::new).collect();

    let mut tangle = state.exclusive().await;
    match tangle.approve_node(NodeId::new(request.id), parents) {
        Ok(approval) => {
            tracing::info!(
                node = %approval.node.id,
                parents = approval.node.parents.len(),
                "Node approved"
            );
            (
                StatusCode::CREATED,
                Json(NodeResponse::with_warnings(&approval.node, &approval.warnings)),
            )
        }
        Err(e) => node_error("Approve node failed", &e),
    }
}

// =============================================================================
// NODE QUERY HANDLERS
// =============================================================================

/// Record with the most direct approvals.
pub async fn highest_weight_handler(State(state): State<AppState>) -> impl IntoResponse {
    let tangle = state.exclusive().await;
    match tangle.highest_weight_node() {
        Ok(node) => (StatusCode::OK, Json(NodeResponse::success(&node))),
        Err(e) => node_error("Highest weight query failed", &e),
    }
}

/// Record with the highest cumulative weight.
pub async fn highest_cumulative_weight_handler(
    State(state): State<AppState>,
) -> impl IntoResponse {
    let tangle = state.exclusive().await;
    match tangle.highest_cumulative_weight_node() {
        Ok(node) => (StatusCode::OK, Json(NodeResponse::success(&node))),
        Err(e) => node_error("Highest cumulative weight query failed", &e),
    }
}

/// Select a tip with the MCMC walk.
pub async fn tip_selection_handler(
    State(state): State<AppState>,
    Query(query): Query<TipSelectionQuery>,
) -> impl IntoResponse {
    let params = WalkParams::new(
        query.alpha.unwrap_or(state.walk.alpha),
        query.max_steps.unwrap_or(state.walk.max_steps),
    );

    let mut tangle = state.exclusive().await;
    match tangle.select_tip(params) {
        Ok(node) => {
            tracing::info!(node = %node.id, "Tip selected");
            (StatusCode::OK, Json(NodeResponse::success(&node)))
        }
        Err(e) => node_error("Tip selection failed", &e),
    }
}

/// List every record in id order.
pub async fn list_nodes_handler(State(state): State<AppState>) -> impl IntoResponse {
    let tangle = state.shared().await;
    match tangle.get_all_nodes() {
        Ok(nodes) => (StatusCode::OK, Json(NodeListResponse::success(&nodes))),
        Err(e) => (
            error_status(&e),
            Json(NodeListResponse::error(e.to_string())),
        ),
    }
}

/// List the current tips.
pub async fn tips_handler(State(state): State<AppState>) -> impl IntoResponse {
    let tangle = state.shared().await;
    match tangle.tips() {
        Ok(tips) => (
            StatusCode::OK,
            Json(TipsResponse {
                success: true,
                tips: tips.iter().map(ToString::to_string).collect(),
                error: None,
            }),
        ),
        Err(e) => (
            error_status(&e),
            Json(TipsResponse {
                success: false,
                tips: vec![],
                error: Some(e.to_string()),
            }),
        ),
    }
}

/// Fetch one record.
pub async fn get_node_handler(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> impl IntoResponse {
    let tangle = state.shared().await;
    match tangle.get_node(&NodeId::new(id)) {
        Ok(node) => (StatusCode::OK, Json(NodeResponse::success(&node))),
        Err(e) => node_error("Get node failed", &e),
    }
}

// =============================================================================
// CONSISTENCY HANDLER
// =============================================================================

/// Recompute cumulative weights and report drift.
///
/// Returns 200 when consistent and 409 when any record has drifted.
pub async fn validate_handler(State(state): State<AppState>) -> impl IntoResponse {
    let tangle = state.exclusive().await;
    let started = Instant::now();
    let validation_time = SystemClock.now_ms();
    tracing::info!("Consistency validation started");

    match tangle.validate_consistency() {
        Ok(report) => {
            let duration_micros = u64::try_from(started.elapsed().as_micros()).unwrap_or(u64::MAX);
            let response = ValidationResponse::from_report(&report, validation_time, duration_micros);
            tracing::info!(
                total_nodes = report.total_nodes,
                valid_nodes = report.valid_nodes,
                inconsistencies = report.mismatches.len(),
                "Consistency validation completed"
            );

            let status = if report.is_consistent() {
                StatusCode::OK
            } else {
                StatusCode::CONFLICT
            };
            (status, Json(response)).into_response()
        }
        Err(e) => {
            tracing::error!("Consistency validation failed: {}", e);
            error_body(&e)
        }
    }
}

// =============================================================================
// CHECKPOINT HANDLERS
// =============================================================================

/// Create a checkpoint of the current record set.
pub async fn create_checkpoint_handler(
    State(state): State<AppState>,
    Json(request): Json<CheckpointRequest>,
) -> impl IntoResponse {
    let mut tangle = state.exclusive().await;
    match tangle.create_checkpoint(&request.id) {
        Ok(checkpoint) => {
            tracing::info!(checkpoint = %checkpoint.id, nodes = checkpoint.node_count, "Checkpoint created");
            (StatusCode::CREATED, Json(CheckpointResponse::success(checkpoint)))
        }
        Err(e) => (
            error_status(&e),
            Json(CheckpointResponse::error(e.to_string())),
        ),
    }
}

/// Most recent checkpoint.
pub async fn latest_checkpoint_handler(State(state): State<AppState>) -> impl IntoResponse {
    let tangle = state.shared().await;
    match tangle.latest_checkpoint() {
        Ok(checkpoint) => (StatusCode::OK, Json(CheckpointResponse::success(checkpoint))),
        Err(e) => (
            error_status(&e),
            Json(CheckpointResponse::error(e.to_string())),
        ),
    }
}
