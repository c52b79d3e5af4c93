//! Instance handlers: create, submit, draft edits, decisions, cancel, queries.

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;

use hrflow_core::engine::{CommandOutcome, DecisionOutcome};
use hrflow_types::approval::{InstanceDetail, RecordDecisionRequest};
use hrflow_types::instance::{
    CreateInstanceRequest, InstanceId, InstanceStatus, WorkflowInstance,
};

use super::parse_param;
use crate::http::error::AppError;
use crate::http::extractors::auth::RequestActor;
use crate::http::extractors::query::InstanceListQuery;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

/// Body of `POST /instances/{id}/cancel`.
#[derive(Debug, Deserialize, Default)]
pub struct CancelBody {
    pub reason: Option<String>,
}

/// Query of `GET /instances/awaiting`.
#[derive(Debug, Deserialize, Default)]
pub struct AwaitingQuery {
    /// Approver to look up; defaults to the calling actor.
    pub approver: Option<String>,
}

fn instance_link(id: &InstanceId) -> String {
    format!("/api/v1/instances/{id}")
}

fn command_response(timer: RequestTimer, outcome: CommandOutcome) -> ApiResponse<CommandOutcome> {
    let link = instance_link(&outcome.instance.id);
    let warnings = outcome.warnings.clone();
    timer
        .respond(outcome)
        .with_warnings(warnings)
        .with_link("self", &link)
}

/// POST /api/v1/instances - Start an instance from an active template.
pub async fn create_instance(
    State(state): State<AppState>,
    RequestActor(actor): RequestActor,
    Json(body): Json<CreateInstanceRequest>,
) -> Result<Json<ApiResponse<CommandOutcome>>, AppError> {
    let timer = RequestTimer::start();
    let outcome = state.engine.create_instance(&actor, body).await?;
    Ok(Json(command_response(timer, outcome)))
}

/// GET /api/v1/instances - By requester, or by approver with an optional status.
///
/// Without a selector, lists the caller's own requests.
pub async fn list_instances(
    State(state): State<AppState>,
    RequestActor(actor): RequestActor,
    Query(query): Query<InstanceListQuery>,
) -> Result<Json<ApiResponse<Vec<WorkflowInstance>>>, AppError> {
    let timer = RequestTimer::start();
    let instances = match (&query.requester, &query.approver) {
        (Some(_), Some(_)) => {
            return Err(AppError::Validation(
                "use either 'requester' or 'approver', not both".to_string(),
            ));
        }
        (None, Some(approver)) => {
            let status = query
                .status
                .as_deref()
                .map(|s| s.parse::<InstanceStatus>().map_err(AppError::Validation))
                .transpose()?;
            state
                .engine
                .list_by_approver(&actor, approver, status)
                .await?
        }
        (Some(requester), None) => state.engine.list_by_requester(&actor, requester).await?,
        (None, None) => state.engine.list_by_requester(&actor, &actor.id).await?,
    };
    Ok(Json(
        timer
            .respond(instances)
            .with_link("self", "/api/v1/instances"),
    ))
}

/// GET /api/v1/instances/awaiting - Pending instances waiting on an approver.
pub async fn list_awaiting(
    State(state): State<AppState>,
    RequestActor(actor): RequestActor,
    Query(query): Query<AwaitingQuery>,
) -> Result<Json<ApiResponse<Vec<WorkflowInstance>>>, AppError> {
    let timer = RequestTimer::start();
    let approver = query.approver.unwrap_or_else(|| actor.id.clone());
    let instances = state.engine.list_awaiting_decision(&actor, &approver).await?;
    Ok(Json(timer.respond(instances)))
}

/// GET /api/v1/instances/{id} - Instance, records and per-step status.
pub async fn get_instance(
    State(state): State<AppState>,
    RequestActor(actor): RequestActor,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<InstanceDetail>>, AppError> {
    let timer = RequestTimer::start();
    let id: InstanceId = parse_param(&id, "instance id")?;
    let detail = state.engine.get_instance_detail(&actor, &id).await?;
    Ok(Json(
        timer
            .respond(detail)
            .with_link("self", &instance_link(&id))
            .with_link("decisions", &format!("{}/decisions", instance_link(&id))),
    ))
}

/// PUT /api/v1/instances/{id}/payload - Replace a draft's payload.
pub async fn update_draft(
    State(state): State<AppState>,
    RequestActor(actor): RequestActor,
    Path(id): Path<String>,
    Json(payload): Json<serde_json::Value>,
) -> Result<Json<ApiResponse<WorkflowInstance>>, AppError> {
    let timer = RequestTimer::start();
    let id: InstanceId = parse_param(&id, "instance id")?;
    let instance = state.engine.update_draft(&actor, &id, &payload).await?;
    Ok(Json(timer.respond(instance).with_link("self", &instance_link(&id))))
}

/// POST /api/v1/instances/{id}/submit - Draft to Pending.
pub async fn submit_instance(
    State(state): State<AppState>,
    RequestActor(actor): RequestActor,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<CommandOutcome>>, AppError> {
    let timer = RequestTimer::start();
    let id: InstanceId = parse_param(&id, "instance id")?;
    let outcome = state.engine.submit_instance(&actor, &id).await?;
    Ok(Json(command_response(timer, outcome)))
}

/// POST /api/v1/instances/{id}/cancel
pub async fn cancel_instance(
    State(state): State<AppState>,
    RequestActor(actor): RequestActor,
    Path(id): Path<String>,
    body: Option<Json<CancelBody>>,
) -> Result<Json<ApiResponse<CommandOutcome>>, AppError> {
    let timer = RequestTimer::start();
    let id: InstanceId = parse_param(&id, "instance id")?;
    let reason = body.and_then(|Json(b)| b.reason);
    let outcome = state
        .engine
        .cancel_instance(&actor, &id, reason.as_deref())
        .await?;
    Ok(Json(command_response(timer, outcome)))
}

/// POST /api/v1/instances/{id}/decisions - Record a decision on the active step.
pub async fn record_decision(
    State(state): State<AppState>,
    RequestActor(actor): RequestActor,
    Path(id): Path<String>,
    Json(body): Json<RecordDecisionRequest>,
) -> Result<Json<ApiResponse<DecisionOutcome>>, AppError> {
    let timer = RequestTimer::start();
    let id: InstanceId = parse_param(&id, "instance id")?;
    let outcome = state.engine.record_decision(&actor, &id, &body).await?;
    let warnings = outcome.warnings.clone();
    Ok(Json(
        timer
            .respond(outcome)
            .with_warnings(warnings)
            .with_link("instance", &instance_link(&id)),
    ))
}
