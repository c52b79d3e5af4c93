//! Template handlers: create, list, show, update, deactivate.

use axum::Json;
use axum::extract::{Path, Query, State};

use hrflow_core::repository::template::TemplateFilter;
use hrflow_types::template::{
    CreateTemplateRequest, DomainType, TemplateId, UpdateTemplateRequest, WorkflowTemplate,
};

use super::parse_param;
use crate::http::error::AppError;
use crate::http::extractors::auth::RequestActor;
use crate::http::extractors::query::TemplateListQuery;
use crate::http::response::{ApiResponse, RequestTimer};
use crate::state::AppState;

fn template_link(id: &TemplateId) -> String {
    format!("/api/v1/templates/{id}")
}

/// POST /api/v1/templates - Register a template (admin only).
pub async fn create_template(
    State(state): State<AppState>,
    RequestActor(actor): RequestActor,
    Json(body): Json<CreateTemplateRequest>,
) -> Result<Json<ApiResponse<WorkflowTemplate>>, AppError> {
    let timer = RequestTimer::start();
    let template = state.registry.create_template(&actor, body).await?;
    let link = template_link(&template.id);
    Ok(Json(timer.respond(template).with_link("self", &link)))
}

/// GET /api/v1/templates - List templates, optionally active-only or by domain.
pub async fn list_templates(
    State(state): State<AppState>,
    RequestActor(_actor): RequestActor,
    Query(query): Query<TemplateListQuery>,
) -> Result<Json<ApiResponse<Vec<WorkflowTemplate>>>, AppError> {
    let timer = RequestTimer::start();
    let filter = TemplateFilter {
        active_only: query.active,
        domain: query.domain.map(DomainType::from),
    };
    let templates = state.registry.list_templates(&filter).await?;
    Ok(Json(
        timer
            .respond(templates)
            .with_link("self", "/api/v1/templates"),
    ))
}

/// GET /api/v1/templates/{id}
pub async fn get_template(
    State(state): State<AppState>,
    RequestActor(_actor): RequestActor,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<WorkflowTemplate>>, AppError> {
    let timer = RequestTimer::start();
    let id: TemplateId = parse_param(&id, "template id")?;
    let template = state.registry.get_template(&id).await?;
    Ok(Json(timer.respond(template).with_link("self", &template_link(&id))))
}

/// PUT /api/v1/templates/{id} - Partial update; running instances keep their snapshot.
pub async fn update_template(
    State(state): State<AppState>,
    RequestActor(actor): RequestActor,
    Path(id): Path<String>,
    Json(body): Json<UpdateTemplateRequest>,
) -> Result<Json<ApiResponse<WorkflowTemplate>>, AppError> {
    let timer = RequestTimer::start();
    let id: TemplateId = parse_param(&id, "template id")?;
    let template = state.registry.update_template(&actor, &id, body).await?;
    Ok(Json(timer.respond(template).with_link("self", &template_link(&id))))
}

/// POST /api/v1/templates/{id}/deactivate
pub async fn deactivate_template(
    State(state): State<AppState>,
    RequestActor(actor): RequestActor,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<WorkflowTemplate>>, AppError> {
    let timer = RequestTimer::start();
    let id: TemplateId = parse_param(&id, "template id")?;
    let template = state.registry.deactivate_template(&actor, &id).await?;
    Ok(Json(timer.respond(template).with_link("self", &template_link(&id))))
}
