//! Application error type mapping to HTTP status codes and envelope format.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use hrflow_types::error::{RepositoryError, WorkflowError};

use crate::http::response::ApiResponse;

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    /// Engine and registry errors.
    Workflow(WorkflowError),
    /// Authentication failure.
    Unauthorized(String),
    /// Malformed request (bad id, bad enum value).
    Validation(String),
    /// Generic internal error.
    Internal(String),
}

impl From<WorkflowError> for AppError {
    fn from(e: WorkflowError) -> Self {
        AppError::Workflow(e)
    }
}

impl From<RepositoryError> for AppError {
    fn from(e: RepositoryError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl AppError {
    /// HTTP status and machine-readable code.
    pub fn status_and_code(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::Workflow(e) => match e {
                WorkflowError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
                WorkflowError::UnauthorizedApprover { .. } => {
                    (StatusCode::FORBIDDEN, "UNAUTHORIZED_APPROVER")
                }
                WorkflowError::NotPermitted(_) => (StatusCode::FORBIDDEN, "NOT_PERMITTED"),
                WorkflowError::TemplateNotFound(_) => (StatusCode::NOT_FOUND, "TEMPLATE_NOT_FOUND"),
                WorkflowError::InstanceNotFound(_) => (StatusCode::NOT_FOUND, "INSTANCE_NOT_FOUND"),
                WorkflowError::TemplateInactive(_) => (StatusCode::CONFLICT, "TEMPLATE_INACTIVE"),
                WorkflowError::OutOfOrderStep { .. } => (StatusCode::CONFLICT, "OUT_OF_ORDER_STEP"),
                WorkflowError::InvalidState { .. } => (StatusCode::CONFLICT, "INVALID_STATE"),
                WorkflowError::StaleState(_) => (StatusCode::CONFLICT, "STALE_STATE"),
                WorkflowError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR"),
            },
            AppError::Unauthorized(_) => (StatusCode::UNAUTHORIZED, "UNAUTHORIZED"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR"),
        }
    }

    fn message(&self) -> String {
        match self {
            AppError::Workflow(e) => e.to_string(),
            AppError::Unauthorized(msg) | AppError::Validation(msg) | AppError::Internal(msg) => {
                msg.clone()
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = self.status_and_code();
        if status.is_server_error() {
            tracing::error!(code, error = %self.message(), "request failed");
        }
        let body = ApiResponse::error(code, &self.message(), uuid::Uuid::now_v7().to_string(), 0);
        (status, Json(body)).into_response()
    }
}
