use thiserror::Error;

use crate::instance::{InstanceId, InstanceStatus};
use crate::template::TemplateId;

/// Errors returned by the approval engine.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("approver '{approver_id}' is not assigned to step '{step_id}'")]
    UnauthorizedApprover { approver_id: String, step_id: String },

    #[error("step '{requested}' is not the active step (active: {active})")]
    OutOfOrderStep { requested: String, active: String },

    #[error("cannot {operation} an instance in status '{status}'")]
    InvalidState {
        operation: &'static str,
        status: InstanceStatus,
    },

    #[error("instance {0} was modified concurrently; retry")]
    StaleState(InstanceId),

    #[error("not permitted: {0}")]
    NotPermitted(String),

    #[error("template not found: {0}")]
    TemplateNotFound(TemplateId),

    #[error("template {0} is inactive")]
    TemplateInactive(TemplateId),

    #[error("instance not found: {0}")]
    InstanceNotFound(InstanceId),

    #[error("storage error: {0}")]
    Storage(String),
}

/// Errors from repository operations (used by trait definitions in hrflow-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

impl From<RepositoryError> for WorkflowError {
    fn from(e: RepositoryError) -> Self {
        WorkflowError::Storage(e.to_string())
    }
}

/// Errors from notification dispatch. Never fatal to a committed transition.
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("notification channel closed")]
    Closed,

    #[error("notification delivery failed: {0}")]
    Delivery(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_state_message() {
        let err = WorkflowError::InvalidState {
            operation: "cancel",
            status: InstanceStatus::Approved,
        };
        assert_eq!(
            err.to_string(),
            "cannot cancel an instance in status 'approved'"
        );
    }

    #[test]
    fn test_repository_error_maps_to_storage() {
        let err: WorkflowError = RepositoryError::Query("disk I/O error".into()).into();
        assert!(matches!(err, WorkflowError::Storage(ref m) if m.contains("disk I/O")));
    }
}
