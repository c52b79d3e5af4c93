//! Template repository trait definition.

use hrflow_types::error::RepositoryError;
use hrflow_types::template::{DomainType, TemplateId, WorkflowTemplate};

/// Filter criteria for listing templates.
#[derive(Debug, Clone, Default)]
pub struct TemplateFilter {
    /// Only return templates that can start new instances.
    pub active_only: bool,
    /// Restrict to one business domain.
    pub domain: Option<DomainType>,
}

/// Repository trait for template persistence.
///
/// Implementations live in hrflow-infra (e.g., SqliteTemplateRepository).
/// Uses native async fn in traits (Rust 2024 edition, no async_trait macro).
pub trait TemplateRepository: Send + Sync {
    /// Persist a new template. Returns the stored template.
    fn create(
        &self,
        template: &WorkflowTemplate,
    ) -> impl std::future::Future<Output = Result<WorkflowTemplate, RepositoryError>> + Send;

    fn get_by_id(
        &self,
        id: &TemplateId,
    ) -> impl std::future::Future<Output = Result<Option<WorkflowTemplate>, RepositoryError>> + Send;

    /// Overwrite an existing template. `NotFound` if it does not exist.
    fn update(
        &self,
        template: &WorkflowTemplate,
    ) -> impl std::future::Future<Output = Result<WorkflowTemplate, RepositoryError>> + Send;

    /// List templates ordered by name.
    fn list(
        &self,
        filter: &TemplateFilter,
    ) -> impl std::future::Future<Output = Result<Vec<WorkflowTemplate>, RepositoryError>> + Send;
}
