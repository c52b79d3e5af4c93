//! Instance repository trait definition.
//!
//! Every instance mutation goes through [`InstanceRepository::commit`], which
//! is the single optimistic-concurrency unit: the instance document and an
//! optional approval record are written together, and only if the stored
//! version still equals the version the caller read.

use hrflow_types::approval::ApprovalRecord;
use hrflow_types::error::RepositoryError;
use hrflow_types::instance::{InstanceId, InstanceStatus, WorkflowInstance};

use super::SortOrder;

/// Filter criteria for listing instances.
#[derive(Debug, Clone, Default)]
pub struct InstanceFilter {
    /// Instances filed by this identity.
    pub requester_id: Option<String>,
    /// Instances where this identity is a resolved approver on any step.
    pub approver_id: Option<String>,
    pub status: Option<InstanceStatus>,
    /// Sort direction on creation time (defaults to newest first).
    pub sort_order: Option<SortOrder>,
    pub limit: Option<i64>,
}

/// A write produced by one read-decide-write cycle.
#[derive(Debug, Clone)]
pub struct InstanceCommit {
    /// The new instance state. `version` must still hold the version that was read.
    pub instance: WorkflowInstance,
    /// Approval record to upsert in the same transaction.
    pub record: Option<ApprovalRecord>,
}

/// Repository trait for instance and approval-record persistence.
pub trait InstanceRepository: Send + Sync {
    /// Insert a freshly created instance.
    fn create(
        &self,
        instance: &WorkflowInstance,
    ) -> impl std::future::Future<Output = Result<WorkflowInstance, RepositoryError>> + Send;

    fn get_by_id(
        &self,
        id: &InstanceId,
    ) -> impl std::future::Future<Output = Result<Option<WorkflowInstance>, RepositoryError>> + Send;

    /// All approval records of an instance, oldest first.
    fn list_records(
        &self,
        id: &InstanceId,
    ) -> impl std::future::Future<Output = Result<Vec<ApprovalRecord>, RepositoryError>> + Send;

    /// Atomically write the instance (and record) if the stored version matches.
    ///
    /// Returns the instance with its version incremented. Fails with
    /// `Conflict` on a version mismatch and `NotFound` if the instance is gone.
    /// Records are upserted on `(instance_id, step_id, approver_id)`.
    fn commit(
        &self,
        commit: &InstanceCommit,
    ) -> impl std::future::Future<Output = Result<WorkflowInstance, RepositoryError>> + Send;

    fn list(
        &self,
        filter: &InstanceFilter,
    ) -> impl std::future::Future<Output = Result<Vec<WorkflowInstance>, RepositoryError>> + Send;
}
