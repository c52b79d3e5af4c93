//! In-memory test doubles for the engine's ports.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::Barrier;

use hrflow_types::approval::ApprovalRecord;
use hrflow_types::error::{NotifyError, RepositoryError};
use hrflow_types::event::NotificationEvent;
use hrflow_types::instance::{InstanceId, WorkflowInstance};
use hrflow_types::template::{TemplateId, WorkflowTemplate};

use crate::notify::Notifier;
use crate::repository::SortOrder;
use crate::repository::instance::{InstanceCommit, InstanceFilter, InstanceRepository};
use crate::repository::template::{TemplateFilter, TemplateRepository};

#[derive(Clone, Default)]
pub struct InMemoryTemplateRepository {
    templates: Arc<Mutex<HashMap<TemplateId, WorkflowTemplate>>>,
}

impl TemplateRepository for InMemoryTemplateRepository {
    async fn create(&self, template: &WorkflowTemplate) -> Result<WorkflowTemplate, RepositoryError> {
        let mut map = self.templates.lock().unwrap();
        if map.contains_key(&template.id) {
            return Err(RepositoryError::Conflict(template.id.to_string()));
        }
        map.insert(template.id.clone(), template.clone());
        Ok(template.clone())
    }

    async fn get_by_id(&self, id: &TemplateId) -> Result<Option<WorkflowTemplate>, RepositoryError> {
        Ok(self.templates.lock().unwrap().get(id).cloned())
    }

    async fn update(&self, template: &WorkflowTemplate) -> Result<WorkflowTemplate, RepositoryError> {
        let mut map = self.templates.lock().unwrap();
        match map.get_mut(&template.id) {
            Some(existing) => {
                *existing = template.clone();
                Ok(template.clone())
            }
            None => Err(RepositoryError::NotFound),
        }
    }

    async fn list(&self, filter: &TemplateFilter) -> Result<Vec<WorkflowTemplate>, RepositoryError> {
        let map = self.templates.lock().unwrap();
        let mut out: Vec<WorkflowTemplate> = map
            .values()
            .filter(|t| !filter.active_only || t.active)
            .filter(|t| filter.domain.as_ref().is_none_or(|d| &t.domain == d))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(out)
    }
}

#[derive(Default)]
struct InstanceState {
    instances: HashMap<InstanceId, WorkflowInstance>,
    records: Vec<ApprovalRecord>,
}

/// Instance store with the same version check as the SQLite repository.
#[derive(Clone, Default)]
pub struct InMemoryInstanceRepository {
    state: Arc<Mutex<InstanceState>>,
}

impl InMemoryInstanceRepository {
    pub fn record_count(&self) -> usize {
        self.state.lock().unwrap().records.len()
    }
}

impl InstanceRepository for InMemoryInstanceRepository {
    async fn create(&self, instance: &WorkflowInstance) -> Result<WorkflowInstance, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        if state.instances.contains_key(&instance.id) {
            return Err(RepositoryError::Conflict(instance.id.to_string()));
        }
        state.instances.insert(instance.id.clone(), instance.clone());
        Ok(instance.clone())
    }

    async fn get_by_id(&self, id: &InstanceId) -> Result<Option<WorkflowInstance>, RepositoryError> {
        Ok(self.state.lock().unwrap().instances.get(id).cloned())
    }

    async fn list_records(&self, id: &InstanceId) -> Result<Vec<ApprovalRecord>, RepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .records
            .iter()
            .filter(|r| &r.instance_id == id)
            .cloned()
            .collect())
    }

    async fn commit(&self, commit: &InstanceCommit) -> Result<WorkflowInstance, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        let id = &commit.instance.id;
        let stored_version = state
            .instances
            .get(id)
            .map(|i| i.version)
            .ok_or(RepositoryError::NotFound)?;
        if stored_version != commit.instance.version {
            return Err(RepositoryError::Conflict(format!(
                "instance {id} is at version {stored_version}, expected {}",
                commit.instance.version
            )));
        }

        let mut updated = commit.instance.clone();
        updated.version += 1;
        state.instances.insert(id.clone(), updated.clone());

        if let Some(record) = &commit.record {
            match state.records.iter_mut().find(|r| {
                r.instance_id == record.instance_id
                    && r.step_id == record.step_id
                    && r.approver_id == record.approver_id
            }) {
                Some(existing) => {
                    existing.decision = record.decision;
                    existing.comment = record.comment.clone();
                    existing.decided_at = record.decided_at;
                }
                None => state.records.push(record.clone()),
            }
        }
        Ok(updated)
    }

    async fn list(&self, filter: &InstanceFilter) -> Result<Vec<WorkflowInstance>, RepositoryError> {
        let state = self.state.lock().unwrap();
        let mut out: Vec<WorkflowInstance> = state
            .instances
            .values()
            .filter(|i| {
                filter
                    .requester_id
                    .as_ref()
                    .is_none_or(|r| &i.requester_id == r)
            })
            .filter(|i| {
                filter
                    .approver_id
                    .as_ref()
                    .is_none_or(|a| i.involves_approver(a))
            })
            .filter(|i| filter.status.is_none_or(|s| i.status == s))
            .cloned()
            .collect();
        out.sort_by(|a, b| a.id.0.cmp(&b.id.0));
        if filter.sort_order.unwrap_or_default() == SortOrder::Desc {
            out.reverse();
        }
        if let Some(limit) = filter.limit {
            out.truncate(limit.max(0) as usize);
        }
        Ok(out)
    }
}

/// Wraps an instance repository and fails the next `n` commits with a conflict.
#[derive(Clone)]
pub struct ConflictingInstanceRepository {
    pub inner: InMemoryInstanceRepository,
    conflicts: Arc<AtomicU32>,
    pub commit_attempts: Arc<AtomicU32>,
}

impl ConflictingInstanceRepository {
    pub fn new(inner: InMemoryInstanceRepository, conflicts: u32) -> Self {
        Self {
            inner,
            conflicts: Arc::new(AtomicU32::new(conflicts)),
            commit_attempts: Arc::new(AtomicU32::new(0)),
        }
    }
}

impl InstanceRepository for ConflictingInstanceRepository {
    async fn create(&self, instance: &WorkflowInstance) -> Result<WorkflowInstance, RepositoryError> {
        self.inner.create(instance).await
    }

    async fn get_by_id(&self, id: &InstanceId) -> Result<Option<WorkflowInstance>, RepositoryError> {
        self.inner.get_by_id(id).await
    }

    async fn list_records(&self, id: &InstanceId) -> Result<Vec<ApprovalRecord>, RepositoryError> {
        self.inner.list_records(id).await
    }

    async fn commit(&self, commit: &InstanceCommit) -> Result<WorkflowInstance, RepositoryError> {
        self.commit_attempts.fetch_add(1, Ordering::SeqCst);
        let remaining = self.conflicts.load(Ordering::SeqCst);
        if remaining > 0 {
            self.conflicts.store(remaining - 1, Ordering::SeqCst);
            return Err(RepositoryError::Conflict("injected".to_string()));
        }
        self.inner.commit(commit).await
    }

    async fn list(&self, filter: &InstanceFilter) -> Result<Vec<WorkflowInstance>, RepositoryError> {
        self.inner.list(filter).await
    }
}

/// Holds the first `racers` loads at a barrier so that concurrent commands
/// all read the same version before any of them commits.
#[derive(Clone)]
pub struct RacingInstanceRepository {
    pub inner: InMemoryInstanceRepository,
    barrier: Arc<Barrier>,
    gated_loads: Arc<AtomicU32>,
    pub conflicts: Arc<AtomicU32>,
}

impl RacingInstanceRepository {
    pub fn new(inner: InMemoryInstanceRepository, racers: u32) -> Self {
        Self {
            inner,
            barrier: Arc::new(Barrier::new(racers as usize)),
            gated_loads: Arc::new(AtomicU32::new(racers)),
            conflicts: Arc::new(AtomicU32::new(0)),
        }
    }
}

impl InstanceRepository for RacingInstanceRepository {
    async fn create(&self, instance: &WorkflowInstance) -> Result<WorkflowInstance, RepositoryError> {
        self.inner.create(instance).await
    }

    async fn get_by_id(&self, id: &InstanceId) -> Result<Option<WorkflowInstance>, RepositoryError> {
        let loaded = self.inner.get_by_id(id).await;
        let gated = self
            .gated_loads
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if gated {
            self.barrier.wait().await;
        }
        loaded
    }

    async fn list_records(&self, id: &InstanceId) -> Result<Vec<ApprovalRecord>, RepositoryError> {
        self.inner.list_records(id).await
    }

    async fn commit(&self, commit: &InstanceCommit) -> Result<WorkflowInstance, RepositoryError> {
        let result = self.inner.commit(commit).await;
        if matches!(result, Err(RepositoryError::Conflict(_))) {
            self.conflicts.fetch_add(1, Ordering::SeqCst);
        }
        result
    }

    async fn list(&self, filter: &InstanceFilter) -> Result<Vec<WorkflowInstance>, RepositoryError> {
        self.inner.list(filter).await
    }
}

/// Captures every delivered event.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    events: Arc<Mutex<Vec<NotificationEvent>>>,
}

impl RecordingNotifier {
    pub fn events(&self) -> Vec<NotificationEvent> {
        self.events.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    async fn notify(&self, event: &NotificationEvent) -> Result<(), NotifyError> {
        self.events.lock().unwrap().push(event.clone());
        Ok(())
    }
}

/// Always fails delivery.
#[derive(Clone, Copy, Default)]
pub struct FailingNotifier;

impl Notifier for FailingNotifier {
    async fn notify(&self, _event: &NotificationEvent) -> Result<(), NotifyError> {
        Err(NotifyError::Delivery("smtp relay unreachable".to_string()))
    }
}
