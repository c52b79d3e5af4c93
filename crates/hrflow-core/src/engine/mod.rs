//! Instance lifecycle engine.
//!
//! `ApprovalEngine` is the single authority for instance transitions. Every
//! command runs one read-decide-write cycle against a fresh read of the
//! instance and commits it through [`InstanceRepository::commit`], which
//! rejects the write if another command committed first. Conflicting cycles
//! are retried from the read with linear backoff, up to
//! `EngineConfig::max_commit_attempts`.
//!
//! Notifications are sent only after a successful commit. Delivery failures
//! are logged and returned as warnings on the outcome.

mod lifecycle;
mod recorder;

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use hrflow_types::actor::Actor;
use hrflow_types::approval::{ApprovalRecord, Decision, InstanceDetail, Transition};
use hrflow_types::config::EngineConfig;
use hrflow_types::error::{RepositoryError, WorkflowError};
use hrflow_types::event::{NotificationEvent, NotificationKind};
use hrflow_types::instance::{InstanceId, InstanceStatus, WorkflowInstance};
use serde::Serialize;
use serde_json::json;
use tracing::{debug, warn};

use crate::aggregation::step_statuses;
use crate::notify::Notifier;
use crate::repository::instance::{InstanceCommit, InstanceFilter, InstanceRepository};
use crate::repository::template::TemplateRepository;
use crate::resolver::ApproverResolver;

/// Result of a lifecycle command.
#[derive(Debug, Clone, Serialize)]
pub struct CommandOutcome {
    pub instance: WorkflowInstance,
    pub transition: Transition,
    /// Non-fatal notification failures.
    pub warnings: Vec<String>,
}

/// Result of recording a decision.
#[derive(Debug, Clone, Serialize)]
pub struct DecisionOutcome {
    pub instance: WorkflowInstance,
    pub record: ApprovalRecord,
    /// False when the submission was identical to the stored record.
    pub changed: bool,
    pub transition: Transition,
    pub warnings: Vec<String>,
}

/// The approval workflow engine.
///
/// Generic over its ports so the core crate never depends on hrflow-infra.
pub struct ApprovalEngine<I, T, R, N>
where
    I: InstanceRepository,
    T: TemplateRepository,
    R: ApproverResolver,
    N: Notifier,
{
    instances: I,
    templates: T,
    resolver: R,
    notifier: N,
    config: EngineConfig,
}

impl<I, T, R, N> ApprovalEngine<I, T, R, N>
where
    I: InstanceRepository,
    T: TemplateRepository,
    R: ApproverResolver,
    N: Notifier,
{
    pub fn new(instances: I, templates: T, resolver: R, notifier: N, config: EngineConfig) -> Self {
        Self {
            instances,
            templates,
            resolver,
            notifier,
            config,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // -----------------------------------------------------------------------
    // Queries
    // -----------------------------------------------------------------------

    /// Fetch an instance visible to `actor`.
    ///
    /// Visible to its requester, to any approver on its snapshot, and to
    /// admin/system actors.
    pub async fn get_instance(
        &self,
        actor: &Actor,
        id: &InstanceId,
    ) -> Result<WorkflowInstance, WorkflowError> {
        let instance = self.load(id).await?;
        if !can_view(actor, &instance) {
            return Err(WorkflowError::NotPermitted(format!(
                "{} may not view instance {id}",
                actor.id
            )));
        }
        Ok(instance)
    }

    /// Instance plus every decision and the per-step status view.
    pub async fn get_instance_detail(
        &self,
        actor: &Actor,
        id: &InstanceId,
    ) -> Result<InstanceDetail, WorkflowError> {
        let instance = self.get_instance(actor, id).await?;
        let records = self.instances.list_records(id).await?;
        let steps = step_statuses(&instance, &records);
        Ok(InstanceDetail {
            instance,
            records,
            steps,
        })
    }

    /// Instances where `approver_id` is an approver on any step.
    pub async fn list_by_approver(
        &self,
        actor: &Actor,
        approver_id: &str,
        status: Option<InstanceStatus>,
    ) -> Result<Vec<WorkflowInstance>, WorkflowError> {
        require_act_for(actor, approver_id, "list instances for")?;
        let filter = InstanceFilter {
            approver_id: Some(approver_id.to_string()),
            status,
            ..Default::default()
        };
        Ok(self.instances.list(&filter).await?)
    }

    pub async fn list_by_requester(
        &self,
        actor: &Actor,
        requester_id: &str,
    ) -> Result<Vec<WorkflowInstance>, WorkflowError> {
        require_act_for(actor, requester_id, "list instances for")?;
        let filter = InstanceFilter {
            requester_id: Some(requester_id.to_string()),
            ..Default::default()
        };
        Ok(self.instances.list(&filter).await?)
    }

    /// Pending instances whose active step still needs `approver_id`'s decision.
    pub async fn list_awaiting_decision(
        &self,
        actor: &Actor,
        approver_id: &str,
    ) -> Result<Vec<WorkflowInstance>, WorkflowError> {
        let candidates = self
            .list_by_approver(actor, approver_id, Some(InstanceStatus::Pending))
            .await?;

        let mut awaiting = Vec::new();
        for instance in candidates {
            let Some(step) = instance.current_step() else {
                continue;
            };
            if !step.is_authorized(approver_id) {
                continue;
            }
            let records = self.instances.list_records(&instance.id).await?;
            let decided = records.iter().any(|r| {
                r.step_id == step.id
                    && r.approver_id == approver_id
                    && r.decision != Decision::Pending
            });
            if !decided {
                awaiting.push(instance);
            }
        }
        Ok(awaiting)
    }

    // -----------------------------------------------------------------------
    // Shared command plumbing
    // -----------------------------------------------------------------------

    async fn load(&self, id: &InstanceId) -> Result<WorkflowInstance, WorkflowError> {
        self.instances
            .get_by_id(id)
            .await?
            .ok_or_else(|| WorkflowError::InstanceNotFound(id.clone()))
    }

    /// Run one read-decide-write cycle, retrying it on `StaleState`.
    async fn with_retry<F, Fut, O>(
        &self,
        id: &InstanceId,
        operation: &'static str,
        mut cycle: F,
    ) -> Result<O, WorkflowError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<O, WorkflowError>>,
    {
        let max_attempts = self.config.max_commit_attempts.max(1);
        let mut attempt = 1;
        loop {
            match cycle().await {
                Err(WorkflowError::StaleState(_)) if attempt < max_attempts => {
                    warn!(
                        instance_id = %id,
                        operation,
                        attempt,
                        "concurrent modification, retrying"
                    );
                    let backoff = self.config.retry_backoff_ms * u64::from(attempt);
                    tokio::time::sleep(Duration::from_millis(backoff)).await;
                    attempt += 1;
                }
                Err(WorkflowError::StaleState(stale)) => {
                    warn!(
                        instance_id = %id,
                        operation,
                        attempts = attempt,
                        "giving up after repeated concurrent modifications"
                    );
                    return Err(WorkflowError::StaleState(stale));
                }
                other => return other,
            }
        }
    }

    async fn commit(
        &self,
        instance: WorkflowInstance,
        record: Option<ApprovalRecord>,
    ) -> Result<WorkflowInstance, WorkflowError> {
        let id = instance.id.clone();
        let version = instance.version;
        let commit = InstanceCommit { instance, record };
        let committed = self.instances.commit(&commit).await.map_err(|e| match e {
            RepositoryError::Conflict(_) => WorkflowError::StaleState(id.clone()),
            RepositoryError::NotFound => WorkflowError::InstanceNotFound(id.clone()),
            other => other.into(),
        })?;
        debug!(instance_id = %id, from_version = version, to_version = committed.version, "instance committed");
        Ok(committed)
    }

    /// Deliver events, collecting failures as warnings.
    async fn dispatch(&self, events: Vec<NotificationEvent>) -> Vec<String> {
        let mut warnings = Vec::new();
        for event in events {
            if event.recipient_ids.is_empty() {
                continue;
            }
            if let Err(e) = self.notifier.notify(&event).await {
                warn!(
                    instance_id = %event.instance_id,
                    kind = %event.kind,
                    error = %e,
                    "notification delivery failed"
                );
                warnings.push(format!("{} notification not delivered: {e}", event.kind));
            }
        }
        warnings
    }
}

fn can_view(actor: &Actor, instance: &WorkflowInstance) -> bool {
    actor.is_privileged()
        || actor.id == instance.requester_id
        || instance.involves_approver(&actor.id)
}

fn require_act_for(actor: &Actor, identity: &str, what: &str) -> Result<(), WorkflowError> {
    if actor.may_act_for(identity) {
        Ok(())
    } else {
        Err(WorkflowError::NotPermitted(format!(
            "{} may not {what} {identity}",
            actor.id
        )))
    }
}

/// Apply a computed transition to the instance in place.
fn apply_transition(instance: &mut WorkflowInstance, transition: Transition, now: DateTime<Utc>) {
    match transition {
        Transition::None => {}
        Transition::Advanced { to, .. } => instance.current_step_index = to,
        Transition::Approved => {
            instance.current_step_index = instance.steps.len();
            instance.status = InstanceStatus::Approved;
            instance.completed_at = Some(now);
        }
        Transition::Rejected => {
            instance.status = InstanceStatus::Rejected;
            instance.completed_at = Some(now);
        }
    }
}

fn base_payload(instance: &WorkflowInstance) -> serde_json::Value {
    json!({
        "template_id": instance.template_id.to_string(),
        "template_name": instance.template_name,
        "requester_id": instance.requester_id,
    })
}

/// "Approval needed" for the step at `index`.
fn activation_event(instance: &WorkflowInstance, index: usize) -> Option<NotificationEvent> {
    let step = instance.steps.get(index)?;
    let mut payload = base_payload(instance);
    payload["step_id"] = json!(step.id);
    payload["step_name"] = json!(step.name);
    Some(NotificationEvent::new(
        NotificationKind::ApprovalNeeded,
        instance.id.clone(),
        step.approvers.clone(),
        payload,
    ))
}

/// Events for a committed transition.
fn transition_events(
    instance: &WorkflowInstance,
    transition: Transition,
    decided_by: &ApprovalRecord,
) -> Vec<NotificationEvent> {
    match transition {
        Transition::None => Vec::new(),
        Transition::Advanced { to, .. } => activation_event(instance, to).into_iter().collect(),
        Transition::Approved | Transition::Rejected => {
            let kind = if transition == Transition::Approved {
                NotificationKind::InstanceApproved
            } else {
                NotificationKind::InstanceRejected
            };
            let mut payload = base_payload(instance);
            payload["step_id"] = json!(decided_by.step_id);
            payload["decided_by"] = json!(decided_by.approver_id);
            payload["comment"] = json!(decided_by.comment);
            vec![NotificationEvent::new(
                kind,
                instance.id.clone(),
                vec![instance.requester_id.clone()],
                payload,
            )]
        }
    }
}
