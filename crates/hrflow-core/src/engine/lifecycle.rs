//! Instance creation, submission, draft edits and cancellation.

use chrono::Utc;
use hrflow_types::actor::Actor;
use hrflow_types::approval::Transition;
use hrflow_types::error::WorkflowError;
use hrflow_types::event::{NotificationEvent, NotificationKind};
use hrflow_types::instance::{
    CreateInstanceRequest, InstanceId, InstanceStatus, StepSnapshot, WorkflowInstance,
};
use hrflow_types::template::{AggregationRule, WorkflowTemplate};
use serde_json::json;
use tracing::info;

use super::{ApprovalEngine, CommandOutcome, activation_event, base_payload};
use crate::notify::Notifier;
use crate::repository::instance::InstanceRepository;
use crate::repository::template::TemplateRepository;
use crate::resolver::{ApproverResolver, resolve_all};

impl<I, T, R, N> ApprovalEngine<I, T, R, N>
where
    I: InstanceRepository,
    T: TemplateRepository,
    R: ApproverResolver,
    N: Notifier,
{
    /// Start a new instance from an active template.
    ///
    /// The template's steps are copied with every approver reference resolved.
    /// The instance starts in Draft when the template allows drafts, otherwise
    /// it starts Pending and step 0's approvers are notified.
    pub async fn create_instance(
        &self,
        actor: &Actor,
        request: CreateInstanceRequest,
    ) -> Result<CommandOutcome, WorkflowError> {
        let requester_id = match request.requester_id {
            Some(requester) if requester != actor.id => {
                if !actor.is_privileged() {
                    return Err(WorkflowError::NotPermitted(format!(
                        "{} may not file requests on behalf of {requester}",
                        actor.id
                    )));
                }
                requester
            }
            _ => actor.id.clone(),
        };

        let template = self
            .templates
            .get_by_id(&request.template_id)
            .await?
            .ok_or_else(|| WorkflowError::TemplateNotFound(request.template_id.clone()))?;
        if !template.active {
            return Err(WorkflowError::TemplateInactive(template.id));
        }

        let steps = self.snapshot_steps(&template).await?;
        let now = Utc::now();
        let status = if template.allow_drafts {
            InstanceStatus::Draft
        } else {
            InstanceStatus::Pending
        };
        let instance = WorkflowInstance {
            id: InstanceId::new(),
            template_id: template.id.clone(),
            template_name: template.name.clone(),
            template_revision: template.revision,
            requester_id,
            payload: request.payload,
            status,
            current_step_index: 0,
            steps,
            version: 1,
            created_at: now,
            updated_at: now,
            submitted_at: (status == InstanceStatus::Pending).then_some(now),
            completed_at: None,
            cancelled_by: None,
            cancel_reason: None,
        };

        let instance = self.instances.create(&instance).await?;
        info!(
            instance_id = %instance.id,
            template = %instance.template_name,
            requester_id = %instance.requester_id,
            status = %instance.status,
            "instance created"
        );

        let warnings = if instance.status == InstanceStatus::Pending {
            self.dispatch(activation_event(&instance, 0).into_iter().collect())
                .await
        } else {
            Vec::new()
        };

        Ok(CommandOutcome {
            instance,
            transition: Transition::None,
            warnings,
        })
    }

    /// Draft -> Pending. Activates step 0 and notifies its approvers.
    pub async fn submit_instance(
        &self,
        actor: &Actor,
        id: &InstanceId,
    ) -> Result<CommandOutcome, WorkflowError> {
        let instance = self
            .with_retry(id, "submit", move || self.try_submit(actor, id))
            .await?;
        info!(instance_id = %id, actor = %actor.id, "instance submitted");

        let warnings = self
            .dispatch(activation_event(&instance, 0).into_iter().collect())
            .await;
        Ok(CommandOutcome {
            instance,
            transition: Transition::None,
            warnings,
        })
    }

    async fn try_submit(
        &self,
        actor: &Actor,
        id: &InstanceId,
    ) -> Result<WorkflowInstance, WorkflowError> {
        let mut instance = self.load(id).await?;
        require_owner(actor, &instance, "submit")?;
        if instance.status != InstanceStatus::Draft {
            return Err(WorkflowError::InvalidState {
                operation: "submit",
                status: instance.status,
            });
        }
        let now = Utc::now();
        instance.status = InstanceStatus::Pending;
        instance.current_step_index = 0;
        instance.submitted_at = Some(now);
        instance.updated_at = now;
        self.commit(instance, None).await
    }

    /// Replace the payload of a Draft instance.
    pub async fn update_draft(
        &self,
        actor: &Actor,
        id: &InstanceId,
        payload: &serde_json::Value,
    ) -> Result<WorkflowInstance, WorkflowError> {
        let instance = self
            .with_retry(id, "update_draft", move || {
                self.try_update_draft(actor, id, payload)
            })
            .await?;
        info!(instance_id = %id, actor = %actor.id, "draft updated");
        Ok(instance)
    }

    async fn try_update_draft(
        &self,
        actor: &Actor,
        id: &InstanceId,
        payload: &serde_json::Value,
    ) -> Result<WorkflowInstance, WorkflowError> {
        let mut instance = self.load(id).await?;
        require_owner(actor, &instance, "edit")?;
        if instance.status != InstanceStatus::Draft {
            return Err(WorkflowError::InvalidState {
                operation: "edit",
                status: instance.status,
            });
        }
        instance.payload = payload.clone();
        instance.updated_at = Utc::now();
        self.commit(instance, None).await
    }

    /// Any non-terminal state -> Cancelled. Requester or admin only.
    ///
    /// Notifies the active step's approvers when the instance was Pending,
    /// and the requester when someone else cancelled it.
    pub async fn cancel_instance(
        &self,
        actor: &Actor,
        id: &InstanceId,
        reason: Option<&str>,
    ) -> Result<CommandOutcome, WorkflowError> {
        let (before, instance) = self
            .with_retry(id, "cancel", move || self.try_cancel(actor, id, reason))
            .await?;
        info!(
            instance_id = %id,
            actor = %actor.id,
            from = %before,
            "instance cancelled"
        );

        let mut recipients: Vec<String> = Vec::new();
        if before == InstanceStatus::Pending {
            if let Some(step) = instance.current_step() {
                recipients.extend(step.approvers.iter().cloned());
            }
        }
        if actor.id != instance.requester_id && !recipients.contains(&instance.requester_id) {
            recipients.push(instance.requester_id.clone());
        }
        recipients.retain(|r| r != &actor.id);

        let mut payload = base_payload(&instance);
        payload["cancelled_by"] = json!(actor.id);
        payload["reason"] = json!(reason);
        let event = NotificationEvent::new(
            NotificationKind::InstanceCancelled,
            instance.id.clone(),
            recipients,
            payload,
        );
        let warnings = self.dispatch(vec![event]).await;

        Ok(CommandOutcome {
            instance,
            transition: Transition::None,
            warnings,
        })
    }

    async fn try_cancel(
        &self,
        actor: &Actor,
        id: &InstanceId,
        reason: Option<&str>,
    ) -> Result<(InstanceStatus, WorkflowInstance), WorkflowError> {
        let mut instance = self.load(id).await?;
        require_owner(actor, &instance, "cancel")?;
        if instance.status.is_terminal() {
            return Err(WorkflowError::InvalidState {
                operation: "cancel",
                status: instance.status,
            });
        }
        let before = instance.status;
        let now = Utc::now();
        instance.status = InstanceStatus::Cancelled;
        instance.completed_at = Some(now);
        instance.updated_at = now;
        instance.cancelled_by = Some(actor.id.clone());
        instance.cancel_reason = reason.map(str::to_string);
        let instance = self.commit(instance, None).await?;
        Ok((before, instance))
    }

    async fn snapshot_steps(
        &self,
        template: &WorkflowTemplate,
    ) -> Result<Vec<StepSnapshot>, WorkflowError> {
        let mut steps = Vec::with_capacity(template.steps.len());
        for def in &template.steps {
            let approvers = resolve_all(&self.resolver, &def.approvers).await?;
            if approvers.is_empty() {
                return Err(WorkflowError::Validation(format!(
                    "step '{}' resolved to no approvers",
                    def.id
                )));
            }
            if let AggregationRule::Quorum { n } = def.rule {
                if n as usize > approvers.len() {
                    return Err(WorkflowError::Validation(format!(
                        "step '{}': quorum of {n} exceeds its {} resolved approvers",
                        def.id,
                        approvers.len()
                    )));
                }
            }
            steps.push(StepSnapshot::from_definition(def, approvers));
        }
        Ok(steps)
    }
}

/// Only the requester or a privileged actor may manage an instance.
fn require_owner(
    actor: &Actor,
    instance: &WorkflowInstance,
    operation: &str,
) -> Result<(), WorkflowError> {
    if actor.may_act_for(&instance.requester_id) {
        Ok(())
    } else {
        Err(WorkflowError::NotPermitted(format!(
            "only the requester or an administrator may {operation} instance {}",
            instance.id
        )))
    }
}
