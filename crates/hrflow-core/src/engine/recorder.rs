//! Recording approver decisions.

use chrono::Utc;
use hrflow_types::actor::Actor;
use hrflow_types::approval::{ApprovalRecord, RecordDecisionRequest, Transition};
use hrflow_types::error::WorkflowError;
use hrflow_types::instance::{InstanceId, InstanceStatus, WorkflowInstance};
use tracing::{debug, info};

use super::{ApprovalEngine, DecisionOutcome, apply_transition, transition_events};
use crate::aggregation::compute_instance_transition;
use crate::notify::Notifier;
use crate::repository::instance::InstanceRepository;
use crate::repository::template::TemplateRepository;
use crate::resolver::ApproverResolver;

/// What a single decision cycle committed.
struct DecisionCycle {
    instance: WorkflowInstance,
    record: ApprovalRecord,
    changed: bool,
    transition: Transition,
}

impl<I, T, R, N> ApprovalEngine<I, T, R, N>
where
    I: InstanceRepository,
    T: TemplateRepository,
    R: ApproverResolver,
    N: Notifier,
{
    /// Record one approver's decision on the active step.
    ///
    /// The record write and the resulting transition commit together. An
    /// identical resubmission writes nothing and notifies nobody.
    pub async fn record_decision(
        &self,
        actor: &Actor,
        id: &InstanceId,
        request: &RecordDecisionRequest,
    ) -> Result<DecisionOutcome, WorkflowError> {
        let approver_id = request.approver_id.as_deref().unwrap_or(&actor.id);
        if !actor.may_act_for(approver_id) {
            return Err(WorkflowError::NotPermitted(format!(
                "{} may not decide on behalf of {approver_id}",
                actor.id
            )));
        }

        let cycle = self
            .with_retry(id, "record_decision", move || {
                self.try_record(id, approver_id, request)
            })
            .await?;

        if !cycle.changed {
            debug!(
                instance_id = %id,
                step_id = %request.step_id,
                approver_id,
                "identical decision resubmitted, nothing to do"
            );
            return Ok(DecisionOutcome {
                instance: cycle.instance,
                record: cycle.record,
                changed: false,
                transition: Transition::None,
                warnings: Vec::new(),
            });
        }

        info!(
            instance_id = %id,
            step_id = %request.step_id,
            approver_id,
            actor = %actor.id,
            decision = %request.decision,
            "decision recorded"
        );
        if !cycle.transition.is_none() {
            info!(
                instance_id = %id,
                transition = ?cycle.transition,
                status = %cycle.instance.status,
                current_step_index = cycle.instance.current_step_index,
                "instance transitioned"
            );
        }

        let events = transition_events(&cycle.instance, cycle.transition, &cycle.record);
        let warnings = self.dispatch(events).await;

        Ok(DecisionOutcome {
            instance: cycle.instance,
            record: cycle.record,
            changed: true,
            transition: cycle.transition,
            warnings,
        })
    }

    async fn try_record(
        &self,
        id: &InstanceId,
        approver_id: &str,
        request: &RecordDecisionRequest,
    ) -> Result<DecisionCycle, WorkflowError> {
        let mut instance = self.load(id).await?;
        if instance.status != InstanceStatus::Pending {
            return Err(WorkflowError::InvalidState {
                operation: "record a decision on",
                status: instance.status,
            });
        }
        let step = instance
            .current_step()
            .ok_or_else(|| WorkflowError::Storage(format!("instance {id} has no active step")))?;
        if request.step_id != step.id {
            return Err(WorkflowError::OutOfOrderStep {
                requested: request.step_id.clone(),
                active: step.id.clone(),
            });
        }
        if !step.is_authorized(approver_id) {
            return Err(WorkflowError::UnauthorizedApprover {
                approver_id: approver_id.to_string(),
                step_id: step.id.clone(),
            });
        }

        let mut records = self.instances.list_records(id).await?;
        let existing = records
            .iter()
            .position(|r| r.step_id == request.step_id && r.approver_id == approver_id);

        if let Some(pos) = existing {
            let stored = &records[pos];
            if stored.decision == request.decision && stored.comment == request.comment {
                return Ok(DecisionCycle {
                    record: stored.clone(),
                    instance,
                    changed: false,
                    transition: Transition::None,
                });
            }
        }

        let now = Utc::now();
        let record = match existing {
            Some(pos) => {
                let stored = &mut records[pos];
                stored.decision = request.decision;
                stored.comment = request.comment.clone();
                stored.decided_at = now;
                stored.clone()
            }
            None => {
                let record = ApprovalRecord::new(
                    id.clone(),
                    request.step_id.clone(),
                    approver_id,
                    request.decision,
                    request.comment.clone(),
                );
                records.push(record.clone());
                record
            }
        };

        let transition = compute_instance_transition(&instance, &records);
        apply_transition(&mut instance, transition, now);
        instance.updated_at = now;

        let instance = self.commit(instance, Some(record.clone())).await?;
        Ok(DecisionCycle {
            instance,
            record,
            changed: true,
            transition,
        })
    }
}
